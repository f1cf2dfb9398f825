//! Render stack tracker, one frame per in-flight `include`.
//!
//! Every cache-aware inclusion pushes a [`Frame`] before rendering its partial and
//! pops it afterwards. Data objects that resolve request-specific values call
//! [`TemplateStack::mark_uncacheable`], which flips the `cacheable` flag on the
//! frames selected by the stack's [`TaintPolicy`].
//!
//! A frame's flag only ever goes from `true` to `false`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which frames a dynamic data access taints.
///
/// # Examples
///
/// ```
/// use cached_include::stack::{TaintPolicy, TemplateStack};
///
/// let mut stack = TemplateStack::new(TaintPolicy::Propagating);
/// stack.push("outer");
/// stack.push("inner");
/// stack.mark_uncacheable();
///
/// assert!(!stack.pop().cacheable);
/// assert!(!stack.pop().cacheable); // the ancestor embeds the dynamic text too
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintPolicy {
    /// Every frame currently on the stack becomes uncacheable.
    #[default]
    Propagating,
    /// Only the innermost frame becomes uncacheable.
    LocalOnly,
}

/// One in-flight inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Name of the partial being rendered.
    pub name: String,
    /// Starts `true`, may only transition to `false`.
    pub cacheable: bool,
    /// Partials rendered beneath this one whose output was inlined as text.
    pub inlined: BTreeSet<String>,
}

impl Frame {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cacheable: true,
            inlined: BTreeSet::new(),
        }
    }
}

/// LIFO stack of [`Frame`]s whose depth equals the current include nesting depth.
#[derive(Debug, Clone, Default)]
pub struct TemplateStack {
    frames: Vec<Frame>,
    policy: TaintPolicy,
}

impl TemplateStack {
    /// Creates an empty stack using `policy` for [`mark_uncacheable`](Self::mark_uncacheable).
    pub fn new(policy: TaintPolicy) -> Self {
        Self {
            frames: Vec::new(),
            policy,
        }
    }

    /// Pushes a new, cacheable frame for `name`.
    pub fn push(&mut self, name: impl Into<String>) {
        self.frames.push(Frame::new(name));
    }

    /// Removes and returns the top frame.
    ///
    /// # Panics
    ///
    /// Panics when the stack is empty. An unmatched pop means the include
    /// delegate broke the push/pop pairing, which is an integration bug.
    pub fn pop(&mut self) -> Frame {
        let Some(frame) = self.frames.pop() else {
            panic!("template stack underflow: pop without a matching push");
        };
        frame
    }

    /// Marks frames uncacheable according to the stack's policy.
    ///
    /// Does nothing when no inclusion is being tracked.
    pub fn mark_uncacheable(&mut self) {
        match self.policy {
            TaintPolicy::Propagating => {
                for frame in &mut self.frames {
                    frame.cacheable = false;
                }
            }
            TaintPolicy::LocalOnly => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.cacheable = false;
                }
            }
        }
    }

    /// Records a popped, cacheable `frame` as inlined into the current top
    /// frame, together with everything it inlined itself.
    ///
    /// Does nothing when `frame` was the outermost inclusion.
    pub fn record_inlined(&mut self, frame: Frame) {
        if let Some(parent) = self.frames.last_mut() {
            parent.inlined.extend(frame.inlined);
            parent.inlined.insert(frame.name);
        }
    }

    /// Returns the top frame's flag, or `true` for an empty stack.
    pub fn is_top_cacheable(&self) -> bool {
        self.frames.last().is_none_or(|frame| frame.cacheable)
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_starts_cacheable() {
        let mut stack = TemplateStack::default();
        stack.push("aaa");
        assert_eq!(stack.depth(), 1);
        assert!(stack.is_top_cacheable());
        assert_eq!(stack.top().map(|f| f.name.as_str()), Some("aaa"));
    }

    #[test]
    fn empty_stack_is_vacuously_cacheable() {
        let stack = TemplateStack::default();
        assert!(stack.is_top_cacheable());
        assert!(stack.is_empty());
    }

    #[test]
    fn mark_on_empty_stack_is_noop() {
        let mut stack = TemplateStack::new(TaintPolicy::LocalOnly);
        stack.mark_uncacheable();
        let mut stack = TemplateStack::new(TaintPolicy::Propagating);
        stack.mark_uncacheable();
        assert!(stack.is_top_cacheable());
    }

    #[test]
    fn propagating_taints_every_frame() {
        let mut stack = TemplateStack::new(TaintPolicy::Propagating);
        stack.push("a");
        stack.push("b");
        stack.push("c");
        stack.mark_uncacheable();
        assert!(stack.frames().iter().all(|f| !f.cacheable));
    }

    #[test]
    fn local_only_taints_innermost_frame() {
        let mut stack = TemplateStack::new(TaintPolicy::LocalOnly);
        stack.push("a");
        stack.push("b");
        stack.mark_uncacheable();

        let inner = stack.pop();
        assert_eq!(inner.name, "b");
        assert!(!inner.cacheable);
        assert!(stack.is_top_cacheable());
    }

    #[test]
    fn frames_pushed_after_marking_start_clean() {
        let mut stack = TemplateStack::default();
        stack.push("a");
        stack.mark_uncacheable();
        stack.push("b");
        assert!(stack.is_top_cacheable());
        stack.pop();
        assert!(!stack.is_top_cacheable());
    }

    #[test]
    fn inlined_partials_accumulate_on_parent() {
        let mut stack = TemplateStack::default();
        stack.push("page");
        stack.push("header");
        stack.push("logo");
        let logo = stack.pop();
        stack.record_inlined(logo);
        let header = stack.pop();
        stack.record_inlined(header);

        let page = stack.top().unwrap();
        assert_eq!(
            page.inlined.iter().map(String::as_str).collect::<Vec<_>>(),
            ["header", "logo"]
        );
    }

    #[test]
    fn inlining_the_outermost_frame_is_noop() {
        let mut stack = TemplateStack::default();
        stack.push("page");
        let page = stack.pop();
        stack.record_inlined(page);
        assert!(stack.is_empty());
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn pop_on_empty_stack_panics() {
        TemplateStack::default().pop();
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: TaintPolicy = serde_json::from_str("\"local_only\"").unwrap();
        assert_eq!(policy, TaintPolicy::LocalOnly);
        assert_eq!(TaintPolicy::default(), TaintPolicy::Propagating);
    }
}

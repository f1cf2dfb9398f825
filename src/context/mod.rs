//! Per-render context: variable scope, registers, and template source.
//!
//! A [`Context`] lives for one top-level render. Its [`Registers`] carry the
//! render-scoped bookkeeping of the cache-aware include:
//!
//! - the `caching` flag chosen by the caller before rendering,
//! - the [`TemplateStack`] of in-flight inclusions, created on first use,
//! - the [`CachedFileSystem`] of partials left dynamic, created on first use.
//!
//! Registers are a shared handle so that data objects, which only ever see the
//! registers they were given on exposure, can reach the same stack the include
//! directive pushes to. They are never shared between renders.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    file_system::{CachedFileSystem, FileSystem},
    object::{DataObject, Value},
    stack::{Frame, TaintPolicy, TemplateStack},
    template::RenderError,
};

/// Render configuration.
///
/// # Examples
///
/// ```
/// use cached_include::context::RenderOptions;
/// use cached_include::stack::TaintPolicy;
///
/// let options: RenderOptions = serde_json::from_str(r#"{ "caching": true }"#).unwrap();
/// assert!(options.caching);
/// assert_eq!(options.policy, TaintPolicy::Propagating);
/// assert_eq!(options.max_include_depth, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Render in precompile mode: freeze cacheable partials, keep the rest as directives.
    pub caching: bool,
    pub policy: TaintPolicy,
    /// Maximum include nesting before rendering fails.
    pub max_include_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            caching: false,
            policy: TaintPolicy::default(),
            max_include_depth: 100,
        }
    }
}

#[derive(Debug, Default)]
struct RegisterState {
    caching: bool,
    policy: TaintPolicy,
    template_stack: Option<TemplateStack>,
    cached_file_system: Option<CachedFileSystem>,
}

/// Render-scoped registers, shared by cloning the handle.
///
/// The `with_*` accessors hold an exclusive borrow while the closure runs; the
/// closure must not call back into the same registers.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    state: Rc<RefCell<RegisterState>>,
}

impl Registers {
    pub fn new(options: &RenderOptions) -> Self {
        let state = RegisterState {
            caching: options.caching,
            policy: options.policy,
            ..RegisterState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn caching(&self) -> bool {
        self.state.borrow().caching
    }

    pub fn set_caching(&self, caching: bool) {
        self.state.borrow_mut().caching = caching;
    }

    pub fn policy(&self) -> TaintPolicy {
        self.state.borrow().policy
    }

    /// Marks the tracked inclusions uncacheable. No-op when nothing is tracked.
    pub fn mark_uncacheable(&self) {
        if let Some(stack) = self.state.borrow_mut().template_stack.as_mut() {
            stack.mark_uncacheable();
        }
    }

    /// Whether the innermost tracked inclusion is still cacheable.
    pub fn is_cacheable(&self) -> bool {
        self.state
            .borrow()
            .template_stack
            .as_ref()
            .is_none_or(TemplateStack::is_top_cacheable)
    }

    pub fn stack_depth(&self) -> usize {
        self.state
            .borrow()
            .template_stack
            .as_ref()
            .map_or(0, TemplateStack::depth)
    }

    /// Runs `f` against the template stack, creating it on first use.
    pub fn with_template_stack<R>(&self, f: impl FnOnce(&mut TemplateStack) -> R) -> R {
        let mut state = self.state.borrow_mut();
        let policy = state.policy;
        f(state
            .template_stack
            .get_or_insert_with(|| TemplateStack::new(policy)))
    }

    /// Runs `f` against the artifact store, creating it on first use.
    pub fn with_cached_file_system<R>(&self, f: impl FnOnce(&mut CachedFileSystem) -> R) -> R {
        let mut state = self.state.borrow_mut();
        f(state.cached_file_system.get_or_insert_with(CachedFileSystem::new))
    }

    /// Removes the artifact store, if one was created.
    pub fn take_cached_file_system(&self) -> Option<CachedFileSystem> {
        self.state.borrow_mut().cached_file_system.take()
    }

    /// Discards the stack and the artifact store ahead of a fresh render.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.template_stack = None;
        state.cached_file_system = None;
    }

    /// Records a popped, cacheable frame as inlined into its parent.
    pub fn record_inlined(&self, frame: Frame) {
        self.with_template_stack(|stack| stack.record_inlined(frame));
    }

    /// Renders one inclusion inside a stack frame.
    ///
    /// Pushes a frame for `name`, runs `render`, and returns its output with
    /// the popped frame. The frame is popped on every exit path, including an
    /// `Err` from `render` or a panic unwinding through it.
    ///
    /// # Errors
    ///
    /// Returns the error from `render` unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use cached_include::context::Registers;
    ///
    /// let registers = Registers::default();
    /// let (text, frame) = registers
    ///     .track("dynamic", || {
    ///         registers.mark_uncacheable();
    ///         Ok::<_, ()>("value")
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(text, "value");
    /// assert!(!frame.cacheable);
    /// assert_eq!(registers.stack_depth(), 0);
    /// ```
    pub fn track<T, E>(
        &self,
        name: &str,
        render: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, Frame), E> {
        self.with_template_stack(|stack| stack.push(name));
        let guard = FrameGuard {
            registers: self,
            popped: false,
        };

        let output = render()?;
        Ok((output, guard.pop()))
    }

    /// Whether both handles point at the same render's registers.
    pub fn ptr_eq(&self, other: &Registers) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

// Pops the frame pushed by `Registers::track`, explicitly on success or when
// dropped on the error and unwind paths.
struct FrameGuard<'a> {
    registers: &'a Registers,
    popped: bool,
}

impl FrameGuard<'_> {
    fn pop(mut self) -> Frame {
        self.popped = true;
        self.registers.with_template_stack(TemplateStack::pop)
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.registers.with_template_stack(|stack| {
                stack.pop();
            });
        }
    }
}

/// State for one top-level render.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use cached_include::context::Context;
/// use cached_include::file_system::MemoryFileSystem;
///
/// let mut ctx = Context::new(Rc::new(MemoryFileSystem::new()));
/// ctx.assign("title", "Home");
/// assert_eq!(ctx.find_variable("title").render().unwrap(), "Home");
/// assert_eq!(ctx.find_variable("missing").render().unwrap(), "");
/// ```
pub struct Context {
    assigns: HashMap<String, Value>,
    registers: Registers,
    file_system: Rc<dyn FileSystem>,
    max_include_depth: usize,
    include_depth: usize,
}

impl Context {
    /// Creates a context with default [`RenderOptions`].
    pub fn new(file_system: Rc<dyn FileSystem>) -> Self {
        Self::with_options(file_system, RenderOptions::default())
    }

    pub fn with_options(file_system: Rc<dyn FileSystem>, options: RenderOptions) -> Self {
        return Self {
            assigns: HashMap::new(),
            registers: Registers::new(&options),
            file_system,
            max_include_depth: options.max_include_depth,
            include_depth: 0,
        };
    }

    /// Exposes static data under `name`.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.assigns.insert(name.into(), value.into());
    }

    /// Exposes a data object under `name`.
    ///
    /// The object is converted with [`DataObject::to_renderable`] and then told
    /// about this render's registers, in that order.
    pub fn assign_object<O>(&mut self, name: impl Into<String>, object: O)
    where
        O: DataObject + 'static,
    {
        let mut renderable = Box::new(object).to_renderable();
        renderable.set_registers(&self.registers);
        self.assigns.insert(name.into(), Value::from(renderable));
    }

    /// Looks up a top-level variable; unknown names resolve to null.
    pub fn find_variable(&self, name: &str) -> Value {
        self.assigns.get(name).cloned().unwrap_or_default()
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn caching(&self) -> bool {
        self.registers.caching()
    }

    pub fn set_caching(&mut self, caching: bool) {
        self.registers.set_caching(caching);
    }

    /// Template source provider used by `include`.
    pub fn file_system(&self) -> Rc<dyn FileSystem> {
        Rc::clone(&self.file_system)
    }

    /// Swaps the template source provider, e.g. for a [`CachedFileSystem`].
    pub fn set_file_system(&mut self, file_system: Rc<dyn FileSystem>) {
        self.file_system = file_system;
    }

    pub fn include_depth(&self) -> usize {
        self.include_depth
    }

    /// Runs `f` one include level deeper.
    ///
    /// # Errors
    ///
    /// [`RenderError::NestingTooDeep`] once `max_include_depth` would be exceeded,
    /// otherwise whatever `f` returns.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        if self.include_depth >= self.max_include_depth {
            return Err(RenderError::NestingTooDeep {
                depth: self.include_depth,
            });
        }

        self.include_depth += 1;
        let result = f(self);
        self.include_depth -= 1;
        result
    }
}

//! Cache-aware `include`.
//!
//! In caching mode every partial is rendered inside a stack frame. When the
//! frame comes back clean the rendered text is substituted as usual and ends up
//! frozen into the output. When a data access tainted it, the partial's raw
//! source and rendered text go to the render's [`CachedFileSystem`] and the
//! original `{% include %}` directive is emitted instead, so the partial runs
//! again whenever the output is rendered. The raw sources of clean partials
//! inlined beneath a tainted one are stored as well, since its raw source
//! still includes them.
//!
//! With caching off the wrapped include runs untouched.
//!
//! [`CachedFileSystem`]: crate::file_system::CachedFileSystem

use tracing::debug;

use super::{Include, NativeInclude};
use crate::{
    context::Context,
    environment::Environment,
    file_system::FileSystemError,
    template::{IncludeTag, RenderError},
};

/// Include that freezes cacheable partials and defers uncacheable ones.
///
/// # Examples
///
/// ```
/// use cached_include::Environment;
/// use cached_include::include::{CachedInclude, NativeInclude};
///
/// let env = Environment::with_include(CachedInclude::new(NativeInclude));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CachedInclude<I = NativeInclude> {
    inner: I,
}

impl<I> CachedInclude<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I: Include> Include for CachedInclude<I> {
    fn render(
        &self,
        tag: &IncludeTag,
        env: &Environment,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        if !ctx.caching() {
            return self.inner.render(tag, env, ctx);
        }

        let name = tag.template_key();
        let registers = ctx.registers().clone();
        let (output, frame) = registers.track(name, || self.inner.render(tag, env, ctx))?;

        if frame.cacheable {
            debug!(template = name, "partial frozen into output");
            registers.record_inlined(frame);
            return Ok(output);
        }

        let file_system = ctx.file_system();
        let source = file_system.read_template_file(name)?;
        let inlined = frame
            .inlined
            .into_iter()
            .map(|partial| {
                let source = file_system.read_template_file(&partial)?;
                Ok((partial, source))
            })
            .collect::<Result<Vec<_>, FileSystemError>>()?;

        debug!(
            template = name,
            depth = registers.stack_depth(),
            inlined = inlined.len(),
            policy = ?registers.policy(),
            "partial uncacheable, emitting directive"
        );
        registers.with_cached_file_system(|store| {
            for (partial, source) in inlined {
                store.insert_template(partial, source);
            }
            store.insert_template(name, source);
            store.insert_rendered_result(name, output);
        });

        Ok(tag.directive())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::{
        context::RenderOptions,
        file_system::MemoryFileSystem,
        object::{DataObject, Value},
        stack::TaintPolicy,
        template::Template,
        uncacheable::Uncacheable,
    };

    struct Dynamic;

    impl DataObject for Dynamic {
        fn invoke(&self, name: &str) -> Result<Value, RenderError> {
            Ok(Value::from(format!("live-{name}")))
        }

        fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
            Box::new(self.uncacheable())
        }
    }

    fn context(fs: MemoryFileSystem, policy: TaintPolicy) -> Context {
        let options = RenderOptions {
            caching: true,
            policy,
            ..RenderOptions::default()
        };
        let mut ctx = Context::with_options(Rc::new(fs), options);
        ctx.assign("static", json!({ "v": "s" }));
        ctx.assign_object("dyn", Dynamic);
        ctx
    }

    fn render(source: &str, ctx: &mut Context) -> Result<String, RenderError> {
        Template::parse(source)?.render(&Environment::cached(), ctx)
    }

    #[test]
    fn static_partial_is_inlined() {
        let fs = MemoryFileSystem::new().with_template("p", "[{{ static.v }}]");
        let mut ctx = context(fs, TaintPolicy::Propagating);

        assert_eq!(render("{% include 'p' %}", &mut ctx).unwrap(), "[s]");
        assert!(ctx.registers().take_cached_file_system().is_none());
    }

    #[test]
    fn dynamic_partial_is_left_as_directive() {
        let fs = MemoryFileSystem::new().with_template("p", "{{ dyn.user }}");
        let mut ctx = context(fs, TaintPolicy::Propagating);

        assert_eq!(
            render("{%include \"p\"%}", &mut ctx).unwrap(),
            "{% include \"p\" %}"
        );
        let store = ctx.registers().take_cached_file_system().unwrap();
        assert_eq!(store.templates()["p"], "{{ dyn.user }}");
        assert_eq!(store.rendered_results()["p"], "live-user");
    }

    #[test]
    fn tainted_parent_stores_raw_source_of_inlined_children() {
        let fs = MemoryFileSystem::new()
            .with_template("card", "{% include 'user' %}+{% include 'frame' %}")
            .with_template("user", "{{ dyn.name }}")
            .with_template("frame", "[{% include 'border' %}]")
            .with_template("border", "{{ static.v }}");
        let mut ctx = context(fs, TaintPolicy::Propagating);

        assert_eq!(
            render("{% include 'card' %}", &mut ctx).unwrap(),
            "{% include 'card' %}"
        );
        let store = ctx.registers().take_cached_file_system().unwrap();
        assert_eq!(
            store.templates().keys().collect::<Vec<_>>(),
            ["border", "card", "frame", "user"]
        );
        assert_eq!(store.templates()["frame"], "[{% include 'border' %}]");
        assert_eq!(
            store.rendered_results().keys().collect::<Vec<_>>(),
            ["card", "user"]
        );
        assert_eq!(store.rendered_results()["card"], "{% include 'user' %}+[s]");
    }

    #[test]
    fn disabled_caching_delegates_untouched() {
        let fs = MemoryFileSystem::new().with_template("p", "{{ dyn.user }}");
        let mut ctx = context(fs, TaintPolicy::Propagating);
        ctx.set_caching(false);

        assert_eq!(render("{% include 'p' %}", &mut ctx).unwrap(), "live-user");
        assert!(ctx.registers().take_cached_file_system().is_none());
        assert_eq!(ctx.registers().stack_depth(), 0);
    }

    #[test]
    fn local_only_policy_keeps_ancestors_cacheable() {
        let fs = MemoryFileSystem::new()
            .with_template("outer", "<{% include 'inner' %}>")
            .with_template("inner", "{{ dyn.user }}");
        let mut ctx = context(fs, TaintPolicy::LocalOnly);

        assert_eq!(
            render("{% include 'outer' %}", &mut ctx).unwrap(),
            "<{% include 'inner' %}>"
        );
        let store = ctx.registers().take_cached_file_system().unwrap();
        assert_eq!(store.rendered_results().keys().collect::<Vec<_>>(), ["inner"]);
    }

    #[test]
    fn failing_partial_pops_frame_and_writes_nothing() {
        let fs = MemoryFileSystem::new()
            .with_template("outer", "{{ dyn.user }}{% include 'missing' %}");
        let mut ctx = context(fs, TaintPolicy::Propagating);

        let err = render("{% include 'outer' %}", &mut ctx).unwrap_err();

        assert!(matches!(
            err,
            RenderError::FileSystem(FileSystemError::NotFound { ref name }) if name == "missing"
        ));
        assert_eq!(ctx.registers().stack_depth(), 0);
        assert!(ctx.registers().take_cached_file_system().is_none());
    }

    #[test]
    fn sibling_after_failure_is_tracked_cleanly() {
        let fs = MemoryFileSystem::new()
            .with_template("bad", "{{ dyn.user }}{% include 'missing' %}")
            .with_template("good", "ok");
        let mut ctx = context(fs, TaintPolicy::Propagating);

        assert!(render("{% include 'bad' %}", &mut ctx).is_err());
        assert_eq!(render("{% include 'good' %}", &mut ctx).unwrap(), "ok");
    }
}

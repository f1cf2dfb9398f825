//! The `include` tag: render a named partial and substitute its output.
//!
//! ## Core types
//!
//! - [`Include`]: trait implemented by every inclusion strategy.
//! - [`NativeInclude`]: loads, parses and renders the partial.
//! - [`CachedInclude`]: wraps another [`Include`] and decides, per partial,
//!   whether its output can be frozen into the template or must stay a
//!   re-executable directive.
//!
//! The [`Environment`] holds exactly one [`Include`]; swapping it is how the
//! cache-aware behavior replaces the native tag.

use crate::{
    context::Context,
    environment::Environment,
    template::{IncludeTag, RenderError, Template},
};

pub mod cached;

pub use cached::CachedInclude;

/// An inclusion strategy.
///
/// Implementations may wrap another `Include` and delegate to it, the same way
/// [`CachedInclude`] wraps [`NativeInclude`].
///
/// # Examples
///
/// ```
/// use cached_include::{Context, Environment};
/// use cached_include::include::{Include, NativeInclude};
/// use cached_include::template::{IncludeTag, RenderError};
///
/// /// Wraps every partial in an HTML comment naming it.
/// struct Annotated<I>(I);
///
/// impl<I: Include> Include for Annotated<I> {
///     fn render(
///         &self,
///         tag: &IncludeTag,
///         env: &Environment,
///         ctx: &mut Context,
///     ) -> Result<String, RenderError> {
///         let body = self.0.render(tag, env, ctx)?;
///         Ok(format!("<!-- {} -->{body}", tag.template_key()))
///     }
/// }
///
/// let env = Environment::with_include(Annotated(NativeInclude));
/// ```
pub trait Include {
    /// Renders the partial named by `tag` and returns the text to substitute.
    ///
    /// # Errors
    ///
    /// Any [`RenderError`] raised while loading or rendering the partial.
    fn render(
        &self,
        tag: &IncludeTag,
        env: &Environment,
        ctx: &mut Context,
    ) -> Result<String, RenderError>;
}

/// The engine's own inclusion behavior.
///
/// Reads the partial from the context's file system and renders it in the
/// same context, one nesting level deeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeInclude;

impl Include for NativeInclude {
    fn render(
        &self,
        tag: &IncludeTag,
        env: &Environment,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        let name = tag.template_key();
        ctx.nested(|ctx| {
            let source = ctx.file_system().read_template_file(name)?;
            Template::parse(&source)?.render(env, ctx)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{file_system::MemoryFileSystem, template::Node};

    fn tag(source: &str) -> IncludeTag {
        match Template::parse(source).unwrap().nodes() {
            [Node::Include(tag)] => tag.clone(),
            other => panic!("expected a single include, got {other:?}"),
        }
    }

    #[test]
    fn native_include_renders_partial() {
        let fs = Rc::new(MemoryFileSystem::new().with_template("p", "partial"));
        let mut ctx = Context::new(fs.clone());

        let out = NativeInclude
            .render(&tag("{% include 'p' %}"), &Environment::new(), &mut ctx)
            .unwrap();

        assert_eq!(out, "partial");
        assert_eq!(fs.reads("p"), 1);
        assert_eq!(ctx.include_depth(), 0);
    }

    #[test]
    fn native_include_restores_depth_after_error() {
        let mut ctx = Context::new(Rc::new(MemoryFileSystem::new()));
        let result = NativeInclude.render(&tag("{% include 'x' %}"), &Environment::new(), &mut ctx);
        assert!(result.is_err());
        assert_eq!(ctx.include_depth(), 0);
    }
}

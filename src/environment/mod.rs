//! Rendering environment and the precompile / render protocol.
//!
//! A precompile render produces a *hybrid* template: partials that only used
//! static data are frozen in as text, partials that touched an intercepted
//! data object stay as `{% include %}` directives. The hybrid is what a caller
//! caches. Rendering it later with caching off, from the original template
//! source or from the [`CachedFileSystem`] written during precompile, produces
//! the same text as a plain render.
//!
//! ```text
//! precompile(template) ──► Precompiled { source: hybrid, artifacts }
//!                                   │
//! render(parse(hybrid)) ◄───────────┘  re-executes only the directives
//! ```

use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::{
    context::Context,
    file_system::CachedFileSystem,
    include::{CachedInclude, Include, NativeInclude},
    template::{IncludeTag, ParseError, RenderError, Template},
};

/// Holds the inclusion strategy used for every `include` in a render.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use cached_include::{Context, Environment, Template};
/// use cached_include::file_system::MemoryFileSystem;
///
/// let fs = MemoryFileSystem::new().with_template("nav", "<nav/>");
/// let mut ctx = Context::new(Rc::new(fs));
/// let template = Template::parse("{% include 'nav' %}<main/>").unwrap();
///
/// let precompiled = Environment::cached().precompile(&template, &mut ctx).unwrap();
/// assert_eq!(precompiled.source, "<nav/><main/>");
/// assert!(precompiled.artifacts.is_empty());
/// ```
#[derive(Clone)]
pub struct Environment {
    include: Rc<dyn Include>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Environment using the engine's native include.
    pub fn new() -> Self {
        Self::with_include(NativeInclude)
    }

    /// Environment with [`CachedInclude`] registered in place of the native include.
    pub fn cached() -> Self {
        Self::with_include(CachedInclude::new(NativeInclude))
    }

    pub fn with_include(include: impl Include + 'static) -> Self {
        Self {
            include: Rc::new(include),
        }
    }

    /// Renders one `include` tag through the registered strategy.
    ///
    /// # Errors
    ///
    /// Whatever the strategy returns.
    pub fn include(&self, tag: &IncludeTag, ctx: &mut Context) -> Result<String, RenderError> {
        self.include.render(tag, self, ctx)
    }

    /// Top-level render.
    ///
    /// Starts from fresh registers: any stack or artifact store left by an
    /// earlier render on `ctx` is discarded first. With caching on, the store
    /// this render writes stays on the registers until taken.
    ///
    /// # Errors
    ///
    /// The first [`RenderError`] raised during the render.
    pub fn render(&self, template: &Template, ctx: &mut Context) -> Result<String, RenderError> {
        ctx.registers().reset();
        let _span = debug_span!("render", caching = ctx.caching()).entered();
        template.render(self, ctx)
    }

    /// Renders `template` in caching mode on fresh registers.
    ///
    /// The caching flag is restored afterwards, and the stack and artifact
    /// store are taken out of the context so the next render starts clean.
    ///
    /// # Errors
    ///
    /// The first [`RenderError`] raised during the render; no artifacts are
    /// returned in that case.
    pub fn precompile(
        &self,
        template: &Template,
        ctx: &mut Context,
    ) -> Result<Precompiled, RenderError> {
        let registers = ctx.registers().clone();
        let previous = registers.caching();
        registers.reset();
        registers.set_caching(true);

        let result = {
            let _span = debug_span!("precompile").entered();
            template.render(self, ctx)
        };

        registers.set_caching(previous);
        let artifacts = registers.take_cached_file_system().unwrap_or_default();
        registers.reset();

        let source = result?;
        debug!(
            dynamic = artifacts.templates().len(),
            bytes = source.len(),
            "precompiled template"
        );
        Ok(Precompiled { source, artifacts })
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

/// Output of [`Environment::precompile`].
///
/// Frozen partial output is spliced into [`source`](Self::source) as-is. If
/// static data renders to text containing `{{` or `{%`, the hybrid re-parses
/// that text as markup: [`parse`](Self::parse) may fail, or the replay may
/// differ from a plain render. The same holds for the memoized output in
/// [`artifacts`](Self::artifacts). Keep template delimiters out of data that
/// flows into precompiled partials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precompiled {
    /// Hybrid template source.
    pub source: String,
    /// Partials the hybrid still includes, with their memoized output.
    pub artifacts: CachedFileSystem,
}

impl Precompiled {
    /// Parses the hybrid source.
    ///
    /// # Errors
    ///
    /// [`ParseError`] if the source was edited into something unparseable.
    pub fn parse(&self) -> Result<Template, ParseError> {
        Template::parse(&self.source)
    }

    /// Renders the hybrid with [`artifacts`](Self::artifacts) as the template
    /// source, restoring the context's own file system afterwards.
    ///
    /// # Errors
    ///
    /// Any [`RenderError`]; a directive whose partial is not in the artifacts
    /// fails with `NotFound`.
    pub fn render(&self, env: &Environment, ctx: &mut Context) -> Result<String, RenderError> {
        let template = self.parse()?;
        let original = ctx.file_system();
        ctx.set_file_system(Rc::new(self.artifacts.clone()));
        let result = env.render(&template, ctx);
        ctx.set_file_system(original);
        result
    }
}

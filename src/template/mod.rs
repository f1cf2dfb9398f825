//! Parsed templates and rendering.
//!
//! The engine is deliberately small: text, variable output and `include`. The
//! interesting part is that `include` is rendered through whatever
//! [`Include`](crate::include::Include) the [`Environment`] carries, which is how
//! the cache-aware include takes the native one's place.

use thiserror::Error;

use crate::{context::Context, environment::Environment, file_system::FileSystemError};

pub mod parser;

pub use parser::{IncludeTag, Node, ParseError, Variable};

/// Errors produced while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error("data object failed on `{name}`: {message}")]
    Object { name: String, message: String },

    #[error("include nesting too deep (depth {depth})")]
    NestingTooDeep { depth: usize },
}

impl RenderError {
    /// Error for a data object member that could not be resolved.
    pub fn object(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Object {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A parsed template.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use cached_include::{Context, Environment, Template};
/// use cached_include::file_system::MemoryFileSystem;
///
/// let fs = MemoryFileSystem::new().with_template("name", "{{ user.name }}");
/// let mut ctx = Context::new(Rc::new(fs));
/// ctx.assign("user", serde_json::json!({ "name": "Ada" }));
///
/// let template = Template::parse("Hi {% include 'name' %}!").unwrap();
/// let out = template.render(&Environment::new(), &mut ctx).unwrap();
/// assert_eq!(out, "Hi Ada!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parses `source`.
    ///
    /// # Errors
    ///
    /// [`ParseError`] for malformed or unsupported markup.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            nodes: parser::parse(source)?,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Names of the partials this template includes directly, in order.
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Include(tag) => Some(tag.template_key()),
            _ => None,
        })
    }

    /// Renders the template. Re-entrant: partials are rendered through here too.
    ///
    /// # Errors
    ///
    /// The first [`RenderError`] raised by a partial, a lookup or a data object.
    pub fn render(&self, env: &Environment, ctx: &mut Context) -> Result<String, RenderError> {
        let mut out = String::new();

        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(variable) => {
                    let value = variable
                        .lookups()
                        .iter()
                        .try_fold(ctx.find_variable(variable.name()), |value, key| {
                            value.get(key)
                        })?;
                    out.push_str(&value.render()?);
                }
                Node::Include(tag) => out.push_str(&env.include(tag, ctx)?),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::file_system::MemoryFileSystem;

    fn render(source: &str, fs: MemoryFileSystem) -> Result<String, RenderError> {
        let mut ctx = Context::new(Rc::new(fs));
        ctx.assign("site", json!({ "name": "Shop", "tags": ["a", "b"] }));
        Template::parse(source)?.render(&Environment::new(), &mut ctx)
    }

    #[test]
    fn renders_text_and_variables() {
        let out = render("{{ site.name }}: {{ site.tags.size }}", MemoryFileSystem::new());
        assert_eq!(out.unwrap(), "Shop: 2");
    }

    #[test]
    fn unknown_variables_render_empty() {
        assert_eq!(render("[{{ nope.deeper }}]", MemoryFileSystem::new()).unwrap(), "[]");
    }

    #[test]
    fn renders_nested_includes() {
        let fs = MemoryFileSystem::new()
            .with_template("outer", "<{% include 'inner' %}>")
            .with_template("inner", "{{ site.name }}");
        assert_eq!(render("{% include 'outer' %}", fs).unwrap(), "<Shop>");
    }

    #[test]
    fn missing_partial_surfaces_not_found() {
        let err = render("{% include 'ghost' %}", MemoryFileSystem::new()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::FileSystem(FileSystemError::NotFound { ref name }) if name == "ghost"
        ));
    }

    #[test]
    fn parse_error_inside_partial_propagates() {
        let fs = MemoryFileSystem::new().with_template("broken", "{{ oops");
        let err = render("{% include 'broken' %}", fs).unwrap_err();
        assert!(matches!(err, RenderError::Parse(ParseError::UnterminatedOutput { .. })));
    }

    #[test]
    fn self_inclusion_hits_depth_limit() {
        let fs = MemoryFileSystem::new().with_template("loop", "{% include 'loop' %}");
        let err = render("{% include 'loop' %}", fs).unwrap_err();
        assert!(matches!(err, RenderError::NestingTooDeep { depth: 100 }));
    }

    #[test]
    fn lists_direct_includes() {
        let template = Template::parse("{% include 'a' %}x{% include \"b\" %}").unwrap();
        assert_eq!(template.includes().collect::<Vec<_>>(), ["a", "b"]);
    }
}

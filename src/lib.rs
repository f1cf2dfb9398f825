//! # cached-include
//!
//! Cache-eligibility tracking for template includes.
//!
//! While a template renders, every `{% include %}` is tracked on a stack. Data
//! objects wrapped with [`Uncacheable::uncacheable`] taint that stack whenever
//! a template reads from them. In caching mode, partials that stayed clean are
//! frozen into the output as text, and tainted ones are left as `include`
//! directives, giving a hybrid template that is safe to cache and only
//! re-executes the dynamic parts.
//!
//! Frozen text is spliced into the hybrid unescaped, so data containing `{{`
//! or `{%` is read back as markup; see [`Precompiled`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use cached_include::file_system::MemoryFileSystem;
//! use cached_include::object::{DataObject, Value};
//! use cached_include::template::RenderError;
//! use cached_include::{Context, Environment, Template, Uncacheable};
//!
//! struct Visitor;
//!
//! impl DataObject for Visitor {
//!     fn invoke(&self, _name: &str) -> Result<Value, RenderError> {
//!         Ok(Value::from("Ada"))
//!     }
//!     fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
//!         Box::new(self.uncacheable())
//!     }
//! }
//!
//! let fs = MemoryFileSystem::new()
//!     .with_template("greeting", "Hi {{ visitor.name }}")
//!     .with_template("footer", "(c) shop");
//! let mut ctx = Context::new(Rc::new(fs));
//! ctx.assign_object("visitor", Visitor);
//!
//! let env = Environment::cached();
//! let template = Template::parse("{% include 'greeting' %} | {% include 'footer' %}").unwrap();
//!
//! let precompiled = env.precompile(&template, &mut ctx).unwrap();
//! assert_eq!(precompiled.source, "{% include 'greeting' %} | (c) shop");
//!
//! let output = precompiled.render(&env, &mut ctx).unwrap();
//! assert_eq!(output, "Hi Ada | (c) shop");
//! ```

pub mod context;
pub mod environment;
pub mod file_system;
pub mod include;
pub mod object;
pub mod stack;
pub mod template;
pub mod uncacheable;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::{Context, Registers, RenderOptions};
pub use environment::{Environment, Precompiled};
pub use file_system::{CachedFileSystem, FileSystem, FileSystemError, MemoryFileSystem};
pub use include::{CachedInclude, Include, NativeInclude};
pub use object::{DataObject, Value};
pub use stack::{TaintPolicy, TemplateStack};
pub use template::{ParseError, RenderError, Template};
pub use uncacheable::{Uncacheable, UncacheableDecorator};

//! Template source providers.
//!
//! [`FileSystem`] is the only way the engine obtains partial source text. Two
//! providers ship with the crate:
//!
//! - [`MemoryFileSystem`]: a name → source map, handy for embedding and tests.
//! - [`CachedFileSystem`]: the artifact store produced by a precompile render,
//!   used as a drop-in provider when the hybrid template is rendered later.

use std::{cell::RefCell, collections::HashMap};

use thiserror::Error;

pub mod cached;

pub use cached::CachedFileSystem;

/// Errors returned by a [`FileSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileSystemError {
    #[error("template not found: {name}")]
    NotFound { name: String },
}

impl FileSystemError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

/// Looks up template source by name.
pub trait FileSystem {
    /// Returns the source text for `name`.
    ///
    /// # Errors
    ///
    /// [`FileSystemError::NotFound`] when no template is registered under `name`.
    fn read_template_file(&self, name: &str) -> Result<String, FileSystemError>;
}

/// In-memory template provider.
///
/// Counts every lookup so callers can see which partials were actually loaded.
///
/// # Examples
///
/// ```
/// use cached_include::file_system::{FileSystem, MemoryFileSystem};
///
/// let fs = MemoryFileSystem::new().with_template("greeting", "hello");
/// assert_eq!(fs.read_template_file("greeting").unwrap(), "hello");
/// assert_eq!(fs.reads("greeting"), 1);
/// assert!(fs.read_template_file("missing").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    templates: HashMap<String, String>,
    reads: RefCell<HashMap<String, usize>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `name`, replacing any previous entry.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    /// Number of times `name` has been read, including failed lookups.
    pub fn reads(&self, name: &str) -> usize {
        self.reads.borrow().get(name).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String, FileSystemError> {
        *self.reads.borrow_mut().entry(name.to_owned()).or_default() += 1;
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| FileSystemError::not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_template_is_not_found() {
        let fs = MemoryFileSystem::new();
        assert_eq!(
            fs.read_template_file("nope"),
            Err(FileSystemError::NotFound {
                name: "nope".into()
            })
        );
        assert_eq!(fs.reads("nope"), 1);
    }

    #[test]
    fn insert_replaces_existing_source() {
        let mut fs = MemoryFileSystem::new().with_template("a", "one");
        fs.insert("a", "two");
        assert_eq!(fs.read_template_file("a").unwrap(), "two");
    }

    #[test]
    fn error_message_names_template() {
        let err = FileSystemError::not_found("header");
        assert_eq!(err.to_string(), "template not found: header");
    }
}

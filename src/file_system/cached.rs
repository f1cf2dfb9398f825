//! Artifact store written by the cache-aware include.
//!
//! For every partial that had to stay dynamic, the precompile render records
//! its raw source (so the partial can be executed again later) and the text it
//! rendered to (so the very next render of the hybrid template can skip the
//! work). Reading prefers the rendered text.
//!
//! Rendered results are not invalidated. They are only correct for renders
//! whose dynamic inputs match the render that produced them; persist the
//! [`without_rendered_results`](CachedFileSystem::without_rendered_results)
//! form when that cannot be guaranteed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{FileSystem, FileSystemError};

/// Raw sources and memoized output for partials left dynamic by a precompile.
///
/// # Examples
///
/// ```
/// use cached_include::file_system::{CachedFileSystem, FileSystem};
///
/// let mut store = CachedFileSystem::new();
/// store.insert_template("user", "{{ user.name }}");
/// store.insert_rendered_result("user", "Ada");
///
/// assert_eq!(store.read_template_file("user").unwrap(), "Ada");
/// let persisted = store.without_rendered_results();
/// assert_eq!(persisted.read_template_file("user").unwrap(), "{{ user.name }}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFileSystem {
    templates: BTreeMap<String, String>,
    #[serde(default)]
    rendered_results: BTreeMap<String, String>,
}

impl CachedFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with raw template sources.
    pub fn with_templates(templates: BTreeMap<String, String>) -> Self {
        Self {
            templates,
            rendered_results: BTreeMap::new(),
        }
    }

    /// Raw sources of partials that were found uncacheable, and of the partials
    /// inlined beneath them.
    pub fn templates(&self) -> &BTreeMap<String, String> {
        &self.templates
    }

    /// Output those partials produced during the discovering render.
    pub fn rendered_results(&self) -> &BTreeMap<String, String> {
        &self.rendered_results
    }

    /// Records a raw source. Last write wins.
    pub fn insert_template(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    /// Records a rendered result. Last write wins.
    pub fn insert_rendered_result(&mut self, name: impl Into<String>, output: impl Into<String>) {
        self.rendered_results.insert(name.into(), output.into());
    }

    /// Drops the memoized output, keeping only the raw sources.
    #[must_use]
    pub fn without_rendered_results(mut self) -> Self {
        self.rendered_results.clear();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.rendered_results.is_empty()
    }
}

impl FileSystem for CachedFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String, FileSystemError> {
        self.rendered_results
            .get(name)
            .or_else(|| self.templates.get(name))
            .cloned()
            .ok_or_else(|| FileSystemError::not_found(name))
    }
}

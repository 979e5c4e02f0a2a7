//! Document Loaders
//!
//! Loaders turn a source document into the flat block sequence the
//! classifier works on. Everything after this point is format-agnostic.
//!
//! ```text
//! Document (XHTML, JSON block dump)
//!     ↓
//! [Format-specific DocumentLoader]
//!     ↓
//! Vec<Block> (index = position)
//!     ↓
//! [Classifier]
//! ```

pub mod json;
pub mod xhtml;

pub use json::JsonLoader;
pub use xhtml::XhtmlLoader;

use crate::types::Block;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Converts document text into blocks
pub trait DocumentLoader {
    /// Parse document content. Returned blocks are indexed 0..n in document order.
    fn load(&self, content: &str) -> Result<Vec<Block>>;

    /// Read and parse a file
    fn load_file(&self, path: &Path) -> Result<Vec<Block>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document {}", path.display()))?;
        self.load(&content)
    }

    /// Loader name for logging
    fn name(&self) -> &str;

    fn supports_file_type(&self, path: &Path) -> bool;
}

/// Pick a loader by file extension
pub fn loader_for_path(path: &Path) -> Result<Box<dyn DocumentLoader>> {
    let loaders: Vec<Box<dyn DocumentLoader>> = vec![Box::new(XhtmlLoader), Box::new(JsonLoader)];
    match loaders.into_iter().find(|l| l.supports_file_type(path)) {
        Some(loader) => Ok(loader),
        None => bail!(
            "no loader for {} (expected .xhtml, .html, .htm or .json)",
            path.display()
        ),
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

//! Asset-catalog manifest rewriting
//!
//! A `Contents.json` lists its images under `"filename"` keys at any depth.
//! After the images are converted those names must point at the new files,
//! so every recognised image extension found there is swapped for the
//! target extension. Nothing else in the document is touched and key order
//! is kept (`serde_json` is built with `preserve_order`).

use crate::classifier::IMAGE_EXTENSIONS;
use crate::codec::TargetFormat;
use crate::{CatalogError, Result};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Key whose string values name image files.
pub const FILENAME_KEY: &str = "filename";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteReport {
    /// Number of `"filename"` values that were rewritten
    pub changed: usize,
}

impl RewriteReport {
    pub fn is_unchanged(&self) -> bool {
        self.changed == 0
    }
}

pub struct ManifestRewriter {
    target: TargetFormat,
}

impl ManifestRewriter {
    pub fn new(target: TargetFormat) -> Self {
        Self { target }
    }

    /// Rewrite the manifest at `path` in place.
    ///
    /// The file is left untouched when no value needed changing.
    pub fn rewrite(&self, path: &Path) -> Result<RewriteReport> {
        let mut document = load(path)?;
        let changed = self.rewrite_value(&mut document);

        if changed > 0 {
            store(path, &document)?;
            debug!(path = %path.display(), changed, "Manifest rewritten");
        }
        Ok(RewriteReport { changed })
    }

    /// Rewrite an in-memory document, returning how many values changed.
    pub fn rewrite_value(&self, value: &mut Value) -> usize {
        match value {
            Value::Object(map) => map
                .iter_mut()
                .map(|(key, child)| match child {
                    Value::String(name) if key == FILENAME_KEY => {
                        match replace_extension(name, self.target) {
                            Some(renamed) => {
                                *name = renamed;
                                1
                            }
                            None => 0,
                        }
                    }
                    other => self.rewrite_value(other),
                })
                .sum(),
            Value::Array(items) => items.iter_mut().map(|item| self.rewrite_value(item)).sum(),
            _ => 0,
        }
    }
}

/// Replace a trailing recognised image extension (any case) with the
/// extension of `target`.
///
/// Returns `None` when `name` carries no such extension, has nothing before
/// the dot, or is already in the target format (such images are never
/// converted, so their names must stay as they are).
pub fn replace_extension(name: &str, target: TargetFormat) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('/') || target.matches_extension(ext) {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .find(|known| ext.eq_ignore_ascii_case(known))
        .map(|_| format!("{}.{}", stem, target.extension()))
}

fn load(path: &Path) -> Result<Value> {
    let load_error = |reason: String| CatalogError::ManifestLoad {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| load_error(e.to_string()))?;
    let document: Value = serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))?;
    if !document.is_object() {
        return Err(load_error("top level is not a JSON object".to_string()));
    }
    Ok(document)
}

/// Write next to the original and rename over it, so a failed write never
/// leaves a truncated manifest behind.
fn store(path: &Path, document: &Value) -> Result<()> {
    let write_error = |reason: String| CatalogError::ManifestWrite {
        path: path.to_path_buf(),
        reason,
    };

    let mut text = serde_json::to_string_pretty(document).map_err(|e| write_error(e.to_string()))?;
    text.push('\n');

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_error(e.to_string()))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| write_error(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_error(e.to_string()))?;

    if let Ok(meta) = fs::metadata(path) {
        let _ = fs::set_permissions(tmp.path(), meta.permissions());
    }
    tmp.persist(path).map_err(|e| write_error(e.error.to_string()))?;
    Ok(())
}

//! Recursive directory traversal
//!
//! [`walk`] is a lazy iterator over every descendant of a root, each paired
//! with its classification. It knows nothing about scheduling.

use crate::classifier::{classify, PathClassification};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPath {
    pub path: PathBuf,
    pub class: PathClassification,
}

pub struct DirectoryWalker {
    inner: walkdir::IntoIter,
    unreadable: usize,
}

/// Walk the tree below `root` (root itself excluded), following symlinks.
/// Entries that cannot be read are skipped; loops are reported by walkdir as
/// errors and skipped the same way.
pub fn walk(root: &Path) -> DirectoryWalker {
    DirectoryWalker {
        inner: WalkDir::new(root).min_depth(1).follow_links(true).into_iter(),
        unreadable: 0,
    }
}

impl DirectoryWalker {
    /// Entries skipped so far because they could not be read.
    pub fn unreadable(&self) -> usize {
        self.unreadable
    }

    /// Only the entries that become jobs (images and manifests).
    pub fn work_items(self) -> impl Iterator<Item = ClassifiedPath> {
        self.filter(|item| item.class.is_work_item())
    }
}

impl Iterator for DirectoryWalker {
    type Item = ClassifiedPath;

    fn next(&mut self) -> Option<ClassifiedPath> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    let class = classify(entry.path());
                    return Some(ClassifiedPath {
                        path: entry.into_path(),
                        class,
                    });
                }
                Err(e) => {
                    self.unreadable += 1;
                    debug!(
                        path = ?e.path(),
                        error = %e,
                        "Skipping unreadable entry"
                    );
                }
            }
        }
    }
}

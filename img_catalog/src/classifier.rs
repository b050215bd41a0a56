//! Path classification
//!
//! Decides from a path alone whether it is an image to convert, an
//! asset-catalog manifest to rewrite, a directory to descend into, or
//! something to ignore. Nothing is cached: every call re-reads the
//! file-system kind.

use serde::Serialize;
use shared_utils::common_utils::{get_extension_lowercase, has_extension};
use std::fs;
use std::path::Path;

/// Recognised source image extensions, in replacement order.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Asset-catalog container directories.
pub const CONTAINER_EXTENSIONS: &[&str] = &[
    "xcassets",
    "imageset",
    "appiconset",
    "launchimage",
    "stickersiconset",
];

/// Extension of asset-catalog manifests (`Contents.json`).
pub const MANIFEST_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathClassification {
    Image,
    Manifest,
    Directory,
    Invalid,
}

impl PathClassification {
    /// Image and Manifest paths become jobs; everything else does not.
    pub fn is_work_item(self) -> bool {
        matches!(self, PathClassification::Image | PathClassification::Manifest)
    }

    pub fn label(self) -> &'static str {
        match self {
            PathClassification::Image => "image",
            PathClassification::Manifest => "manifest",
            PathClassification::Directory => "directory",
            PathClassification::Invalid => "invalid",
        }
    }
}

/// Classify `path`. A failed stat (missing file, permission denied) is Invalid.
pub fn classify(path: &Path) -> PathClassification {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => PathClassification::Directory,
        Ok(meta) if meta.is_file() => classify_by_extension(path),
        _ => PathClassification::Invalid,
    }
}

/// Extension-only part of [`classify`], for paths already known to be files.
pub fn classify_by_extension(path: &Path) -> PathClassification {
    if has_extension(path, IMAGE_EXTENSIONS) {
        PathClassification::Image
    } else if get_extension_lowercase(path) == MANIFEST_EXTENSION {
        PathClassification::Manifest
    } else {
        PathClassification::Invalid
    }
}

/// The recognised image extension `path` carries, lower-cased.
pub fn image_extension(path: &Path) -> Option<&'static str> {
    let ext = get_extension_lowercase(path);
    IMAGE_EXTENSIONS.iter().copied().find(|known| *known == ext)
}

/// Whether `path` is an asset-catalog container directory (`*.xcassets`, `*.imageset`, ...).
pub fn is_asset_container(path: &Path) -> bool {
    has_extension(path, CONTAINER_EXTENSIONS) && path.is_dir()
}

/// Selection-side allow-list: image files, manifests and directories.
pub fn is_accepted_input(path: &Path) -> bool {
    classify(path) != PathClassification::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_images_by_extension_any_case() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.JPG", "c.Jpeg"] {
            assert_eq!(classify(&touch(&dir, name)), PathClassification::Image, "{}", name);
        }
    }

    #[test]
    fn test_manifest_and_invalid() {
        let dir = TempDir::new().unwrap();
        assert_eq!(classify(&touch(&dir, "Contents.json")), PathClassification::Manifest);
        assert_eq!(classify(&touch(&dir, "notes.txt")), PathClassification::Invalid);
        assert_eq!(classify(&touch(&dir, "photo.heic")), PathClassification::Invalid);
        assert_eq!(classify(&touch(&dir, "noext")), PathClassification::Invalid);
    }

    #[test]
    fn test_directory_wins_over_extension() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("Assets.xcassets");
        fs::create_dir(&catalog).unwrap();
        let odd = dir.path().join("looks_like.png");
        fs::create_dir(&odd).unwrap();

        assert_eq!(classify(&catalog), PathClassification::Directory);
        assert_eq!(classify(&odd), PathClassification::Directory);
        assert!(is_asset_container(&catalog));
        assert!(!is_asset_container(&odd));
    }

    #[test]
    fn test_missing_path_is_invalid() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone.png");
        assert_eq!(classify(&gone), PathClassification::Invalid);
        assert!(!is_accepted_input(&gone));
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Path::new("x/y.JPEG")), Some("jpeg"));
        assert_eq!(image_extension(Path::new("x/y.gif")), None);
    }

    #[test]
    fn test_work_items() {
        assert!(PathClassification::Image.is_work_item());
        assert!(PathClassification::Manifest.is_work_item());
        assert!(!PathClassification::Directory.is_work_item());
        assert!(!PathClassification::Invalid.is_work_item());
    }

    proptest! {
        #[test]
        fn prop_classify_is_idempotent(stem in "[a-zA-Z0-9_]{1,12}", ext in prop::sample::select(vec!["png", "JPG", "jpeg", "json", "txt", "heic", ""])) {
            let dir = TempDir::new().unwrap();
            let name = if ext.is_empty() { stem.clone() } else { format!("{}.{}", stem, ext) };
            let path = touch(&dir, &name);

            let first = classify(&path);
            prop_assert_eq!(first, classify(&path));
            prop_assert_eq!(first, classify_by_extension(&path));
        }
    }
}

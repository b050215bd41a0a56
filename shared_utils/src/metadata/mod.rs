//! Metadata carry-over for converted files
//!
//! Layers, applied in order: embedded tags (ExifTool), extended attributes,
//! permissions, then timestamps. exiftool rewrites the file, so timestamps
//! are always set last.

use std::path::Path;

mod exif;

pub use exif::copy_embedded_metadata;

/// What [`carry_metadata`] managed to transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CarryReport {
    pub embedded: bool,
    pub xattrs: usize,
    pub permissions: bool,
    pub timestamps: bool,
}

/// Best-effort transfer of `src`'s metadata onto `dst`. Never fails; each
/// layer that could not be applied is logged at `warn`.
pub fn carry_metadata(src: &Path, dst: &Path) -> CarryReport {
    let mut report = CarryReport::default();

    match copy_embedded_metadata(src, dst) {
        Ok(copied) => report.embedded = copied,
        Err(e) => tracing::warn!(src = %src.display(), dst = %dst.display(), error = %e, "Embedded metadata not copied"),
    }

    report.xattrs = copy_xattrs(src, dst);

    if let Ok(metadata) = std::fs::metadata(src) {
        report.permissions = match std::fs::set_permissions(dst, metadata.permissions()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(dst = %dst.display(), error = %e, "Failed to set permissions");
                false
            }
        };
    }

    report.timestamps = apply_file_timestamps(src, dst);
    report
}

fn copy_xattrs(src: &Path, dst: &Path) -> usize {
    if !xattr::SUPPORTED_PLATFORM {
        return 0;
    }
    let Ok(names) = xattr::list(src) else {
        return 0;
    };
    let mut copied = 0;
    for name in names {
        if let Ok(Some(value)) = xattr::get(src, &name) {
            if xattr::set(dst, &name, &value).is_ok() {
                copied += 1;
            }
        }
    }
    copied
}

fn apply_file_timestamps(src: &Path, dst: &Path) -> bool {
    let Ok(m) = std::fs::metadata(src) else {
        return false;
    };
    let atime = filetime::FileTime::from_last_access_time(&m);
    let mtime = filetime::FileTime::from_last_modification_time(&m);
    match filetime::set_file_times(dst, atime, mtime) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(dst = %dst.display(), error = %e, "Failed to set file times");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_carry_metadata_copies_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        let dst = dir.path().join("dst.heic");
        fs::write(&src, b"source").unwrap();
        fs::write(&dst, b"dest").unwrap();

        let old = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_times(&src, old, old).unwrap();

        let report = carry_metadata(&src, &dst);
        assert!(report.timestamps);
        assert!(report.permissions);

        let dst_meta = fs::metadata(&dst).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&dst_meta), old);
        // pixels/bytes are untouched by the carry-over itself unless exiftool ran
        if !report.embedded {
            assert_eq!(fs::read(&dst).unwrap(), b"dest");
        }
    }

    #[test]
    fn test_carry_metadata_missing_source_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("dst.heic");
        fs::write(&dst, b"dest").unwrap();

        let report = carry_metadata(&dir.path().join("gone.png"), &dst);
        assert!(!report.timestamps);
        assert!(!report.permissions);
    }
}

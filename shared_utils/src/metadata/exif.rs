//! ExifTool wrapper for embedded metadata (EXIF/IPTC/XMP/ICC)
//!
//! Encoders only write pixels; tags are copied over afterwards with
//! `exiftool -tagsfromfile`. Availability is checked once per process.

use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Instant;

static EXIFTOOL_AVAILABLE: OnceLock<bool> = OnceLock::new();

fn is_exiftool_available() -> bool {
    *EXIFTOOL_AVAILABLE.get_or_init(|| crate::common_utils::is_command_available("exiftool"))
}

/// Copy all writable tags from `src` into `dst` in place.
///
/// Returns `Ok(false)` when exiftool is not installed.
pub fn copy_embedded_metadata(src: &Path, dst: &Path) -> io::Result<bool> {
    if !is_exiftool_available() {
        static WARNED: OnceLock<()> = OnceLock::new();
        WARNED.get_or_init(|| {
            tracing::warn!("ExifTool not found; embedded EXIF/IPTC/XMP will not be carried over");
        });
        return Ok(false);
    }

    let start = Instant::now();
    let output = Command::new("exiftool")
        .arg("-tagsfromfile")
        .arg(src)
        .arg("-all:all")
        .arg("-ICC_Profile<ICC_Profile")
        .arg("-use")
        .arg("MWG")
        .arg("-overwrite_original")
        .arg("-q")
        .arg("-m")
        .arg(dst)
        .output()?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let src_str = src.to_string_lossy();
    let dst_str = dst.to_string_lossy();
    crate::logging::log_external_tool(
        "exiftool",
        &["-tagsfromfile", &src_str, "-all:all", &dst_str],
        &stderr,
        output.status.code(),
        start.elapsed(),
    );

    if output.status.success() {
        Ok(true)
    } else {
        Err(io::Error::other(format!("exiftool failed: {}", stderr.trim())))
    }
}

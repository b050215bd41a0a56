//! Common Utilities Module
//!
//! Small path and tool-lookup helpers shared by the conversion pipeline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{LazyLock, Mutex};

/// Lower-cased file extension, or an empty string when there is none.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("test.JPG")), "jpg");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Case-insensitive membership test of the path's extension.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::has_extension;
///
/// let extensions = &["jpg", "png"];
/// assert!(has_extension(Path::new("photo.JPG"), extensions));
/// assert!(!has_extension(Path::new("video.mp4"), extensions));
/// ```
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    !ext.is_empty() && extensions.contains(&ext.as_str())
}

/// Final path component for progress messages.
pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

static COMMAND_AVAILABILITY: LazyLock<Mutex<HashMap<String, bool>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Whether `command_name` resolves on `PATH` (cached per process).
pub fn is_command_available(command_name: &str) -> bool {
    let mut cache = COMMAND_AVAILABILITY
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    *cache
        .entry(command_name.to_string())
        .or_insert_with(|| which::which(command_name).is_ok())
}

//! Progress Mode - controls progress bar display
//!
//! Process-wide switches read by the progress bar and the CLI: quiet mode
//! hides the bar (JSON output, non-interactive runs), verbose mode lets
//! per-file lines through.

use std::sync::atomic::{AtomicBool, Ordering};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

pub fn enable_quiet_mode() {
    QUIET_MODE.store(true, Ordering::Relaxed);
}

pub fn is_quiet_mode() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

// Default OFF. The CLI calls `set_verbose_mode(true)` when --verbose is passed.
static VERBOSE_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose_mode(v: bool) {
    VERBOSE_MODE.store(v, Ordering::Relaxed);
}

pub fn is_verbose_mode() -> bool {
    VERBOSE_MODE.load(Ordering::Relaxed)
}

/// Print to stderr only when verbose mode is enabled and quiet mode is not.
#[macro_export]
macro_rules! verbose_eprintln {
    ($($arg:tt)*) => {{
        if $crate::progress_mode::is_verbose_mode() && !$crate::progress_mode::is_quiet_mode() {
            eprintln!($($arg)*);
        }
    }};
}

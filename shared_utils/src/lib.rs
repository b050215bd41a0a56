//! Shared Utilities for img_catalog tools
//!
//! - Logging setup (tracing, rolling log files)
//! - Worker pool sizing
//! - Batch result accounting and summary reports
//! - Progress bar and quiet/verbose switches
//! - Metadata carry-over (ExifTool / xattr / timestamps)
//! - Path and tool-lookup helpers

pub mod batch;
pub mod common_utils;
pub mod logging;
pub mod metadata;
pub mod progress_mode;
pub mod report;
pub mod thread_manager;
pub mod unified_progress;

pub use batch::BatchResult;
pub use common_utils::{display_file_name, get_extension_lowercase, has_extension, is_command_available};
pub use metadata::{carry_metadata, CarryReport};
pub use report::{format_duration, print_simple_summary, print_summary_report, render_summary_report};
pub use unified_progress::UnifiedProgressBar;

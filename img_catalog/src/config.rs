use crate::codec::TargetFormat;
use crate::{CatalogError, Result};
use serde::Serialize;
use shared_utils::thread_manager::{resolve_worker_threads, WorkloadType};

/// Settings for one coordinator; built by the CLI from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertConfig {
    pub target: TargetFormat,
    /// Encoder quality, 1-100 (lossy targets only)
    pub quality: u8,
    /// Worker pool size; `None` falls back to `IMG_CATALOG_THREADS`, then the balanced default
    pub threads: Option<usize>,
    /// Replace outputs that already exist instead of skipping them
    pub overwrite: bool,
    /// Carry EXIF/XMP/ICC, xattrs and timestamps from source to output
    pub preserve_metadata: bool,
    pub verbose: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            target: TargetFormat::Heic,
            quality: 90,
            threads: None,
            overwrite: false,
            preserve_metadata: true,
            verbose: false,
        }
    }
}

impl ConvertConfig {
    pub fn with_target(mut self, target: TargetFormat) -> Self {
        self.target = target;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(CatalogError::InvalidConfig(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if self.threads == Some(0) {
            return Err(CatalogError::InvalidConfig(
                "thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn worker_threads(&self, workload: WorkloadType) -> usize {
        resolve_worker_threads(self.threads, workload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConvertConfig::default();
        assert_eq!(config.target, TargetFormat::Heic);
        assert_eq!(config.quality, 90);
        assert!(config.preserve_metadata);
        assert!(!config.overwrite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ConvertConfig::default().with_quality(0).validate().is_err());
        assert!(ConvertConfig::default().with_quality(101).validate().is_err());
        assert!(ConvertConfig::default().with_threads(0).validate().is_err());
    }

    #[test]
    fn test_explicit_threads_win() {
        let config = ConvertConfig::default().with_threads(3);
        assert_eq!(config.worker_threads(WorkloadType::InProcess), 3);
    }
}

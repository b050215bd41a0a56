//! Single-image conversion
//!
//! Writes a sibling of the source with the target extension. The source is
//! only ever read.

use crate::classifier::{classify, image_extension, PathClassification};
use crate::codec::{Codec, TargetFormat};
use crate::config::ConvertConfig;
use crate::job::JobOutcome;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ImageConverter {
    codec: Arc<dyn Codec>,
    target: TargetFormat,
    overwrite: bool,
    preserve_metadata: bool,
}

impl ImageConverter {
    pub fn new(codec: Arc<dyn Codec>, config: &ConvertConfig) -> Self {
        Self {
            codec,
            target: config.target,
            overwrite: config.overwrite,
            preserve_metadata: config.preserve_metadata,
        }
    }

    pub fn target(&self) -> TargetFormat {
        self.target
    }

    /// Whether `src` is already in the target format and needs no output.
    pub fn is_already_target(&self, src: &Path) -> bool {
        image_extension(src).is_some_and(|ext| self.target.matches_extension(ext))
    }

    /// Where the output for `src` goes: same directory, same stem.
    pub fn destination_for(&self, src: &Path) -> PathBuf {
        src.with_extension(self.target.extension())
    }

    /// Convert one image. Skips are outcomes, not errors; errors are
    /// decode or encode failures for this file only.
    pub fn convert(&self, src: &Path) -> Result<JobOutcome> {
        if classify(src) != PathClassification::Image {
            return Ok(JobOutcome::Skipped("no longer a convertible image".to_string()));
        }
        if self.is_already_target(src) {
            return Ok(JobOutcome::Skipped(format!("already {}", self.target)));
        }

        let dst = self.destination_for(src);
        if dst.exists() && !self.overwrite {
            debug!(src = %src.display(), dst = %dst.display(), "Output exists, skipping");
            return Ok(JobOutcome::Skipped("output exists".to_string()));
        }

        let source = self.codec.open(src)?;
        if let Err(e) = self.codec.write(&source, &dst) {
            if dst.exists() {
                if let Err(rm) = fs::remove_file(&dst) {
                    warn!(dst = %dst.display(), error = %rm, "Failed to remove partial output");
                }
            }
            return Err(e);
        }

        if self.preserve_metadata {
            let carried = shared_utils::carry_metadata(src, &dst);
            debug!(dst = %dst.display(), ?carried, "Metadata carried over");
        }

        info!(
            src = %src.display(),
            dst = %dst.display(),
            codec = self.codec.name(),
            "Converted"
        );
        Ok(JobOutcome::Success)
    }
}

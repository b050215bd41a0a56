//! Per-job outcomes and the batch summary they are folded into

use serde::Serialize;
use shared_utils::BatchResult;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Image,
    Manifest,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Image => f.write_str("image"),
            JobKind::Manifest => f.write_str("manifest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Skipped(String),
    Failed(String),
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub images: BatchResult,
    pub manifests: BatchResult,
    pub total_images: usize,
    pub processed_images: usize,
    pub elapsed_secs: f64,
}

impl BatchSummary {
    pub fn record(&mut self, kind: JobKind, path: PathBuf, outcome: &JobOutcome) {
        let result = match kind {
            JobKind::Image => &mut self.images,
            JobKind::Manifest => &mut self.manifests,
        };
        match outcome {
            JobOutcome::Success => result.success(),
            JobOutcome::Skipped(reason) => result.skip(path, reason.clone()),
            JobOutcome::Failed(error) => result.fail(path, error.clone()),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.images.has_failures() || self.manifests.has_failures()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs.max(0.0))
    }
}

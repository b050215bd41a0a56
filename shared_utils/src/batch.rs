//! Batch result accounting
//!
//! Per-kind tallies of finished jobs, with the reason for every skip and
//! failure kept for the summary report.

use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<(PathBuf, String)>,
    pub skips: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
            skips: Vec::new(),
        }
    }

    pub fn success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn fail(&mut self, path: PathBuf, error: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn skip(&mut self, path: PathBuf, reason: String) {
        self.total += 1;
        self.skipped += 1;
        self.skips.push((path, reason));
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_new() {
        let result = BatchResult::new();
        assert_eq!(result.total, 0);
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 0);
        assert!(result.errors.is_empty());
        assert!(result.skips.is_empty());
    }

    #[test]
    fn test_batch_result_fail_keeps_error() {
        let mut result = BatchResult::new();
        result.fail(PathBuf::from("test.png"), "Error message".to_string());

        assert_eq!(result.total, 1);
        assert_eq!(result.failed, 1);
        assert!(result.has_failures());
        assert_eq!(result.errors[0].1, "Error message");
    }

    #[test]
    fn test_batch_result_skip_keeps_reason() {
        let mut result = BatchResult::new();
        result.skip(PathBuf::from("a.heic"), "already in target format".to_string());

        assert_eq!(result.total, 1);
        assert_eq!(result.skipped, 1);
        assert!(!result.has_failures());
        assert_eq!(result.skips[0].0, PathBuf::from("a.heic"));
    }

    #[test]
    fn test_success_rate_empty() {
        let result = BatchResult::new();
        assert!((result.success_rate() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_with_skipped() {
        let mut result = BatchResult::new();
        result.success();
        result.success();
        result.skip(PathBuf::from("a"), "x".to_string());
        result.skip(PathBuf::from("b"), "y".to_string());

        assert!(
            (result.success_rate() - 50.0).abs() < 0.01,
            "2 success, 2 skipped should be 50%, got {}",
            result.success_rate()
        );
    }

    #[test]
    fn test_total_equals_sum() {
        let mut result = BatchResult::new();
        result.success();
        result.success();
        result.success();
        result.fail(PathBuf::from("f1.png"), "E".to_string());
        result.fail(PathBuf::from("f2.png"), "E".to_string());
        result.skip(PathBuf::from("f3.png"), "S".to_string());

        assert_eq!(
            result.total,
            result.succeeded + result.failed + result.skipped,
            "total must equal succeeded + failed + skipped"
        );
    }
}

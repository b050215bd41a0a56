//! Report Module
//!
//! Summary reporting for finished batches.

use crate::batch::BatchResult;
use console::style;
use std::time::Duration;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Render the summary box for an image/manifest batch.
pub fn render_summary_report(
    images: &BatchResult,
    manifests: &BatchResult,
    duration: Duration,
    operation_name: &str,
) -> String {
    let mut lines = Vec::new();
    let rule = "═".repeat(60);

    lines.push(format!("╔{}╗", rule));
    lines.push(format!("║  📊 {:<54}║", format!("{} Summary", operation_name)));
    lines.push(format!("╠{}╣", rule));
    lines.push(format!("║  {:<22}{:>10}{:>10}{:>10}      ║", "", "Images", "Manifests", ""));
    lines.push(format!(
        "║  {:<22}{:>10}{:>10}{:>16}║",
        "✅ Succeeded", images.succeeded, manifests.succeeded, ""
    ));
    lines.push(format!(
        "║  {:<22}{:>10}{:>10}{:>16}║",
        "⏭️  Skipped", images.skipped, manifests.skipped, ""
    ));
    lines.push(format!(
        "║  {:<22}{:>10}{:>10}{:>16}║",
        "❌ Failed", images.failed, manifests.failed, ""
    ));
    lines.push(format!(
        "║  {:<22}{:>9.1}%{:>9.1}%{:>16}║",
        "📈 Success Rate",
        images.success_rate(),
        manifests.success_rate(),
        ""
    ));
    lines.push(format!("╠{}╣", rule));
    lines.push(format!(
        "║  {:<22}{:>20}{:>16}║",
        "⏱️  Total Time",
        format_duration(duration),
        ""
    ));
    lines.push(format!("╚{}╝", rule));

    let errors: Vec<_> = images.errors.iter().chain(manifests.errors.iter()).collect();
    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("❌ Errors encountered:".to_string());
        for (path, error) in errors {
            lines.push(format!("   {} → {}", path.display(), error));
        }
    }

    lines.join("\n")
}

pub fn print_summary_report(
    images: &BatchResult,
    manifests: &BatchResult,
    duration: Duration,
    operation_name: &str,
) {
    println!();
    println!("{}", render_summary_report(images, manifests, duration, operation_name));
}

pub fn print_simple_summary(images: &BatchResult, manifests: &BatchResult) {
    let line = format!(
        "Complete: {} images converted, {} manifests rewritten, {} skipped, {} failed",
        images.succeeded,
        manifests.succeeded,
        images.skipped + manifests.skipped,
        images.failed + manifests.failed
    );
    if images.has_failures() || manifests.has_failures() {
        println!("\n{}", style(format!("⚠️  {}", line)).yellow());
    } else {
        println!("\n{}", style(format!("✅ {}", line)).green());
    }
}

//! Shared output helpers for CLI commands.

use console::style;

use crate::models::{AnalysisResult, Decision, HealthStatus};

/// Truncate a string to at most `max_chars`, adding an ellipsis.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Print a human readable summary of an analysis result.
pub fn print_result(result: &AnalysisResult) {
    let decision = match result.decision {
        Decision::Accepted => style("✓ accepted").green(),
        Decision::RequiresReview => style("! requires review").yellow(),
        Decision::NotFound => style("? not found").yellow(),
        Decision::Failed => style("✗ failed").red(),
    };

    println!("{} {}", decision, style(&result.id).dim());
    println!("  {:<14} {}", "correlation", result.correlation_id);
    println!(
        "  {:<14} {} ({:.1}%)",
        result.field.name,
        result.field.value.as_deref().unwrap_or("-"),
        result.field.confidence * 100.0
    );
    println!(
        "  {:<14} {:.2}",
        "threshold", result.processing_metadata.confidence_threshold
    );
    println!(
        "  {:<14} {} ms, {} attempt(s)",
        "timing", result.processing_metadata.processing_time_ms, result.processing_metadata.attempts
    );

    if let Some(ref locator) = result.review_storage_locator {
        println!("  {:<14} {}", "stored", locator.url);
    }
    if let Some(ref err) = result.error_details {
        println!("  {:<14} {} {}", "error", style(err.kind.as_str()).red(), err.message);
        if let Some(ref action) = err.suggested_action {
            println!("  {:<14} {}", "", style(action).dim());
        }
        if let Some(secs) = err.retry_after_seconds {
            println!("  {:<14} retry after {}s", "", secs);
        }
    }
    for sub in &result.sub_errors {
        println!(
            "  {} {}: {}",
            style("!").yellow(),
            sub.kind.as_str(),
            sub.message
        );
    }
}

pub fn health_style(status: HealthStatus) -> console::StyledObject<&'static str> {
    match status {
        HealthStatus::Healthy => style("healthy").green(),
        HealthStatus::Degraded => style("degraded").yellow(),
        HealthStatus::Unhealthy => style("unhealthy").red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-filename.pdf", 10), "a-very-...");
    }
}

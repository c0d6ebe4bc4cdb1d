//! Health and review queue commands.

use console::style;

use super::helpers::{health_style, truncate};
use crate::config::Settings;
use crate::models::ComponentState;
use crate::services::DocumentProcessor;

/// Check analysis and storage health.
pub async fn cmd_health(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let processor = DocumentProcessor::from_settings(settings)?;
    let report = processor.health_check().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "\n{} {} {}",
            style(&report.service).bold(),
            report.version,
            health_style(report.status)
        );
        println!("{}", "-".repeat(50));
        for (name, component) in &report.components {
            let status = match component.status {
                ComponentState::Healthy => style("✓ healthy").green(),
                ComponentState::Unhealthy => style("✗ unhealthy").red(),
                ComponentState::Disabled => style("- disabled").dim(),
            };
            println!("  {:<20} {}", name, status);
            if let Some(ref detail) = component.detail {
                println!("  {:<20} {}", "", style(detail).dim());
            }
        }
    }

    if !report.is_healthy() {
        anyhow::bail!("Service is {}", report.status.as_str());
    }
    Ok(())
}

/// List documents waiting for review.
pub async fn cmd_pending(settings: &Settings, days: u32, json: bool) -> anyhow::Result<()> {
    let processor = DocumentProcessor::from_settings(settings)?;
    let pending = processor.router().list_pending(days).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!(
            "{} No documents pending review in the last {} day(s)",
            style("!").yellow(),
            days
        );
        return Ok(());
    }

    println!("\n{}", style("Pending Review").bold());
    println!("{}", "-".repeat(90));
    println!(
        "{:<46} {:<20} {:>6} {}",
        "Analysis", "Stored", "Conf", "File"
    );
    for item in &pending {
        println!(
            "{:<46} {:<20} {:>5.1}% {}",
            item.analysis_id,
            item.stored_at.format("%Y-%m-%d %H:%M:%S"),
            item.confidence * 100.0,
            truncate(item.original_filename.as_deref().unwrap_or("-"), 30)
        );
    }
    println!("\n{} document(s)", pending.len());
    Ok(())
}

/// Show stored review metadata for one analysis.
pub async fn cmd_show(settings: &Settings, analysis_id: &str) -> anyhow::Result<()> {
    let processor = DocumentProcessor::from_settings(settings)?;
    match processor.router().find_metadata(analysis_id).await? {
        Some(metadata) => {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        None => {
            println!(
                "{} No stored review for '{}'",
                style("✗").red(),
                analysis_id
            );
            anyhow::bail!("Review not found: {}", analysis_id)
        }
    }
}

//! One-shot analysis commands.

use std::path::Path;

use console::style;

use super::helpers::print_result;
use super::AnalyzeArgs;
use crate::config::Settings;
use crate::models::{AnalysisResult, FileAnalysisParams, UrlAnalysisParams};
use crate::retry::Cancellation;
use crate::services::DocumentProcessor;

/// Analyze a document by URL.
pub async fn cmd_analyze_url(settings: &Settings, url: String, args: AnalyzeArgs) -> anyhow::Result<()> {
    let processor = DocumentProcessor::from_settings(settings)?;
    let params = UrlAnalysisParams {
        document_url: url,
        model_id: args.model.clone(),
        confidence_threshold: args.threshold,
        correlation_id: args.correlation_id.clone(),
        document_type: args.document_type.clone(),
        metadata: parse_metadata(args.metadata.as_deref())?,
    };

    let cancel = cancel_on_ctrl_c();
    let result = processor.analyze_by_url(params, &cancel).await;
    report(&result, args.json)
}

/// Analyze a local file as an upload.
pub async fn cmd_analyze_file(
    settings: &Settings,
    path: &Path,
    content_type: Option<String>,
    args: AnalyzeArgs,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let content_type = content_type.unwrap_or_else(|| {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    if !args.json {
        println!(
            "{} Analyzing {} ({}, {} bytes)",
            style("→").cyan(),
            filename,
            content_type,
            data.len()
        );
    }

    let processor = DocumentProcessor::from_settings(settings)?;
    let params = FileAnalysisParams {
        data,
        filename,
        content_type,
        model_id: args.model.clone(),
        confidence_threshold: args.threshold,
        correlation_id: args.correlation_id.clone(),
        document_type: args.document_type.clone(),
        metadata: parse_metadata(args.metadata.as_deref())?,
    };

    let cancel = cancel_on_ctrl_c();
    let result = processor.analyze_by_bytes(params, &cancel).await;
    report(&result, args.json)
}

fn parse_metadata(raw: Option<&str>) -> anyhow::Result<Option<serde_json::Value>> {
    raw.map(|s| {
        serde_json::from_str(s).map_err(|e| anyhow::anyhow!("--metadata is not valid JSON: {}", e))
    })
    .transpose()
}

/// Cancel the request on Ctrl+C; the current attempt finishes first.
fn cancel_on_ctrl_c() -> Cancellation {
    let cancel = Cancellation::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Cancelling after the current step...", style("!").yellow());
            flag.cancel();
        }
    });
    cancel
}

fn report(result: &AnalysisResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_result(result);
    }

    if result.is_failed() {
        let kind = result
            .error_details
            .as_ref()
            .map(|e| e.kind.as_str())
            .unwrap_or("FAILED");
        anyhow::bail!("Analysis failed ({})", kind);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(parse_metadata(None).unwrap(), None);
        let value = parse_metadata(Some(r#"{"line":"A"}"#)).unwrap().unwrap();
        assert_eq!(value["line"], "A");
        assert!(parse_metadata(Some("{oops")).is_err());
    }
}

//! Analyzer capability and its response model.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::BackendError;
use crate::models::{ComponentHealth, DocumentSource, ExtractedField};

/// External document analysis service.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Short backend name used in logs and health reports.
    fn name(&self) -> &str;

    /// Run one analysis of `source` with `model_id`. A single call may poll
    /// internally but never retries.
    async fn submit(
        &self,
        source: &DocumentSource,
        model_id: &str,
    ) -> Result<AnalyzeResponse, BackendError>;

    async fn health(&self) -> ComponentHealth;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeResponse {
    pub api_version: Option<String>,
    pub model_id: String,
    pub documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzedDocument {
    pub doc_type: Option<String>,
    pub confidence: Option<f64>,
    pub fields: HashMap<String, DocumentField>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentField {
    pub value: Option<String>,
    pub content: Option<String>,
    pub confidence: Option<f64>,
}

impl AnalyzeResponse {
    /// Look up `name` in the first document that has it.
    ///
    /// The typed value falls back to the raw content. Confidence is clamped
    /// to `[0, 1]` and defaults to 0 when the service omits it.
    pub fn field(&self, name: &str) -> ExtractedField {
        let Some(field) = self.documents.iter().find_map(|d| d.fields.get(name)) else {
            return ExtractedField::missing(name);
        };

        let raw_value = field
            .value
            .clone()
            .or_else(|| field.content.clone())
            .filter(|v| !v.trim().is_empty());
        let confidence = field
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        ExtractedField {
            name: name.to_string(),
            raw_value,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(fields: &[(&str, DocumentField)]) -> AnalyzeResponse {
        AnalyzeResponse {
            api_version: Some("2024-11-30".to_string()),
            model_id: "serialnumber".to_string(),
            documents: vec![AnalyzedDocument {
                doc_type: Some("serialnumber".to_string()),
                confidence: Some(0.99),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_missing_field() {
        let field = response_with(&[]).field("Serial");
        assert_eq!(field, ExtractedField::missing("Serial"));
    }

    #[test]
    fn test_value_falls_back_to_content() {
        let response = response_with(&[(
            "Serial",
            DocumentField {
                value: None,
                content: Some("SN-42".to_string()),
                confidence: Some(0.8),
            },
        )]);
        let field = response.field("Serial");
        assert_eq!(field.raw_value.as_deref(), Some("SN-42"));
        assert_eq!(field.confidence, 0.8);
    }

    #[test]
    fn test_confidence_clamped() {
        let response = response_with(&[(
            "Serial",
            DocumentField {
                value: Some("SN".to_string()),
                content: None,
                confidence: Some(1.7),
            },
        )]);
        assert_eq!(response.field("Serial").confidence, 1.0);
    }
}

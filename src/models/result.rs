//! Analysis results returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ErrorInfo, ErrorKind};

/// Routing decision for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    RequiresReview,
    NotFound,
    Failed,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::RequiresReview => "requires_review",
            Decision::NotFound => "not_found",
            Decision::Failed => "failed",
        }
    }

    /// Field status reported alongside this decision.
    pub fn field_status(&self) -> FieldStatus {
        match self {
            Decision::Accepted => FieldStatus::Extracted,
            Decision::RequiresReview => FieldStatus::LowConfidence,
            Decision::NotFound => FieldStatus::NotFound,
            Decision::Failed => FieldStatus::ExtractionError,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field exactly as the analysis service reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField {
    pub name: String,
    pub raw_value: Option<String>,
    pub confidence: f64,
}

impl ExtractedField {
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Extracted,
    LowConfidence,
    NotFound,
    ExtractionError,
}

/// Public view of the extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub name: String,
    pub value: Option<String>,
    pub confidence: f64,
    pub status: FieldStatus,
    /// Raw value kept for audit; never serialized to callers.
    #[serde(skip)]
    raw_value: Option<String>,
}

impl FieldResult {
    /// Build the public field. The value is only surfaced for accepted decisions.
    pub fn from_extracted(field: &ExtractedField, decision: Decision) -> Self {
        Self {
            name: field.name.clone(),
            value: crate::analysis::evaluator::surfaced_value(decision, field.raw_value.as_deref())
                .map(str::to_string),
            confidence: field.confidence,
            status: decision.field_status(),
            raw_value: field.raw_value.clone(),
        }
    }

    /// Zero-value field used when extraction never produced anything.
    pub fn extraction_error(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            confidence: 0.0,
            status: FieldStatus::ExtractionError,
            raw_value: None,
        }
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }
}

/// Where a review copy of the document was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageLocator {
    pub container: String,
    pub path: String,
    pub metadata_path: String,
    pub url: String,
    pub stored_at: DateTime<Utc>,
}

/// Description of the submitted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    pub model_id: String,
    pub document_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub processing_time_ms: u64,
    #[serde(default)]
    pub gateway_time_ms: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub confidence_threshold: f64,
    pub model_used: String,
}

/// Final result of one analysis. Built once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub correlation_id: String,
    pub decision: Decision,
    pub field: FieldResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_storage_locator: Option<StorageLocator>,
    pub document_metadata: DocumentMetadata,
    pub processing_metadata: ProcessingMetadata,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorInfo>,
    /// Non-fatal problems (download or storage) that did not change the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_errors: Vec<ErrorInfo>,
}

impl AnalysisResult {
    pub fn is_failed(&self) -> bool {
        self.decision == Decision::Failed
    }

    /// HTTP status the server answers this result with.
    pub fn http_status(&self) -> u16 {
        match (&self.decision, &self.error_details) {
            (Decision::Failed, Some(err)) => err.kind.http_status(),
            (Decision::Failed, None) => ErrorKind::InternalError.http_status(),
            _ => 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(raw: Option<&str>, confidence: f64) -> ExtractedField {
        ExtractedField {
            name: "Serial".to_string(),
            raw_value: raw.map(str::to_string),
            confidence,
        }
    }

    #[test]
    fn test_accepted_field_surfaces_value() {
        let result = FieldResult::from_extracted(&field(Some("SN-1"), 0.9), Decision::Accepted);
        assert_eq!(result.value.as_deref(), Some("SN-1"));
        assert_eq!(result.status, FieldStatus::Extracted);
    }

    #[test]
    fn test_review_field_hides_value_but_keeps_raw() {
        let result =
            FieldResult::from_extracted(&field(Some("SN-1"), 0.4), Decision::RequiresReview);
        assert!(result.value.is_none());
        assert_eq!(result.raw_value(), Some("SN-1"));
        assert_eq!(result.status, FieldStatus::LowConfidence);

        let json = serde_json::to_value(&result).unwrap();
        assert!(!json.to_string().contains("SN-1"));
    }

    #[test]
    fn test_extraction_error_is_zero_value() {
        let result = FieldResult::extraction_error("Serial");
        assert_eq!(result.confidence, 0.0);
        assert!(result.value.is_none());
        assert_eq!(result.status, FieldStatus::ExtractionError);
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Decision::RequiresReview).unwrap(),
            "\"requires_review\""
        );
    }
}

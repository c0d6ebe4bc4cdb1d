//! Review metadata written next to each stored document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingReview,
    Reviewed,
    Retraining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocumentInfo {
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub content_type: String,
    pub file_size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    pub field_name: String,
    /// Raw extracted value. Kept here for reviewers even though callers never see it.
    #[serde(default)]
    pub extracted_value: Option<String>,
    pub confidence: f64,
    pub confidence_threshold: f64,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub document_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePaths {
    pub document: String,
    pub metadata: String,
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub analysis_id: String,
    pub correlation_id: String,
    pub status: ReviewStatus,
    pub stored_at: DateTime<Utc>,
    pub document: StoredDocumentInfo,
    pub analysis_results: ReviewAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_metadata: Option<serde_json::Value>,
    pub storage_paths: StoragePaths,
}

/// Listing entry for `list_pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReviewSummary {
    pub analysis_id: String,
    pub correlation_id: String,
    pub stored_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub confidence: f64,
    pub confidence_threshold: f64,
    pub document_path: String,
    pub metadata_path: String,
}

impl From<&ReviewMetadata> for PendingReviewSummary {
    fn from(meta: &ReviewMetadata) -> Self {
        Self {
            analysis_id: meta.analysis_id.clone(),
            correlation_id: meta.correlation_id.clone(),
            stored_at: meta.stored_at,
            original_filename: meta.document.original_filename.clone(),
            confidence: meta.analysis_results.confidence,
            confidence_threshold: meta.analysis_results.confidence_threshold,
            document_path: meta.storage_paths.document.clone(),
            metadata_path: meta.storage_paths.metadata.clone(),
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ReviewStatus::PendingReview).unwrap(),
            "\"pending_review\""
        );
    }
}

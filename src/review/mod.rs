//! Review storage routing.
//!
//! Documents whose extraction fell below the confidence threshold are copied
//! to object storage together with a `metadata.json` describing the analysis,
//! so a reviewer can correct the value later. Storage problems never change
//! the routing decision; they are reported as sub-errors on the result.

mod download;
pub mod keys;
mod metadata;

pub use download::{filename_from_url, DocumentFetcher, DownloadError, FetchedDocument, HttpFetcher};
pub use metadata::{
    sha256_hex, PendingReviewSummary, ReviewAnalysis, ReviewMetadata, ReviewStatus,
    StoragePaths, StoredDocumentInfo,
};

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{
    AnalysisRequest, ComponentHealth, Decision, DocumentSource, ErrorInfo, ErrorKind,
    ExtractedField, StorageLocator,
};
use crate::retry::{Cancellation, RetryPolicy, RetryState};
use crate::storage::{ObjectStore, StorageError, StoredObject};

/// What the router did for one analysis.
#[derive(Debug, Clone, Default)]
pub struct StorageOutcome {
    pub locator: Option<StorageLocator>,
    pub error: Option<ErrorInfo>,
}

impl StorageOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }

    fn failed(error: ErrorInfo) -> Self {
        Self {
            locator: None,
            error: Some(error),
        }
    }
}

/// Analysis facts recorded in review metadata.
#[derive(Debug, Clone, Copy)]
pub struct ReviewContext<'a> {
    pub analysis_id: &'a str,
    pub correlation_id: &'a str,
    pub request: &'a AnalysisRequest,
    pub field: &'a ExtractedField,
    pub api_version: Option<&'a str>,
    /// Creation time of the analysis; fixes the date partition of its keys.
    pub created_at: DateTime<Utc>,
}

struct ReviewDocument<'a> {
    data: Cow<'a, [u8]>,
    filename: Option<String>,
    content_type: Option<String>,
}

pub struct ReviewRouter {
    store: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    policy: RetryPolicy,
    write_timeout: Duration,
    max_document_bytes: usize,
    enabled: bool,
}

impl ReviewRouter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn DocumentFetcher>,
        policy: RetryPolicy,
        write_timeout: Duration,
        max_document_bytes: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            policy,
            write_timeout,
            max_document_bytes,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn container(&self) -> &str {
        self.store.container()
    }

    /// Store the document for review when the decision calls for it.
    pub async fn maybe_store(
        &self,
        decision: Decision,
        ctx: ReviewContext<'_>,
        cancel: &Cancellation,
    ) -> StorageOutcome {
        if decision != Decision::RequiresReview {
            return StorageOutcome::skipped();
        }
        if !self.enabled {
            debug!(analysis_id = ctx.analysis_id, "Review storage disabled, skipping");
            return StorageOutcome::skipped();
        }
        if cancel.is_cancelled() {
            return StorageOutcome::skipped();
        }

        let document = match self.load_document(ctx.request.source()).await {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    analysis_id = ctx.analysis_id,
                    correlation_id = ctx.correlation_id,
                    "Could not download document for review storage: {}",
                    e
                );
                return StorageOutcome::failed(
                    ErrorInfo::new(
                        ErrorKind::StorageFailure,
                        "Document could not be downloaded for review storage",
                    )
                    .with_details(e.to_string()),
                );
            }
        };

        match self.write(&ctx, &document, cancel).await {
            Ok(locator) => {
                info!(
                    analysis_id = ctx.analysis_id,
                    correlation_id = ctx.correlation_id,
                    path = %locator.path,
                    "Stored low-confidence document for review"
                );
                StorageOutcome {
                    locator: Some(locator),
                    error: None,
                }
            }
            Err(details) => {
                warn!(
                    analysis_id = ctx.analysis_id,
                    correlation_id = ctx.correlation_id,
                    "Review storage failed: {}",
                    details
                );
                StorageOutcome::failed(
                    ErrorInfo::new(
                        ErrorKind::StorageFailure,
                        "Document could not be stored for review",
                    )
                    .with_details(details)
                    .with_retry_after(self.policy.retry_after_secs()),
                )
            }
        }
    }

    async fn load_document<'a>(
        &self,
        source: &'a DocumentSource,
    ) -> Result<ReviewDocument<'a>, DownloadError> {
        match source {
            DocumentSource::Bytes {
                data,
                filename,
                content_type,
            } => Ok(ReviewDocument {
                data: Cow::Borrowed(data.as_slice()),
                filename: Some(filename.clone()),
                content_type: Some(content_type.clone()),
            }),
            DocumentSource::Url(url) => {
                info!(
                    url = %crate::http_client::redact_query(url.as_str()),
                    "Downloading URL document for review storage"
                );
                let fetched = self.fetcher.fetch(url, self.max_document_bytes).await?;
                let filename = filename_from_url(url);
                let content_type = fetched.content_type.or_else(|| {
                    filename
                        .as_deref()
                        .and_then(|f| mime_guess::from_path(f).first_raw())
                        .map(str::to_string)
                });
                Ok(ReviewDocument {
                    data: Cow::Owned(fetched.data),
                    filename,
                    content_type,
                })
            }
        }
    }

    async fn write(
        &self,
        ctx: &ReviewContext<'_>,
        document: &ReviewDocument<'_>,
        cancel: &Cancellation,
    ) -> Result<StorageLocator, String> {
        let stored_at = Utc::now();
        let dir = keys::review_dir(ctx.created_at, ctx.analysis_id);
        let extension = keys::resolve_extension(
            document.filename.as_deref(),
            document.content_type.as_deref(),
            &document.data,
        );
        let document_key = keys::document_key(&dir, &extension);
        let metadata_key = keys::metadata_key(&dir);
        let content_type = document
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let request = ctx.request;
        let metadata = ReviewMetadata {
            analysis_id: ctx.analysis_id.to_string(),
            correlation_id: ctx.correlation_id.to_string(),
            status: ReviewStatus::PendingReview,
            stored_at,
            document: StoredDocumentInfo {
                source_type: request.source().source_type().to_string(),
                document_url: match request.source() {
                    DocumentSource::Url(url) => Some(url.to_string()),
                    DocumentSource::Bytes { .. } => None,
                },
                original_filename: document.filename.clone(),
                content_type: content_type.clone(),
                file_size_bytes: document.data.len() as u64,
                sha256: sha256_hex(&document.data),
            },
            analysis_results: ReviewAnalysis {
                field_name: ctx.field.name.clone(),
                extracted_value: ctx.field.raw_value.clone(),
                confidence: ctx.field.confidence,
                confidence_threshold: request.confidence_threshold(),
                model_id: request.model_id().to_string(),
                api_version: ctx.api_version.map(str::to_string),
                document_type: request.document_type().to_string(),
            },
            caller_metadata: request.metadata().cloned(),
            storage_paths: StoragePaths {
                document: document_key.clone(),
                metadata: metadata_key.clone(),
            },
        };
        let metadata_json = serde_json::to_vec_pretty(&metadata).map_err(|e| e.to_string())?;

        let mut object_metadata = HashMap::from([
            ("analysis_id".to_string(), ctx.analysis_id.to_string()),
            ("correlation_id".to_string(), ctx.correlation_id.to_string()),
            ("confidence".to_string(), format!("{:.4}", ctx.field.confidence)),
            ("status".to_string(), "pending_review".to_string()),
        ]);
        if let Some(ref filename) = document.filename {
            object_metadata.insert("original_filename".to_string(), filename.clone());
        }

        let stored = self
            .put_with_retry(
                &document_key,
                &document.data,
                &content_type,
                &object_metadata,
                cancel,
            )
            .await?;
        if let Err(e) = self
            .put_with_retry(
                &metadata_key,
                &metadata_json,
                "application/json",
                &object_metadata,
                cancel,
            )
            .await
        {
            if let Err(cleanup) = self.store.delete(&document_key).await {
                warn!(
                    key = %document_key,
                    "Orphaned review document left in storage: {}",
                    cleanup
                );
            }
            return Err(e);
        }

        Ok(StorageLocator {
            container: self.store.container().to_string(),
            path: document_key,
            metadata_path: metadata_key,
            url: stored.url,
            stored_at,
        })
    }

    async fn put_with_retry(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
        cancel: &Cancellation,
    ) -> Result<StoredObject, String> {
        let mut state: RetryState<String> = RetryState::new(&self.policy);

        while state.begin_attempt() {
            if cancel.is_cancelled() {
                return Err("request cancelled before storage completed".to_string());
            }

            match tokio::time::timeout(
                self.write_timeout,
                self.store.put(key, data, content_type, metadata),
            )
            .await
            {
                Ok(Ok(stored)) => return Ok(stored),
                Ok(Err(StorageError::InvalidKey(k))) => {
                    return Err(format!("invalid storage key {}", k));
                }
                Ok(Err(e)) => state.record_failure(e.to_string()),
                Err(_) => {
                    state.record_failure(format!("write timed out after {:?}", self.write_timeout))
                }
            }

            warn!(
                key,
                attempt = state.attempt,
                max_attempts = state.max_attempts,
                "Review storage write failed: {}",
                state.last_error.as_deref().unwrap_or_default()
            );
            if state.has_attempts_left() {
                tokio::time::sleep(self.policy.delay_for(state.attempt)).await;
            }
        }

        Err(state.last_error.unwrap_or_else(|| "no write attempted".to_string()))
    }

    /// Pending review documents stored within the last `days_back` days, newest first.
    pub async fn list_pending(
        &self,
        days_back: u32,
    ) -> Result<Vec<PendingReviewSummary>, StorageError> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(i64::from(days_back));
        let cutoff_date = cutoff.date_naive();

        let entries = self.store.list(keys::PENDING_PREFIX).await?;
        let mut summaries: Vec<PendingReviewSummary> = Vec::new();

        for key in entries.iter().filter(|k| k.ends_with(keys::METADATA_FILE)) {
            if let Some(date) = keys::partition_date(keys::PENDING_PREFIX, key) {
                if date < cutoff_date {
                    continue;
                }
            }
            match self.read_metadata(key).await {
                Ok(meta) if meta.stored_at >= cutoff => summaries.push(PendingReviewSummary::from(&meta)),
                Ok(_) => {}
                Err(e) => warn!(key = %key, "Skipping unreadable review metadata: {}", e),
            }
        }

        summaries.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(summaries)
    }

    /// Stored metadata for an analysis in any review stage.
    pub async fn find_metadata(
        &self,
        analysis_id: &str,
    ) -> Result<Option<ReviewMetadata>, StorageError> {
        if analysis_id.is_empty() || analysis_id.contains('/') {
            return Err(StorageError::InvalidKey(analysis_id.to_string()));
        }

        for prefix in keys::SEARCH_PREFIXES {
            let entries = self.store.list(prefix).await?;
            let found = entries.iter().find(|k| {
                k.ends_with(keys::METADATA_FILE) && keys::analysis_id_of(k) == Some(analysis_id)
            });
            if let Some(key) = found {
                return self.read_metadata(key).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn read_metadata(&self, key: &str) -> Result<ReviewMetadata, StorageError> {
        let data = self.store.get(key).await?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::Unavailable(format!("corrupt metadata {}: {}", key, e)))
    }

    pub async fn health(&self) -> ComponentHealth {
        if !self.enabled {
            return ComponentHealth::disabled();
        }
        self.store.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use url::Url;

    use crate::models::{FileAnalysisParams, RequestPolicy, UrlAnalysisParams};
    use crate::storage::MemoryStore;

    struct StaticFetcher {
        result: Option<Vec<u8>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url, max_bytes: usize) -> Result<FetchedDocument, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(data) if data.len() > max_bytes => Err(DownloadError::TooLarge { limit: max_bytes }),
                Some(data) => Ok(FetchedDocument {
                    data: data.clone(),
                    content_type: Some("image/png".to_string()),
                }),
                None => Err(DownloadError::Status { status: 404 }),
            }
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore {
        puts: AtomicU32,
    }

    #[async_trait]
    impl ObjectStore for BrokenStore {
        fn container(&self) -> &str {
            "broken"
        }

        async fn put(
            &self,
            _key: &str,
            _data: &[u8],
            _content_type: &str,
            _metadata: &HashMap<String, String>,
        ) -> Result<StoredObject, StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }

        async fn health(&self) -> ComponentHealth {
            ComponentHealth::unhealthy("disk on fire")
        }
    }

    /// In-memory store that refuses the metadata write.
    struct NoMetadataStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ObjectStore for NoMetadataStore {
        fn container(&self) -> &str {
            self.inner.container()
        }

        async fn put(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
            metadata: &HashMap<String, String>,
        ) -> Result<StoredObject, StorageError> {
            if key.ends_with(keys::METADATA_FILE) {
                return Err(StorageError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.put(key, data, content_type, metadata).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix).await
        }

        async fn health(&self) -> ComponentHealth {
            self.inner.health().await
        }
    }

    fn policy() -> RequestPolicy {
        RequestPolicy {
            default_threshold: 0.7,
            default_model_id: "serialnumber".to_string(),
            max_file_size_mb: 10,
            allowed_content_types: vec!["application/pdf".to_string(), "image/png".to_string()],
            allow_insecure_urls: false,
        }
    }

    fn upload_request() -> AnalysisRequest {
        AnalysisRequest::from_bytes(
            FileAnalysisParams {
                data: b"%PDF-1.7 test".to_vec(),
                filename: "scan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                correlation_id: Some("corr-1".to_string()),
                metadata: Some(serde_json::json!({"line": "A"})),
                ..Default::default()
            },
            &policy(),
        )
        .unwrap()
    }

    fn url_request() -> AnalysisRequest {
        AnalysisRequest::from_url(
            UrlAnalysisParams {
                document_url: "https://example.com/docs/label.png".to_string(),
                ..Default::default()
            },
            &policy(),
        )
        .unwrap()
    }

    fn low_field() -> ExtractedField {
        ExtractedField {
            name: "Serial".to_string(),
            raw_value: Some("SN-LOW".to_string()),
            confidence: 0.4,
        }
    }

    fn router(store: Arc<dyn ObjectStore>, fetched: Option<Vec<u8>>) -> ReviewRouter {
        ReviewRouter::new(
            store,
            Arc::new(StaticFetcher {
                result: fetched,
                calls: AtomicU32::new(0),
            }),
            RetryPolicy::new(3, Duration::from_millis(1)).with_jitter(false),
            Duration::from_secs(5),
            1024 * 1024,
        )
    }

    fn ctx<'a>(request: &'a AnalysisRequest, field: &'a ExtractedField) -> ReviewContext<'a> {
        ReviewContext {
            analysis_id: "analysis-1",
            correlation_id: "corr-1",
            request,
            field,
            api_version: Some("2024-11-30"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_only_requires_review_is_stored() {
        let store = Arc::new(MemoryStore::new("document-intelligence"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();
        for decision in [Decision::Accepted, Decision::NotFound, Decision::Failed] {
            let outcome = router
                .maybe_store(decision, ctx(&request, &field), &Cancellation::new())
                .await;
            assert!(outcome.locator.is_none());
            assert!(outcome.error.is_none());
        }
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_stores_document_and_metadata() {
        let store = Arc::new(MemoryStore::new("document-intelligence"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();

        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        let locator = outcome.locator.expect("stored");
        assert_eq!(locator.container, "document-intelligence");
        assert!(locator.path.starts_with("low-confidence/pending-review/"));
        assert!(locator.path.ends_with("/analysis-1/document.pdf"));

        let raw = store.object(&locator.metadata_path).await.unwrap();
        let meta: ReviewMetadata = serde_json::from_slice(&raw.data).unwrap();
        assert_eq!(meta.analysis_results.extracted_value.as_deref(), Some("SN-LOW"));
        assert_eq!(meta.analysis_results.confidence_threshold, 0.7);
        assert_eq!(meta.document.sha256, sha256_hex(b"%PDF-1.7 test"));
        assert_eq!(meta.caller_metadata, Some(serde_json::json!({"line": "A"})));
        assert_eq!(meta.status, ReviewStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_storing_twice_overwrites_same_keys() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();

        let first = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        let second = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        assert_eq!(
            first.locator.map(|l| l.path),
            second.locator.map(|l| l.path)
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_keys_follow_analysis_creation_day() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();
        let created_at = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 0).unwrap();
        let fixed = ReviewContext {
            created_at,
            ..ctx(&request, &field)
        };

        let first = router
            .maybe_store(Decision::RequiresReview, fixed, &Cancellation::new())
            .await
            .locator
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = router
            .maybe_store(Decision::RequiresReview, fixed, &Cancellation::new())
            .await
            .locator
            .unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(first.metadata_path, second.metadata_path);
        assert!(first.path.contains("/2024/03/07/analysis-1/"));
        assert!(second.stored_at > created_at);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_removes_document() {
        let store = Arc::new(NoMetadataStore {
            inner: MemoryStore::new("c"),
        });
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();

        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        assert!(outcome.locator.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::StorageFailure);
        assert_eq!(store.inner.put_count(), 1);
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_url_document_is_downloaded() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), Some(b"\x89PNG\r\n\x1a\n".to_vec()));
        let request = url_request();
        let field = low_field();

        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        let locator = outcome.locator.unwrap();
        assert!(locator.path.ends_with("document.png"));
        let stored = store.object(&locator.path).await.unwrap();
        assert_eq!(stored.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_download_failure_is_sub_error() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None);
        let request = url_request();
        let field = low_field();

        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        assert!(outcome.locator.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::StorageFailure);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistent_write_failure_retries_then_reports() {
        let store = Arc::new(BrokenStore {
            puts: AtomicU32::new(0),
        });
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();

        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        assert!(outcome.locator.is_none());
        let err = outcome.error.unwrap();
        assert_eq!(err.kind, ErrorKind::StorageFailure);
        assert_eq!(store.puts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_disabled_router_skips() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None).with_enabled(false);
        let request = upload_request();
        let field = low_field();
        let outcome = router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;
        assert!(outcome.locator.is_none());
        assert!(outcome.error.is_none());
        assert_eq!(
            router.health().await.status,
            crate::models::ComponentState::Disabled
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_writes_nothing() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();
        let cancel = Cancellation::new();
        cancel.cancel();
        router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &cancel)
            .await;
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_list_pending_and_find_metadata() {
        let store = Arc::new(MemoryStore::new("c"));
        let router = router(store.clone(), None);
        let request = upload_request();
        let field = low_field();
        router
            .maybe_store(Decision::RequiresReview, ctx(&request, &field), &Cancellation::new())
            .await;

        // Stale entry outside the listing window.
        store
            .put(
                "low-confidence/pending-review/2001/01/01/analysis-old/metadata.json",
                b"{}",
                "application/json",
                &HashMap::new(),
            )
            .await
            .unwrap();
        // Corrupt entry inside the window is skipped.
        let today = keys::review_dir(Utc::now(), "analysis-bad");
        store
            .put(&keys::metadata_key(&today), b"not json", "application/json", &HashMap::new())
            .await
            .unwrap();

        let pending = router.list_pending(30).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].analysis_id, "analysis-1");

        let meta = router.find_metadata("analysis-1").await.unwrap().unwrap();
        assert_eq!(meta.correlation_id, "corr-1");
        assert!(router.find_metadata("analysis-missing").await.unwrap().is_none());
        assert!(router.find_metadata("../x").await.is_err());
    }
}

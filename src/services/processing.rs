//! Processing orchestrator.
//!
//! Sequences one analysis: gateway call, confidence evaluation, conditional
//! review storage and result assembly. Every call returns an
//! [`AnalysisResult`]; failures become `Failed` results rather than errors.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::evaluate;
use crate::config::{Settings, StorageBackend};
use crate::gateway::{
    AnalysisGateway, DocumentIntelligenceClient, GatewayFailure, GatewayOutcome,
};
use crate::http_client::HttpClient;
use crate::models::{
    AnalysisRequest, AnalysisResult, Decision, DocumentMetadata, DocumentSource, ErrorInfo,
    FieldResult, FileAnalysisParams, HealthReport, ProcessingMetadata, RequestPolicy,
    StatusClass, StorageLocator, UrlAnalysisParams,
};
use crate::retry::Cancellation;
use crate::review::{ReviewContext, ReviewRouter};
use crate::storage::{FsStore, MemoryStore, ObjectStore};

/// Pipeline output before timing and identifiers are attached.
struct PipelineOutput {
    decision: Decision,
    field: FieldResult,
    locator: Option<StorageLocator>,
    sub_errors: Vec<ErrorInfo>,
    gateway: GatewayOutcome,
}

/// Identifiers and timing shared by every result of one request.
struct RequestScope {
    analysis_id: String,
    correlation_id: String,
    created_at: DateTime<Utc>,
    started: Instant,
}

impl RequestScope {
    fn new(correlation_id: Option<&str>) -> Self {
        Self {
            analysis_id: format!("analysis-{}", Uuid::new_v4()),
            correlation_id: correlation_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("corr-{}", Uuid::new_v4())),
            created_at: Utc::now(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

pub struct DocumentProcessor {
    gateway: AnalysisGateway,
    router: ReviewRouter,
    request_policy: RequestPolicy,
}

impl DocumentProcessor {
    pub fn new(gateway: AnalysisGateway, router: ReviewRouter, request_policy: RequestPolicy) -> Self {
        Self {
            gateway,
            router,
            request_policy,
        }
    }

    /// Wire up the production adapters described by `settings`.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = HttpClient::new(settings.analysis_timeout)?;

        let analyzer = Arc::new(DocumentIntelligenceClient::new(
            http.clone(),
            settings.document_intelligence(),
        ));
        let gateway = AnalysisGateway::new(
            analyzer,
            settings.retry_policy(),
            settings.analysis_timeout,
            settings.extraction_field_name.clone(),
        );

        let store: Arc<dyn ObjectStore> = match settings.storage_backend {
            StorageBackend::Fs => Arc::new(FsStore::new(
                settings.review_storage_dir.clone(),
                settings.review_storage_container.clone(),
            )),
            StorageBackend::Memory => {
                Arc::new(MemoryStore::new(settings.review_storage_container.clone()))
            }
        };
        let router = ReviewRouter::new(
            store,
            Arc::new(crate::review::HttpFetcher::new(http)),
            settings.retry_policy(),
            settings.storage_timeout,
            settings.max_file_size_bytes(),
        )
        .with_enabled(settings.enable_review_storage);

        Ok(Self::new(gateway, router, settings.request_policy()))
    }

    pub fn request_policy(&self) -> &RequestPolicy {
        &self.request_policy
    }

    pub fn router(&self) -> &ReviewRouter {
        &self.router
    }

    /// `AnalyzeByUrl`: validate caller parameters, then process.
    pub async fn analyze_by_url(
        &self,
        params: UrlAnalysisParams,
        cancel: &Cancellation,
    ) -> AnalysisResult {
        let fallback = DocumentMetadata {
            source_type: "url".to_string(),
            document_url: Some(params.document_url.clone()),
            model_id: self.model_or_default(params.model_id.as_deref()),
            document_type: params.document_type.clone().unwrap_or_default(),
            ..Default::default()
        };
        let correlation_id = params.correlation_id.clone();
        let threshold = params.confidence_threshold;

        match AnalysisRequest::from_url(params, &self.request_policy) {
            Ok(request) => self.process(request, cancel).await,
            Err(err) => self.rejected(err, correlation_id.as_deref(), fallback, threshold),
        }
    }

    /// `AnalyzeByBytes`: validate the upload, then process.
    pub async fn analyze_by_bytes(
        &self,
        params: FileAnalysisParams,
        cancel: &Cancellation,
    ) -> AnalysisResult {
        let fallback = DocumentMetadata {
            source_type: "file_upload".to_string(),
            filename: Some(params.filename.clone()),
            content_type: Some(params.content_type.clone()),
            file_size_bytes: Some(params.data.len() as u64),
            model_id: self.model_or_default(params.model_id.as_deref()),
            document_type: params.document_type.clone().unwrap_or_default(),
            ..Default::default()
        };
        let correlation_id = params.correlation_id.clone();
        let threshold = params.confidence_threshold;

        match AnalysisRequest::from_bytes(params, &self.request_policy) {
            Ok(request) => self.process(request, cancel).await,
            Err(err) => self.rejected(err, correlation_id.as_deref(), fallback, threshold),
        }
    }

    /// Run the full pipeline for a validated request.
    pub async fn process(&self, request: AnalysisRequest, cancel: &Cancellation) -> AnalysisResult {
        let scope = RequestScope::new(request.correlation_id());
        let span = info_span!(
            "analysis",
            analysis_id = %scope.analysis_id,
            correlation_id = %scope.correlation_id,
        );

        async {
            info!(
                source = %request.source().describe(),
                model_id = request.model_id(),
                threshold = request.confidence_threshold(),
                "Starting document analysis"
            );

            let outcome = AssertUnwindSafe(self.run(&request, &scope, cancel))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(output)) => self.assemble(&request, &scope, output),
                Ok(Err(err)) => self.failed(&request, &scope, err),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    self.failed(&request, &scope, ErrorInfo::internal(message).into())
                }
            };

            info!(
                decision = %result.decision,
                processing_time_ms = result.processing_metadata.processing_time_ms,
                stored = result.review_storage_locator.is_some(),
                "Document analysis finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        scope: &RequestScope,
        cancel: &Cancellation,
    ) -> Result<PipelineOutput, GatewayFailure> {
        let gateway = self.gateway.analyze(request, cancel).await?;

        let decision = evaluate(
            gateway.field.raw_value.as_deref(),
            gateway.field.confidence,
            request.confidence_threshold(),
        );
        let field = FieldResult::from_extracted(&gateway.field, decision);

        let storage = self
            .router
            .maybe_store(
                decision,
                ReviewContext {
                    analysis_id: &scope.analysis_id,
                    correlation_id: &scope.correlation_id,
                    request,
                    field: &gateway.field,
                    api_version: gateway.api_version.as_deref(),
                    created_at: scope.created_at,
                },
                cancel,
            )
            .await;

        Ok(PipelineOutput {
            decision,
            field,
            locator: storage.locator,
            sub_errors: storage.error.into_iter().collect(),
            gateway,
        })
    }

    fn assemble(
        &self,
        request: &AnalysisRequest,
        scope: &RequestScope,
        output: PipelineOutput,
    ) -> AnalysisResult {
        AnalysisResult {
            id: scope.analysis_id.clone(),
            correlation_id: scope.correlation_id.clone(),
            decision: output.decision,
            field: output.field,
            review_storage_locator: output.locator,
            document_metadata: document_metadata(request),
            processing_metadata: ProcessingMetadata {
                processing_time_ms: scope.elapsed_ms(),
                gateway_time_ms: output.gateway.duration_ms,
                attempts: output.gateway.attempts,
                api_version: output.gateway.api_version,
                confidence_threshold: request.confidence_threshold(),
                model_used: output.gateway.model_id,
            },
            created_at: scope.created_at,
            completed_at: Utc::now(),
            error_details: None,
            sub_errors: output.sub_errors,
        }
    }

    fn failed(
        &self,
        request: &AnalysisRequest,
        scope: &RequestScope,
        failure: GatewayFailure,
    ) -> AnalysisResult {
        let mut result = self.failed_result(
            scope,
            failure.error,
            document_metadata(request),
            request.confidence_threshold(),
        );
        result.processing_metadata.attempts = failure.attempts;
        result.processing_metadata.gateway_time_ms = failure.duration_ms;
        result
    }

    /// Result for parameters that never became a request.
    fn rejected(
        &self,
        err: ErrorInfo,
        correlation_id: Option<&str>,
        document_metadata: DocumentMetadata,
        threshold: Option<f64>,
    ) -> AnalysisResult {
        let correlation_id = correlation_id
            .map(str::trim)
            .filter(|c| !c.is_empty() && c.len() <= crate::models::request::MAX_CORRELATION_ID_LEN);
        let scope = RequestScope::new(correlation_id);
        let threshold = threshold
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(self.request_policy.default_threshold);
        self.failed_result(&scope, err, document_metadata, threshold)
    }

    fn failed_result(
        &self,
        scope: &RequestScope,
        err: ErrorInfo,
        document_metadata: DocumentMetadata,
        threshold: f64,
    ) -> AnalysisResult {
        match err.class() {
            StatusClass::ClientError => info!(
                analysis_id = %scope.analysis_id,
                correlation_id = %scope.correlation_id,
                "Request rejected: {}",
                err
            ),
            StatusClass::Transient => warn!(
                analysis_id = %scope.analysis_id,
                correlation_id = %scope.correlation_id,
                "Analysis failed: {}",
                err
            ),
            StatusClass::Fatal => error!(
                analysis_id = %scope.analysis_id,
                correlation_id = %scope.correlation_id,
                "Analysis failed: {}",
                err
            ),
        }

        let model_used = document_metadata.model_id.clone();
        AnalysisResult {
            id: scope.analysis_id.clone(),
            correlation_id: scope.correlation_id.clone(),
            decision: Decision::Failed,
            field: FieldResult::extraction_error(self.gateway.field_name()),
            review_storage_locator: None,
            document_metadata,
            processing_metadata: ProcessingMetadata {
                processing_time_ms: scope.elapsed_ms(),
                confidence_threshold: threshold,
                model_used,
                ..Default::default()
            },
            created_at: scope.created_at,
            completed_at: Utc::now(),
            error_details: Some(err.public()),
            sub_errors: Vec::new(),
        }
    }

    fn model_or_default(&self, model_id: Option<&str>) -> String {
        model_id
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.request_policy.default_model_id.as_str())
            .to_string()
    }

    /// `HealthCheck`: aggregate analyzer and storage health.
    pub async fn health_check(&self) -> HealthReport {
        let (analysis, storage) = tokio::join!(self.gateway.health(), self.router.health());
        let mut components = BTreeMap::new();
        components.insert("document_analysis".to_string(), analysis);
        components.insert("review_storage".to_string(), storage);
        HealthReport::from_components(components)
    }
}

fn document_metadata(request: &AnalysisRequest) -> DocumentMetadata {
    let mut metadata = DocumentMetadata {
        source_type: request.source().source_type().to_string(),
        model_id: request.model_id().to_string(),
        document_type: request.document_type().to_string(),
        ..Default::default()
    };
    match request.source() {
        DocumentSource::Url(url) => metadata.document_url = Some(url.to_string()),
        DocumentSource::Bytes {
            data,
            filename,
            content_type,
        } => {
            metadata.filename = Some(filename.clone());
            metadata.content_type = Some(content_type.clone());
            metadata.file_size_bytes = Some(data.len() as u64);
        }
    }
    metadata
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}

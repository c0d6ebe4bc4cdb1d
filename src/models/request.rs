//! Analysis request types and their validation.
//!
//! An [`AnalysisRequest`] can only be built through [`AnalysisRequest::from_url`]
//! or [`AnalysisRequest::from_bytes`], so every request that reaches the
//! pipeline has already passed range, size and content-type checks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::ErrorInfo;

/// Maximum accepted length of a caller-supplied correlation id.
pub const MAX_CORRELATION_ID_LEN: usize = 50;

/// Maximum accepted length of a model id.
pub const MAX_MODEL_ID_LEN: usize = 100;

/// Default business label attached to requests.
pub const DEFAULT_DOCUMENT_TYPE: &str = "serialnumber";

/// File extensions accepted at the end of a document URL path.
const URL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf", "tiff", "tif", "bmp"];

static MODEL_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._~-]*$").expect("valid regex"));

/// Limits and defaults applied while building requests.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    pub default_threshold: f64,
    pub default_model_id: String,
    pub max_file_size_mb: u64,
    pub allowed_content_types: Vec<String>,
    pub allow_insecure_urls: bool,
}

impl RequestPolicy {
    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }

    fn allows_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    }
}

/// Caller parameters for `AnalyzeByUrl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlAnalysisParams {
    pub document_url: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Caller parameters for `AnalyzeByBytes`.
#[derive(Debug, Clone, Default)]
pub struct FileAnalysisParams {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub model_id: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub correlation_id: Option<String>,
    pub document_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Where the document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Url(Url),
    Bytes {
        data: Vec<u8>,
        filename: String,
        content_type: String,
    },
}

impl DocumentSource {
    pub fn source_type(&self) -> &'static str {
        match self {
            DocumentSource::Url(_) => "url",
            DocumentSource::Bytes { .. } => "file_upload",
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::Url(url) => url.to_string(),
            DocumentSource::Bytes { filename, data, .. } => {
                format!("{} ({} bytes)", filename, data.len())
            }
        }
    }
}

/// A validated, immutable analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    source: DocumentSource,
    model_id: String,
    confidence_threshold: f64,
    correlation_id: Option<String>,
    document_type: String,
    metadata: Option<serde_json::Value>,
}

impl AnalysisRequest {
    /// Build a request for a document reachable by URL.
    pub fn from_url(params: UrlAnalysisParams, policy: &RequestPolicy) -> Result<Self, ErrorInfo> {
        let url = validate_document_url(&params.document_url, policy)?;
        Self::build(
            DocumentSource::Url(url),
            params.model_id,
            params.confidence_threshold,
            params.correlation_id,
            params.document_type,
            params.metadata,
            policy,
        )
    }

    /// Build a request for uploaded document bytes.
    pub fn from_bytes(
        params: FileAnalysisParams,
        policy: &RequestPolicy,
    ) -> Result<Self, ErrorInfo> {
        let content_type = normalize_content_type(&params.content_type);
        let filename = base_filename(&params.filename);
        validate_upload(&params.data, &filename, &content_type, policy)?;
        Self::build(
            DocumentSource::Bytes {
                data: params.data,
                filename,
                content_type,
            },
            params.model_id,
            params.confidence_threshold,
            params.correlation_id,
            params.document_type,
            params.metadata,
            policy,
        )
    }

    fn build(
        source: DocumentSource,
        model_id: Option<String>,
        threshold: Option<f64>,
        correlation_id: Option<String>,
        document_type: Option<String>,
        metadata: Option<serde_json::Value>,
        policy: &RequestPolicy,
    ) -> Result<Self, ErrorInfo> {
        // An explicit request threshold (including 0.0) always wins over the global default.
        let confidence_threshold = threshold.unwrap_or(policy.default_threshold);
        validate_threshold(confidence_threshold)?;

        let model_id = model_id
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| policy.default_model_id.clone());
        validate_model_id(&model_id)?;

        let correlation_id = correlation_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(ref id) = correlation_id {
            validate_correlation_id(id)?;
        }

        if let Some(ref meta) = metadata {
            if !meta.is_object() {
                return Err(ErrorInfo::invalid_request("metadata must be a JSON object"));
            }
        }

        let document_type = document_type
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());

        Ok(Self {
            source,
            model_id,
            confidence_threshold,
            correlation_id,
            document_type,
            metadata,
        })
    }

    pub fn source(&self) -> &DocumentSource {
        &self.source
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }
}

fn validate_threshold(threshold: f64) -> Result<(), ErrorInfo> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(ErrorInfo::invalid_request(format!(
            "confidence_threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}

fn validate_model_id(model_id: &str) -> Result<(), ErrorInfo> {
    if model_id.len() > MAX_MODEL_ID_LEN {
        return Err(ErrorInfo::invalid_request(format!(
            "model_id must be at most {} characters",
            MAX_MODEL_ID_LEN
        )));
    }
    if !MODEL_ID_PATTERN.is_match(model_id) {
        return Err(ErrorInfo::invalid_request(format!(
            "model_id '{}' contains unsupported characters",
            model_id
        )));
    }
    Ok(())
}

fn validate_correlation_id(id: &str) -> Result<(), ErrorInfo> {
    if id.len() > MAX_CORRELATION_ID_LEN {
        return Err(ErrorInfo::invalid_request(format!(
            "correlation_id must be at most {} characters",
            MAX_CORRELATION_ID_LEN
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(ErrorInfo::invalid_request(
            "correlation_id must not contain control characters",
        ));
    }
    Ok(())
}

fn validate_document_url(raw: &str, policy: &RequestPolicy) -> Result<Url, ErrorInfo> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ErrorInfo::invalid_request("document_url is not a valid URL").with_details(e.to_string())
    })?;

    match url.scheme() {
        "https" => {}
        "http" if policy.allow_insecure_urls => {}
        "http" => {
            return Err(ErrorInfo::invalid_request("Document URLs must use HTTPS"));
        }
        other => {
            return Err(ErrorInfo::invalid_request(format!(
                "Unsupported URL scheme '{}'",
                other
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(ErrorInfo::invalid_request("document_url must include a host"));
    }

    let extension = extension_of(url.path());
    match extension {
        Some(ext) if URL_EXTENSIONS.contains(&ext.as_str()) => Ok(url),
        _ => Err(ErrorInfo::unsupported_file_type(format!(
            "Document URL must end with a supported file extension: {}",
            URL_EXTENSIONS.join(", ")
        ))),
    }
}

fn validate_upload(
    data: &[u8],
    filename: &str,
    content_type: &str,
    policy: &RequestPolicy,
) -> Result<(), ErrorInfo> {
    if data.is_empty() {
        return Err(ErrorInfo::invalid_request("Uploaded document is empty"));
    }
    if filename.is_empty() {
        return Err(ErrorInfo::invalid_request("Uploaded document has no filename"));
    }
    if data.len() > policy.max_file_size_bytes() {
        return Err(ErrorInfo::file_too_large(data.len(), policy.max_file_size_mb));
    }
    if !policy.allows_content_type(content_type) {
        return Err(ErrorInfo::unsupported_file_type(format!(
            "Content type {} not allowed. Supported types: {}",
            content_type,
            policy.allowed_content_types.join(", ")
        )));
    }

    let expected = extensions_for_content_type(content_type);
    let extension = extension_of(filename).unwrap_or_default();
    if !expected.is_empty() && !expected.contains(&extension.as_str()) {
        return Err(ErrorInfo::unsupported_file_type(format!(
            "File extension .{} does not match content type {}",
            extension, content_type
        )));
    }
    Ok(())
}

/// Extensions that are consistent with a content type.
pub fn extensions_for_content_type(content_type: &str) -> &'static [&'static str] {
    match content_type {
        "image/jpeg" | "image/jpg" => &["jpg", "jpeg"],
        "image/png" => &["png"],
        "image/tiff" => &["tiff", "tif"],
        "image/bmp" => &["bmp"],
        "application/pdf" => &["pdf"],
        _ => &[],
    }
}

/// Lowercased content type without parameters (`; charset=...`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Lowercased extension of the last path segment, if any.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Strip any directory components a client sent along with the filename.
fn base_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

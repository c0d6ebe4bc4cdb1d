//! Data models shared across the pipeline.

pub mod error;
pub mod health;
pub mod request;
pub mod result;

pub use error::{ErrorInfo, ErrorKind, StatusClass};
pub use health::{ComponentHealth, ComponentState, HealthReport, HealthStatus};
pub use request::{
    AnalysisRequest, DocumentSource, FileAnalysisParams, RequestPolicy, UrlAnalysisParams,
};
pub use result::{
    AnalysisResult, Decision, DocumentMetadata, ExtractedField, FieldResult, FieldStatus,
    ProcessingMetadata, StorageLocator,
};

//! Storage key layout for review documents.
//!
//! ```text
//! low-confidence/pending-review/{yyyy}/{mm}/{dd}/{analysis_id}/document.{ext}
//! low-confidence/pending-review/{yyyy}/{mm}/{dd}/{analysis_id}/metadata.json
//! ```

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::request::extension_of;

pub const PENDING_PREFIX: &str = "low-confidence/pending-review";
pub const REVIEWED_PREFIX: &str = "low-confidence/reviewed";
pub const RETRAINING_PREFIX: &str = "low-confidence/retraining";

/// Prefixes searched when looking up an analysis, in order.
pub const SEARCH_PREFIXES: [&str; 3] = [PENDING_PREFIX, REVIEWED_PREFIX, RETRAINING_PREFIX];

pub const METADATA_FILE: &str = "metadata.json";

/// Directory holding one analysis' review files, partitioned by the day the
/// analysis was created.
pub fn review_dir(created_at: DateTime<Utc>, analysis_id: &str) -> String {
    format!(
        "{}/{}/{}",
        PENDING_PREFIX,
        created_at.format("%Y/%m/%d"),
        analysis_id
    )
}

pub fn document_key(dir: &str, extension: &str) -> String {
    format!("{}/document.{}", dir, extension)
}

pub fn metadata_key(dir: &str) -> String {
    format!("{}/{}", dir, METADATA_FILE)
}

/// Partition date encoded in a key below `prefix`, if it follows the layout.
pub fn partition_date(prefix: &str, key: &str) -> Option<NaiveDate> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.splitn(4, '/');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Analysis id directory component of a metadata key.
pub fn analysis_id_of(key: &str) -> Option<&str> {
    let dir = key.strip_suffix(METADATA_FILE)?.strip_suffix('/')?;
    dir.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Pick the stored file extension.
///
/// Order: the filename's extension, the content type, sniffed magic bytes,
/// and finally `bin`.
pub fn resolve_extension(filename: Option<&str>, content_type: Option<&str>, data: &[u8]) -> String {
    if let Some(ext) = filename.and_then(extension_of) {
        if ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext;
        }
    }
    if let Some(ext) = content_type.and_then(extension_for_content_type) {
        return ext.to_string();
    }
    if let Some(kind) = infer::get(data) {
        return kind.extension().to_string();
    }
    "bin".to_string()
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/tiff" => Some("tiff"),
        "image/bmp" => Some("bmp"),
        "application/pdf" => Some("pdf"),
        "application/octet-stream" => None,
        other => mime_guess::get_mime_extensions_str(other).and_then(|exts| exts.first().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let dir = review_dir(at, "analysis-abc");
        assert_eq!(dir, "low-confidence/pending-review/2024/03/07/analysis-abc");
        assert_eq!(
            document_key(&dir, "pdf"),
            "low-confidence/pending-review/2024/03/07/analysis-abc/document.pdf"
        );
        assert_eq!(
            metadata_key(&dir),
            "low-confidence/pending-review/2024/03/07/analysis-abc/metadata.json"
        );
    }

    #[test]
    fn test_partition_date_and_id() {
        let key = "low-confidence/pending-review/2024/03/07/analysis-abc/metadata.json";
        assert_eq!(
            partition_date(PENDING_PREFIX, key),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
        assert_eq!(analysis_id_of(key), Some("analysis-abc"));
        assert_eq!(partition_date(PENDING_PREFIX, "other/2024/03/07/x"), None);
    }

    #[test]
    fn test_extension_resolution_order() {
        assert_eq!(resolve_extension(Some("scan.TIF"), Some("image/tiff"), b""), "tif");
        assert_eq!(resolve_extension(None, Some("image/jpeg"), b""), "jpg");
        assert_eq!(resolve_extension(Some("noext"), None, b"%PDF-1.7\n"), "pdf");
        assert_eq!(resolve_extension(None, Some("application/octet-stream"), b"??"), "bin");
    }
}

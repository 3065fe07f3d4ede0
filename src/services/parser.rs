//! Résumé parsing, pluggable behind [`ResumeParser`].
//!
//! The shipped [`StubParser`] performs no extraction: it checks that the
//! staged file is readable and in a supported format, then returns the empty
//! structure with every section present.

use crate::models::resume::ParsedData;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error};

/// MIME types accepted by [`StubParser`].
pub const SUPPORTED_MIME_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/rtf",
    "text/plain",
    "application/octet-stream",
];

/// Turns a stored résumé file into [`ParsedData`].
///
/// Implementations return `None` on any extraction failure instead of an
/// error; the pipeline records that as a failed upload.
///
/// Carried in the pipeline as `Arc<dyn ResumeParser>`.
#[async_trait]
pub trait ResumeParser: Send + Sync {
    async fn parse(&self, path: &Path, mime_type: &str) -> Option<ParsedData>;

    /// Parser name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StubParser;

#[async_trait]
impl ResumeParser for StubParser {
    async fn parse(&self, path: &Path, mime_type: &str) -> Option<ParsedData> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !SUPPORTED_MIME_TYPES.contains(&essence.as_str()) {
            error!("Error parsing resume: unsupported format `{}`", mime_type);
            return None;
        }

        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                debug!("stub-parsed {} ({} bytes)", path.display(), meta.len());
                Some(ParsedData::default())
            }
            Ok(_) => {
                error!("Error parsing resume: {} is empty or not a file", path.display());
                None
            }
            Err(err) => {
                error!("Error parsing resume {}: {}", path.display(), err);
                None
            }
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

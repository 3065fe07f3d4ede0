//! Represents an uploaded résumé file and its processing lifecycle.

use super::resume::ParsedData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use std::fmt;

/// Lifecycle of an upload as it moves through the processing pipeline.
///
/// `pending -> processing -> completed | failed`. The last two are terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A résumé file accepted from a user, plus the state of its background parse.
///
/// `resume_id` is only ever set on a `completed` record and `error_message`
/// only on a `failed` one.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadRecord {
    /// Row id.
    pub id: i64,

    /// Owning user (identity comes from the external auth system).
    pub user_id: i64,

    /// Résumé produced by a successful pipeline run.
    pub resume_id: Option<i64>,

    /// Where the staged bytes live on disk.
    #[serde(skip_serializing, default)]
    pub file_path: String,

    /// Filename as sent by the client.
    pub original_filename: String,

    /// Declared MIME type.
    pub file_type: String,

    /// Size in bytes.
    pub file_size: i64,

    /// MD5 hex digest of the stored bytes.
    pub checksum: String,

    /// When the upload was accepted.
    pub upload_date: DateTime<Utc>,

    pub status: UploadStatus,

    /// Raw parser output kept for inspection.
    pub parsed_data: Option<Json<ParsedData>>,

    pub error_message: Option<String>,
}

/// Fields required to insert a new `pending` upload.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: i64,
    pub file_path: String,
    pub original_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub checksum: String,
}

/// Partial update of an upload. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UploadPatch {
    pub status: Option<UploadStatus>,
    pub resume_id: Option<i64>,
    pub parsed_data: Option<ParsedData>,
    pub error_message: Option<String>,
}

impl UploadPatch {
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.resume_id.is_none()
            && self.parsed_data.is_none()
            && self.error_message.is_none()
    }

    /// Reject patches that would leave a record violating the
    /// `resume_id`/`error_message` invariants.
    pub fn check(&self) -> Result<(), String> {
        if self.resume_id.is_some() && self.status != Some(UploadStatus::Completed) {
            return Err("resume_id can only be set together with status=completed".into());
        }
        if self.error_message.is_some() && self.status != Some(UploadStatus::Failed) {
            return Err("error_message can only be set together with status=failed".into());
        }
        if self.status == Some(UploadStatus::Completed) && self.resume_id.is_none() {
            return Err("status=completed requires a resume_id".into());
        }
        if self.status == Some(UploadStatus::Failed) && self.error_message.is_none() {
            return Err("status=failed requires an error_message".into());
        }
        Ok(())
    }
}

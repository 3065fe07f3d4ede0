//! UploadStore: SQLite persistence for upload records and their status
//! transitions. Backing files are removed through the `FileStager`.

use crate::models::{
    resume::ParsedData,
    upload::{NewUpload, UploadPatch, UploadRecord, UploadStatus},
};
use crate::services::{
    Pagination,
    error::{ServiceError, ServiceResult},
    file_stager::FileStager,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use tracing::{debug, warn};

const UPLOAD_COLUMNS: &str = "id, user_id, resume_id, file_path, original_filename, file_type, \
     file_size, checksum, upload_date, status, parsed_data, error_message";

#[derive(Clone)]
pub struct UploadStore {
    db: Arc<SqlitePool>,
    stager: FileStager,
}

impl UploadStore {
    pub fn new(db: Arc<SqlitePool>, stager: FileStager) -> Self {
        Self { db, stager }
    }

    /// Insert a new record in `pending` state.
    pub async fn create(&self, upload: NewUpload) -> ServiceResult<UploadRecord> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "INSERT INTO resume_uploads (
                user_id, file_path, original_filename, file_type, file_size,
                checksum, upload_date, status
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {UPLOAD_COLUMNS}"
        ))
        .bind(upload.user_id)
        .bind(&upload.file_path)
        .bind(&upload.original_filename)
        .bind(&upload.file_type)
        .bind(upload.file_size)
        .bind(&upload.checksum)
        .bind(Utc::now())
        .bind(UploadStatus::Pending)
        .fetch_one(&*self.db)
        .await?;

        Ok(record)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<UploadRecord> {
        sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM resume_uploads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Resume upload"))
    }

    /// Uploads of one user, newest first.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> ServiceResult<Vec<UploadRecord>> {
        let rows = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM resume_uploads
             WHERE user_id = ?
             ORDER BY upload_date DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&*self.db)
        .await?;

        Ok(rows)
    }

    /// Apply only the fields present in `patch`.
    ///
    /// Setting a status also clears `resume_id`/`error_message` when the new
    /// status does not allow them, so the record invariant survives any
    /// sequence of patches.
    pub async fn update(&self, id: i64, patch: UploadPatch) -> ServiceResult<UploadRecord> {
        patch.check().map_err(ServiceError::Validation)?;
        if patch.is_empty() {
            return self.get(id).await;
        }

        let mut conn = self.db.acquire().await?;
        apply_patch(&mut conn, id, &patch, None)
            .await?
            .ok_or_else(|| ServiceError::not_found("Resume upload"))
    }

    /// Delete the record, then remove its file best-effort.
    ///
    /// Returns false when no such record exists.
    pub async fn delete(&self, id: i64) -> ServiceResult<bool> {
        let file_path: Option<String> =
            sqlx::query_scalar("DELETE FROM resume_uploads WHERE id = ? RETURNING file_path")
                .bind(id)
                .fetch_optional(&*self.db)
                .await?;

        let Some(file_path) = file_path else {
            return Ok(false);
        };

        if let Err(err) = self.stager.remove(&file_path).await {
            warn!(
                "upload {} deleted but its file {} could not be removed: {}",
                id, file_path, err
            );
        }
        Ok(true)
    }

    /// Atomically move an upload from `pending` to `processing`.
    ///
    /// Returns false if the record is missing or not pending, which means
    /// another worker already owns it.
    pub async fn try_claim(&self, id: i64) -> ServiceResult<bool> {
        let result = sqlx::query("UPDATE resume_uploads SET status = ? WHERE id = ? AND status = ?")
            .bind(UploadStatus::Processing)
            .bind(id)
            .bind(UploadStatus::Pending)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `processing -> completed`, inside the caller's transaction.
    pub async fn complete(
        conn: &mut SqliteConnection,
        id: i64,
        resume_id: i64,
        parsed_data: ParsedData,
    ) -> ServiceResult<UploadRecord> {
        let patch = UploadPatch {
            status: Some(UploadStatus::Completed),
            resume_id: Some(resume_id),
            parsed_data: Some(parsed_data),
            error_message: None,
        };
        apply_patch(conn, id, &patch, Some(UploadStatus::Processing))
            .await?
            .ok_or_else(|| {
                ServiceError::Pipeline(format!("upload {} is no longer processing", id))
            })
    }

    /// `processing -> failed` with the reason recorded.
    pub async fn fail(&self, id: i64, message: &str) -> ServiceResult<Option<UploadRecord>> {
        let patch = UploadPatch {
            error_message: Some(message.to_string()),
            ..UploadPatch::status(UploadStatus::Failed)
        };
        let mut conn = self.db.acquire().await?;
        apply_patch(&mut conn, id, &patch, Some(UploadStatus::Processing)).await
    }

    /// Ids of every upload currently in `status`, oldest first.
    pub async fn ids_with_status(&self, status: UploadStatus) -> ServiceResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM resume_uploads WHERE status = ? ORDER BY upload_date ASC, id ASC",
        )
        .bind(status)
        .fetch_all(&*self.db)
        .await?;
        Ok(ids)
    }

    /// Put records stranded in `processing` (by a crash) back to `pending`.
    ///
    /// Only safe before any worker is running.
    pub async fn requeue_processing(&self) -> ServiceResult<u64> {
        let result = sqlx::query("UPDATE resume_uploads SET status = ? WHERE status = ?")
            .bind(UploadStatus::Pending)
            .bind(UploadStatus::Processing)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Build and run `UPDATE resume_uploads SET ... WHERE id = ? [AND status = ?]`.
///
/// Returns `None` when no row matched.
async fn apply_patch(
    conn: &mut SqliteConnection,
    id: i64,
    patch: &UploadPatch,
    expected: Option<UploadStatus>,
) -> ServiceResult<Option<UploadRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE resume_uploads SET ");
    let mut set = builder.separated(", ");

    if let Some(status) = patch.status {
        set.push("status = ").push_bind_unseparated(status);
        if patch.resume_id.is_none() && status != UploadStatus::Completed {
            set.push("resume_id = NULL");
        }
        if patch.error_message.is_none() && status != UploadStatus::Failed {
            set.push("error_message = NULL");
        }
    }
    if let Some(resume_id) = patch.resume_id {
        set.push("resume_id = ").push_bind_unseparated(resume_id);
    }
    if let Some(parsed) = &patch.parsed_data {
        set.push("parsed_data = ")
            .push_bind_unseparated(Json(parsed.clone()));
    }
    if let Some(message) = &patch.error_message {
        set.push("error_message = ")
            .push_bind_unseparated(message.clone());
    }

    builder.push(" WHERE id = ").push_bind(id);
    if let Some(expected) = expected {
        builder.push(" AND status = ").push_bind(expected);
    }
    builder.push(" RETURNING ").push(UPLOAD_COLUMNS);

    debug!("updating upload {} => {:?}", id, patch.status);
    let record = builder
        .build_query_as::<UploadRecord>()
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record)
}

//! HTTP handlers for résumé uploads.
//!
//! The accept path streams the multipart `file` field straight to disk,
//! records a `pending` upload and hands its id to the pipeline queue. The
//! client gets 202 before any parsing happens.

use crate::{
    errors::AppError,
    handlers::ListQuery,
    models::upload::{NewUpload, UploadRecord},
    services::file_stager::StagedFile,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// Staged file plus what the client told us about it.
struct ReceivedFile {
    staged: StagedFile,
    original_filename: String,
    file_type: String,
}

#[derive(Default)]
struct UploadForm {
    user_id: Option<String>,
    file: Option<ReceivedFile>,
}

/// `POST /uploads/resume/`: multipart `user_id` + `file`.
pub async fn upload_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::default();
    let read = read_form(&state, multipart, &mut form).await;

    let accepted = match read.and_then(|()| validate(form.user_id.as_deref(), form.file.is_some()))
    {
        Ok(user_id) => match form.file.take() {
            Some(file) => accept(&state, user_id, file).await,
            None => Err(AppError::bad_request("No file provided")),
        },
        Err(err) => {
            discard(&state, form.file.take()).await;
            Err(err)
        }
    }?;

    if let Err(err) = state.queue.submit(accepted.id).await {
        // The record is durable; the next startup sweep picks it up.
        error!("upload {} accepted but not enqueued: {}", accepted.id, err);
    }

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Walk the form. `user_id` may come before or after `file`; unknown fields
/// are skipped.
async fn read_form(
    state: &AppState,
    mut multipart: Multipart,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                form.user_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") if form.file.is_none() => {
                form.file = Some(stage_field(state, field).await?);
            }
            Some("file") => warn!("ignoring extra `file` field in upload form"),
            _ => {}
        }
    }
    Ok(())
}

async fn stage_field(state: &AppState, field: Field<'_>) -> Result<ReceivedFile, AppError> {
    let original_filename = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "resume".to_string());
    let file_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string());

    let mut body_error: Option<MultipartError> = None;
    let chunks = field.map(|chunk| {
        chunk.map_err(|err| {
            let io_err = io::Error::other(err.body_text());
            body_error = Some(err);
            io_err
        })
    });
    let staged = state.stager.save_stream(chunks, &original_filename).await;

    match (staged, body_error) {
        (Ok(staged), _) => Ok(ReceivedFile {
            staged,
            original_filename,
            file_type,
        }),
        (Err(_), Some(err)) => Err(multipart_error(err)),
        (Err(err), None) => Err(err.into()),
    }
}

fn validate(user_id: Option<&str>, has_file: bool) -> Result<i64, AppError> {
    let user_id = match user_id.map(str::trim) {
        None | Some("") => return Err(AppError::bad_request("user_id is required")),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::bad_request("user_id must be an integer"))?,
    };
    if !has_file {
        return Err(AppError::bad_request("No file provided"));
    }
    Ok(user_id)
}

async fn accept(
    state: &AppState,
    user_id: i64,
    file: ReceivedFile,
) -> Result<UploadRecord, AppError> {
    let file_path = file.staged.path.to_string_lossy().into_owned();
    let created = state
        .uploads
        .create(NewUpload {
            user_id,
            file_path,
            original_filename: file.original_filename.clone(),
            file_type: file.file_type.clone(),
            file_size: file.staged.size,
            checksum: file.staged.checksum.clone(),
        })
        .await;

    match created {
        Ok(record) => {
            info!(
                "accepted upload {} ({}, {} bytes) for user {}",
                record.id, record.original_filename, record.file_size, user_id
            );
            Ok(record)
        }
        Err(err) => {
            discard(state, Some(file)).await;
            Err(err.into())
        }
    }
}

/// Remove a staged file that no record will ever point at.
async fn discard(state: &AppState, file: Option<ReceivedFile>) {
    let Some(file) = file else { return };
    if let Err(err) = state.stager.remove(&file.staged.path).await {
        warn!(
            "could not remove orphaned upload {}: {}",
            file.staged.path.display(),
            err
        );
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

/// `GET /uploads/resume/{id}`
pub async fn get_upload(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UploadRecord>, AppError> {
    Ok(Json(state.uploads.get(id).await?))
}

/// `GET /uploads/resume/user/{user_id}`: newest first.
pub async fn list_user_uploads(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<UploadRecord>>, AppError> {
    Ok(Json(state.uploads.list_by_user(user_id, q.page()).await?))
}

/// `DELETE /uploads/resume/{id}`: record first, file best-effort.
pub async fn delete_upload(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.uploads.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Resume upload not found"))
    }
}

/// `GET /uploads/resume/{id}/file`: stream the original bytes back.
pub async fn download_upload(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let record = state.uploads.get(id).await?;
    let file = state.stager.open(&record.file_path).await?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.file_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_FILE_TYPE)),
    );
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    let disposition = format!(
        "attachment; filename=\"{}\"",
        record.original_filename.replace(['"', '\\', '\r', '\n'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

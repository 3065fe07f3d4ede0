//! Owner-scoped résumé CRUD. The caller's identity arrives as a plain
//! `user_id`; a résumé owned by somebody else answers 404.

use crate::{
    errors::AppError,
    handlers::ListQuery,
    models::resume::{NewResume, ResumePatch, ResumeRecord},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

/// `POST /resumes`
pub async fn create_resume(
    State(state): State<AppState>,
    Json(payload): Json<NewResume>,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let record = state.resumes.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /resumes/{id}?user_id=`
pub async fn get_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<ResumeRecord>, AppError> {
    Ok(Json(state.resumes.get(id, owner.user_id).await?))
}

/// `PATCH /resumes/{id}?user_id=`
pub async fn update_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
    Json(patch): Json<ResumePatch>,
) -> Result<Json<ResumeRecord>, AppError> {
    Ok(Json(state.resumes.update(id, owner.user_id, patch).await?))
}

/// `GET /resumes/user/{user_id}`: most recently updated first.
pub async fn list_user_resumes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    Ok(Json(state.resumes.list_by_user(user_id, q.page()).await?))
}

/// `DELETE /resumes/{id}?user_id=`
pub async fn delete_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
) -> Result<StatusCode, AppError> {
    if state.resumes.delete(id, owner.user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Resume not found"))
    }
}

/// `DELETE /resumes/user/{user_id}`: called when the auth system removes a user.
pub async fn purge_user_resumes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.resumes.delete_all_for_user(user_id).await?;
    info!("purged {} resumes of user {}", deleted, user_id);
    Ok(Json(json!({ "deleted": deleted })))
}

//! ResumeStore: owner-scoped persistence for résumé records.
//!
//! Every read and write that takes a `user_id` filters on it, so a résumé
//! owned by someone else is indistinguishable from a missing one.

use crate::models::resume::{NewResume, ResumePatch, ResumeRecord};
use crate::services::{
    Pagination,
    error::{ServiceError, ServiceResult},
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;

const RESUME_COLUMNS: &str = "id, user_id, title, template, content, created_at, updated_at, \
     file_path, file_name, file_type, file_size";

#[derive(Clone)]
pub struct ResumeStore {
    db: Arc<SqlitePool>,
}

impl ResumeStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, resume: &NewResume) -> ServiceResult<ResumeRecord> {
        let mut conn = self.db.acquire().await?;
        Self::insert(&mut conn, resume).await
    }

    /// Insert on an explicit connection so callers can share a transaction.
    pub async fn insert(
        conn: &mut SqliteConnection,
        resume: &NewResume,
    ) -> ServiceResult<ResumeRecord> {
        if resume.title.trim().is_empty() {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }

        let now = Utc::now();
        let record = sqlx::query_as::<_, ResumeRecord>(&format!(
            "INSERT INTO resumes (
                user_id, title, template, content, created_at, updated_at,
                file_path, file_name, file_type, file_size
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {RESUME_COLUMNS}"
        ))
        .bind(resume.user_id)
        .bind(&resume.title)
        .bind(&resume.template)
        .bind(Json(&resume.content))
        .bind(now)
        .bind(now)
        .bind(&resume.file_path)
        .bind(&resume.file_name)
        .bind(&resume.file_type)
        .bind(resume.file_size)
        .fetch_one(&mut *conn)
        .await?;

        Ok(record)
    }

    /// Fetch a résumé only if it belongs to `user_id`.
    pub async fn get(&self, id: i64, user_id: i64) -> ServiceResult<ResumeRecord> {
        sqlx::query_as::<_, ResumeRecord>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Resume"))
    }

    /// Résumés of one user, most recently updated first.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> ServiceResult<Vec<ResumeRecord>> {
        let rows = sqlx::query_as::<_, ResumeRecord>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes
             WHERE user_id = ?
             ORDER BY updated_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&*self.db)
        .await?;

        Ok(rows)
    }

    /// Owner-scoped partial update. Always bumps `updated_at`.
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        patch: ResumePatch,
    ) -> ServiceResult<ResumeRecord> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE resumes SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(title) = patch.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(template) = patch.template {
            builder.push(", template = ").push_bind(template);
        }
        if let Some(content) = patch.content {
            builder.push(", content = ").push_bind(Json(content));
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" AND user_id = ").push_bind(user_id);
        builder.push(" RETURNING ").push(RESUME_COLUMNS);

        builder
            .build_query_as::<ResumeRecord>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Resume"))
    }

    /// Owner-scoped delete. Returns false when nothing matched.
    pub async fn delete(&self, id: i64, user_id: i64) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove every résumé of a user (account removal cascade).
    pub async fn delete_all_for_user(&self, user_id: i64) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM resumes WHERE user_id = ?")
            .bind(user_id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

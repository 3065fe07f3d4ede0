//! Banner, liveness and readiness.
//!
//! - GET /         -> service banner
//! - GET /healthz  -> liveness, no I/O
//! - GET /readyz   -> SQLite round trip plus a write/read/delete in the upload dir

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

pub const BANNER: &str = "Résumé Upload API";

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": BANNER }))
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /readyz`
///
/// 200 when every check passes, 503 otherwise. The body lists each check.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check(&state).await);
    checks.insert("upload_dir", disk_check(state.stager.base_path()).await);

    let ready = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" },
        queued: state.queue.queued(),
        checks,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn sqlite_check(state: &AppState) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => CheckStatus::pass(),
        Ok(v) => CheckStatus::fail(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::fail(format!("error: {}", e)),
    }
}

async fn disk_check(dir: &Path) -> CheckStatus {
    let probe = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&probe, b"readyz").await {
        return CheckStatus::fail(format!("could not write probe file: {}", e));
    }

    let outcome = match fs::read(&probe).await {
        Ok(bytes) if bytes == b"readyz" => CheckStatus::pass(),
        Ok(_) => CheckStatus::fail("probe file content mismatch".to_string()),
        Err(e) => CheckStatus::fail(format!("could not read probe file: {}", e)),
    };
    // best-effort cleanup
    let _ = fs::remove_file(&probe).await;
    outcome
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    /// Upload ids waiting for a worker.
    queued: usize,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn pass() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

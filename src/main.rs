use anyhow::Result;
use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    file_stager::FileStager,
    job_search::{HeuristicScorer, JobSearchClient},
    parser::StubParser,
    pipeline::RetryPolicy,
};
use state::{AppState, PipelineSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting resume-service on {} (uploads: {}, db: {}, workers: {})",
        cfg.addr(),
        cfg.upload_dir,
        cfg.database_url,
        cfg.workers
    );

    // --- Ensure upload directory exists ---
    if !Path::new(&cfg.upload_dir).exists() {
        fs::create_dir_all(&cfg.upload_dir)?;
        tracing::info!("Created upload directory at {}", cfg.upload_dir);
    }

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url, 5).await?);
    db::run_migrations(&db).await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize services and the pipeline ---
    let jobs = JobSearchClient::new(
        cfg.jobs_base_url.clone(),
        cfg.adzuna_app_id.clone(),
        cfg.adzuna_api_key.clone(),
    )?;
    let settings = PipelineSettings {
        workers: cfg.workers,
        queue_capacity: cfg.queue_capacity,
        retry: RetryPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: cfg.retry_base_delay,
        },
    };
    let (state, _dispatcher) = AppState::start(
        db,
        FileStager::new(&cfg.upload_dir),
        Arc::new(StubParser),
        settings,
        jobs,
        Arc::new(HeuristicScorer),
    );

    let recovered = state.queue.recover(&state.uploads).await?;
    if recovered > 0 {
        tracing::info!("Requeued {} pending uploads", recovered);
    }

    // --- Build router ---
    let app: Router = routes::routes::routes()
        .with_state(state)
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        .layer(cors_layer(&cfg.allowed_origins))
        .layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive when no origins are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin `{}`", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

use crate::services::job_search::DEFAULT_BASE_URL;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,

    /// Concurrent pipeline workers.
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub max_upload_bytes: usize,

    /// Empty means any origin.
    pub allowed_origins: Vec<String>,

    pub jobs_base_url: String,
    pub adzuna_app_id: Option<String>,
    pub adzuna_api_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Résumé upload and job search API")]
pub struct Args {
    /// Host to bind to (overrides RESUME_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RESUME_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides RESUME_SERVICE_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides RESUME_SERVICE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Pipeline worker count (overrides RESUME_SERVICE_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let cfg = Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("RESUME_SERVICE_HOST", "0.0.0.0")),
            port: match args.port {
                Some(port) => port,
                None => env_parse("RESUME_SERVICE_PORT", 8000)?,
            },
            upload_dir: args
                .upload_dir
                .unwrap_or_else(|| env_or("RESUME_SERVICE_UPLOAD_DIR", "./data/uploads")),
            database_url: args.database_url.unwrap_or_else(|| {
                env_or(
                    "RESUME_SERVICE_DATABASE_URL",
                    "sqlite://./data/meta/resume_service.db",
                )
            }),
            workers: match args.workers {
                Some(workers) => workers,
                None => env_parse("RESUME_SERVICE_WORKERS", 4)?,
            },
            queue_capacity: env_parse("RESUME_SERVICE_QUEUE_CAPACITY", 256)?,
            max_attempts: env_parse("RESUME_SERVICE_MAX_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(env_parse(
                "RESUME_SERVICE_RETRY_BASE_DELAY_MS",
                200,
            )?),
            max_upload_bytes: env_parse("RESUME_SERVICE_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            allowed_origins: split_list(&env_or("RESUME_SERVICE_ALLOWED_ORIGINS", "")),
            jobs_base_url: env_or("RESUME_SERVICE_JOBS_BASE_URL", DEFAULT_BASE_URL),
            adzuna_app_id: env_opt("ADZUNA_APP_ID"),
            adzuna_api_key: env_opt("ADZUNA_API_KEY"),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

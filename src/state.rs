use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::services::{
    file_stager::FileStager,
    job_search::{JobSearchClient, MatchScorer},
    parser::ResumeParser,
    pipeline::{Pipeline, PipelineQueue, RetryPolicy},
    resume_store::ResumeStore,
    upload_store::UploadStore,
};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub stager: FileStager,
    pub uploads: UploadStore,
    pub resumes: ResumeStore,
    /// Feeds accepted uploads to the background pipeline.
    pub queue: PipelineQueue,
    pub jobs: JobSearchClient,
    /// Pluggable match scorer. Default: HeuristicScorer.
    pub scorer: Arc<dyn MatchScorer>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl AppState {
    /// Wire the stores together and start the pipeline dispatcher.
    pub fn start(
        db: Arc<SqlitePool>,
        stager: FileStager,
        parser: Arc<dyn ResumeParser>,
        settings: PipelineSettings,
        jobs: JobSearchClient,
        scorer: Arc<dyn MatchScorer>,
    ) -> (Self, JoinHandle<()>) {
        let uploads = UploadStore::new(db.clone(), stager.clone());
        let resumes = ResumeStore::new(db.clone());
        let pipeline = Pipeline::new(db.clone(), uploads.clone(), parser, settings.retry);
        let (queue, dispatcher) =
            PipelineQueue::start(pipeline, settings.workers, settings.queue_capacity);

        let state = Self {
            db,
            stager,
            uploads,
            resumes,
            queue,
            jobs,
            scorer,
        };
        (state, dispatcher)
    }
}

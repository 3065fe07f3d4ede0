//! Upload processing pipeline.
//!
//! [`Pipeline`] drives one upload through its state machine:
//!
//! ```text
//! pending --claim--> processing --parse ok, résumé stored--> completed
//!                               \--parse None / any error--> failed
//! ```
//!
//! [`PipelineQueue`] feeds upload ids to the pipeline from a bounded channel,
//! running at most `workers` uploads at once. The claim is an atomic
//! compare-and-swap on `status`, so an id enqueued twice is processed once.

use crate::models::{
    resume::{DEFAULT_TEMPLATE, NewResume, ParsedData},
    upload::{UploadRecord, UploadStatus},
};
use crate::services::{
    error::{ServiceError, ServiceResult},
    mapper::to_resume_content,
    parser::ResumeParser,
    resume_store::ResumeStore,
    upload_store::UploadStore,
};
use sqlx::SqlitePool;
use std::{future::Future, path::Path, sync::Arc, time::Duration};
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

const PARSE_FAILED: &str = "Failed to parse resume file";

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry policy for transient persistence errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// How a single `process` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed { resume_id: i64 },
    Failed { reason: String },
    /// The upload was not pending (missing, or owned by another worker).
    Skipped,
}

#[derive(Clone)]
pub struct Pipeline {
    db: Arc<SqlitePool>,
    uploads: UploadStore,
    parser: Arc<dyn ResumeParser>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        db: Arc<SqlitePool>,
        uploads: UploadStore,
        parser: Arc<dyn ResumeParser>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            uploads,
            parser,
            retry,
        }
    }

    /// Run one upload to a terminal state.
    ///
    /// Never returns an error: once the upload is claimed, every failure is
    /// recorded on the record itself.
    pub async fn process(&self, upload_id: i64) -> PipelineOutcome {
        match self
            .with_retry("claim", || self.uploads.try_claim(upload_id))
            .await
        {
            Ok(true) => info!("upload {} -> processing", upload_id),
            Ok(false) => {
                debug!("upload {} is not pending, skipping", upload_id);
                return PipelineOutcome::Skipped;
            }
            Err(err) => {
                error!("could not claim upload {}: {}", upload_id, err);
                return PipelineOutcome::Skipped;
            }
        }

        match self.run(upload_id).await {
            Ok(resume_id) => {
                info!(
                    "Successfully processed resume upload {} -> resume {}",
                    upload_id, resume_id
                );
                PipelineOutcome::Completed { resume_id }
            }
            Err(err) => {
                let reason = err.to_string();
                error!("Error processing resume upload {}: {}", upload_id, reason);
                self.record_failure(upload_id, &reason).await;
                PipelineOutcome::Failed { reason }
            }
        }
    }

    /// Move a `processing` upload to `failed`. Used for errors and for
    /// panics caught by the queue.
    pub async fn record_failure(&self, upload_id: i64, reason: &str) {
        match self
            .with_retry("record failure", || self.uploads.fail(upload_id, reason))
            .await
        {
            Ok(Some(_)) => info!("upload {} -> failed", upload_id),
            Ok(None) => warn!(
                "upload {} was no longer processing when recording failure: {}",
                upload_id, reason
            ),
            Err(err) => error!(
                "could not mark upload {} as failed ({}); original error: {}",
                upload_id, err, reason
            ),
        }
    }

    async fn run(&self, upload_id: i64) -> ServiceResult<i64> {
        let upload = self
            .with_retry("load upload", || self.uploads.get(upload_id))
            .await?;

        let parsed = self
            .parser
            .parse(Path::new(&upload.file_path), &upload.file_type)
            .await
            .ok_or_else(|| ServiceError::Pipeline(PARSE_FAILED.into()))?;
        debug!("parser `{}` produced data for upload {}", self.parser.name(), upload_id);

        let resume = resume_from_upload(&upload, &parsed);
        self.with_retry("finalize", || self.finalize(upload_id, &resume, &parsed))
            .await
    }

    /// Store the résumé and complete the upload in one transaction.
    async fn finalize(
        &self,
        upload_id: i64,
        resume: &NewResume,
        parsed: &ParsedData,
    ) -> ServiceResult<i64> {
        let mut tx = self.db.begin().await?;
        let record = ResumeStore::insert(&mut *tx, resume).await?;
        UploadStore::complete(&mut *tx, upload_id, record.id, parsed.clone()).await?;
        tx.commit().await?;
        Ok(record.id)
    }

    /// Retry `op` with exponential backoff while it fails transiently.
    async fn with_retry<T, F, Fut>(&self, step: &str, mut op: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = backoff_delay(self.retry.base_delay, attempt);
                    warn!(
                        "{} attempt {} failed ({}), retrying after {}ms...",
                        step,
                        attempt,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// `base * 2^(attempt - 1)`, saturating and capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn resume_from_upload(upload: &UploadRecord, parsed: &ParsedData) -> NewResume {
    NewResume {
        user_id: upload.user_id,
        title: format!("Resume from {}", upload.original_filename),
        template: DEFAULT_TEMPLATE.to_string(),
        content: to_resume_content(parsed),
        file_path: Some(upload.file_path.clone()),
        file_name: Some(upload.original_filename.clone()),
        file_type: Some(upload.file_type.clone()),
        file_size: Some(upload.file_size),
    }
}

/// Bounded queue in front of the pipeline.
///
/// `submit` waits for queue space instead of spawning unbounded work.
#[derive(Clone)]
pub struct PipelineQueue {
    sender: mpsc::Sender<i64>,
}

impl PipelineQueue {
    /// Spawn the dispatcher. It stops once every queue handle is dropped.
    pub fn start(pipeline: Pipeline, workers: usize, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let dispatcher = tokio::spawn(dispatch(pipeline, receiver, workers.max(1)));
        info!(
            "Pipeline queue started: {} workers, capacity {}",
            workers.max(1),
            capacity.max(1)
        );
        (Self { sender }, dispatcher)
    }

    /// Enqueue an upload id for processing.
    ///
    /// Submitting the same id twice is harmless: only one claim can succeed.
    pub async fn submit(&self, upload_id: i64) -> ServiceResult<()> {
        self.sender
            .send(upload_id)
            .await
            .map_err(|_| ServiceError::Pipeline("pipeline queue is closed".into()))
    }

    /// Ids waiting in the channel.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Startup sweep: put uploads stranded in `processing` back to `pending`
    /// and enqueue every pending upload in the background.
    ///
    /// Must run before the server accepts uploads.
    pub async fn recover(&self, uploads: &UploadStore) -> ServiceResult<usize> {
        let stranded = uploads.requeue_processing().await?;
        if stranded > 0 {
            warn!("{} uploads were left processing; requeued", stranded);
        }

        let pending = uploads.ids_with_status(UploadStatus::Pending).await?;
        let count = pending.len();
        let queue = self.clone();
        tokio::spawn(async move {
            for id in pending {
                if let Err(err) = queue.submit(id).await {
                    error!("could not requeue upload {}: {}", id, err);
                    break;
                }
            }
        });
        Ok(count)
    }
}

async fn dispatch(pipeline: Pipeline, mut receiver: mpsc::Receiver<i64>, workers: usize) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(upload_id) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let _permit = permit;
            supervise(pipeline, upload_id).await;
        });
    }

    debug!("pipeline queue closed");
}

/// Run `process` in its own task so a panic in a parser still ends with the
/// upload marked failed.
async fn supervise(pipeline: Pipeline, upload_id: i64) {
    let task = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process(upload_id).await }
    });

    match task.await {
        Ok(outcome) => debug!("upload {} finished: {:?}", upload_id, outcome),
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                "resume processing task panicked".to_string()
            } else {
                format!("resume processing task aborted: {}", join_err)
            };
            error!("upload {}: {}", upload_id, reason);
            pipeline.record_failure(upload_id, &reason).await;
        }
    }
}

use crate::{
    errors::AppError,
    models::job::JobListing,
    services::job_search::{JobSearchParams, annotate},
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};
use tracing::debug;

/// `GET /api/jobs`: proxy to the job provider, annotated with a match score.
pub async fn search_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobSearchParams>,
) -> Result<Json<Vec<JobListing>>, AppError> {
    let mut jobs = state.jobs.search(&params).await?;
    annotate(&mut jobs, state.scorer.as_ref(), &params.profile());
    debug!("job search returned {} listings", jobs.len());
    Ok(Json(jobs))
}

//! Job search: a thin proxy over the Adzuna search API.
//!
//! Upstream results are reshaped into [`JobListing`]s, annotated with skills
//! from a fixed vocabulary and scored by a [`MatchScorer`].

use crate::models::job::JobListing;
use crate::services::error::{ServiceError, ServiceResult};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const DEFAULT_COUNTRY: &str = "us";
const RESULTS_PER_PAGE: &str = "20";
const MAX_SKILLS: usize = 5;

/// Vocabulary searched for in job descriptions, in output order.
pub const SKILL_VOCABULARY: [&str; 28] = [
    "python",
    "javascript",
    "java",
    "c++",
    "react",
    "angular",
    "vue",
    "node.js",
    "express",
    "django",
    "flask",
    "spring",
    "aws",
    "azure",
    "gcp",
    "docker",
    "kubernetes",
    "sql",
    "nosql",
    "mongodb",
    "postgresql",
    "mysql",
    "git",
    "agile",
    "scrum",
    "devops",
    "ci/cd",
    "machine learning",
];

/// Query string of `GET /api/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSearchParams {
    pub title: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    /// Accepted for client compatibility; the provider has no such filter.
    pub experience: Option<String>,
    /// `remote` or `onsite`; anything else disables the filter.
    pub remote: Option<String>,
    /// `"<min>-<max>"`.
    pub salary: Option<String>,
    /// Comma-separated candidate skills used for scoring.
    pub skills: Option<String>,
}

impl JobSearchParams {
    pub fn country(&self) -> &str {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY)
    }

    /// Provider query pairs, without credentials.
    fn upstream_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("results_per_page", RESULTS_PER_PAGE.to_string()),
            ("content-type", "application/json".to_string()),
        ];
        if let Some(title) = non_blank(&self.title) {
            query.push(("what", title.to_string()));
        }
        if let Some(location) = non_blank(&self.location) {
            query.push(("where", location.to_string()));
        }
        if let Some((min, max)) = self.salary.as_deref().and_then(parse_salary_range) {
            query.push(("salary_min", min.to_string()));
            query.push(("salary_max", max.to_string()));
        }
        if let Some(contract) = self.job_type.as_deref().and_then(contract_type) {
            query.push(("contract_type", contract.to_string()));
        }
        query
    }

    pub fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            title: non_blank(&self.title).map(str::to_string),
            skills: self
                .skills
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `"50000-90000"` -> `(50000, 90000)`. Anything else is ignored.
pub fn parse_salary_range(raw: &str) -> Option<(u64, u64)> {
    let (min, max) = raw.split_once('-')?;
    let min = min.trim().parse().ok()?;
    let max = max.trim().parse().ok()?;
    Some((min, max))
}

/// Client job type to the provider's `contract_type`.
pub fn contract_type(job_type: &str) -> Option<&'static str> {
    match job_type {
        "full_time" => Some("full_time"),
        "part_time" => Some("part_time"),
        "contract" => Some("contract"),
        "temporary" => Some("temp"),
        "internship" => Some("internship"),
        _ => None,
    }
}

/// Vocabulary terms found in `description`, case-insensitively, at most five.
pub fn extract_skills(description: &str) -> Vec<String> {
    let haystack = description.to_lowercase();
    SKILL_VOCABULARY
        .iter()
        .filter(|skill| haystack.contains(*skill))
        .take(MAX_SKILLS)
        .map(|skill| skill.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// What the searcher told us about themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    pub title: Option<String>,
    /// Lowercased.
    pub skills: Vec<String>,
}

/// Scores how well a listing fits a candidate, 0..=100.
///
/// Carried in the app state as `Arc<dyn MatchScorer>`.
pub trait MatchScorer: Send + Sync {
    fn score(&self, job: &JobListing, profile: &CandidateProfile) -> u8;
}

/// Keyword overlap plus noise. Without candidate skills there is nothing to
/// compare, so the score is a 60..=98 placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl MatchScorer for HeuristicScorer {
    fn score(&self, job: &JobListing, profile: &CandidateProfile) -> u8 {
        let mut rng = rand::thread_rng();
        if profile.skills.is_empty() {
            return rng.gen_range(60..=98);
        }

        let mut score: u32 = 0;
        if let Some(title) = &profile.title {
            if job.title.to_lowercase().contains(&title.to_lowercase()) {
                score += 30;
            }
        }

        let matching = job
            .skills
            .iter()
            .filter(|skill| profile.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)))
            .count() as u32;
        score += (matching * 10).min(50);
        score += rng.gen_range(0..=20);

        score.min(100) as u8
    }
}

/// Fill in `match` on every listing.
pub fn annotate(listings: &mut [JobListing], scorer: &dyn MatchScorer, profile: &CandidateProfile) {
    for listing in listings {
        let score = scorer.score(listing, profile);
        listing.match_score = Some(score);
    }
}

// ---------------------------------------------------------------------------
// Upstream client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct JobSearchClient {
    client: Client,
    base_url: String,
    app_id: Option<String>,
    app_key: Option<String>,
}

impl JobSearchClient {
    pub fn new(
        base_url: impl Into<String>,
        app_id: Option<String>,
        app_key: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id,
            app_key,
        })
    }

    /// Search the provider and reshape the first page of results.
    ///
    /// The `remote` filter is applied locally; `match` is left unset.
    pub async fn search(&self, params: &JobSearchParams) -> ServiceResult<Vec<JobListing>> {
        if self.app_id.is_none() || self.app_key.is_none() {
            warn!("job search credentials are not configured");
        }

        let url = format!("{}/{}/search/1", self.base_url, params.country());
        let mut query = params.upstream_query();
        if let Some(app_id) = &self.app_id {
            query.push(("app_id", app_id.clone()));
        }
        if let Some(app_key) = &self.app_key {
            query.push(("app_key", app_key.clone()));
        }

        debug!("job search -> {}", url);
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;
        let data: Option<Value> = serde_json::from_str(&body).ok();

        if status != StatusCode::OK {
            let message = data
                .as_ref()
                .and_then(|d| d.get("error"))
                .map(|e| match e.as_str() {
                    Some(s) => s.to_string(),
                    None => e.to_string(),
                })
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!("job search upstream returned {}: {}", status, message);
            return Err(ServiceError::Upstream(message));
        }

        let data = data.ok_or_else(|| {
            ServiceError::Upstream("provider returned a non-JSON body".to_string())
        })?;
        let listings: Vec<JobListing> = data
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(to_listing).collect())
            .unwrap_or_default();

        Ok(filter_remote(listings, params.remote.as_deref()))
    }
}

fn filter_remote(listings: Vec<JobListing>, remote: Option<&str>) -> Vec<JobListing> {
    match remote.map(str::to_ascii_lowercase).as_deref() {
        Some("remote") => listings.into_iter().filter(|j| j.is_remote).collect(),
        Some("onsite") => listings.into_iter().filter(|j| !j.is_remote).collect(),
        _ => listings,
    }
}

/// Reshape one provider result.
fn to_listing(result: &Value) -> JobListing {
    let text = |key: &str| result.get(key).and_then(Value::as_str).map(str::to_string);
    let display_name = |key: &str| {
        result
            .get(key)
            .and_then(|v| v.get("display_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let id = match result.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let description = text("description").unwrap_or_default();
    let job_type = text("contract_type")
        .map(|t| title_case(&t.replace('_', " ")))
        .unwrap_or_else(|| "Not specified".to_string());

    JobListing {
        id,
        title: text("title").unwrap_or_default(),
        company: display_name("company").unwrap_or_else(|| "Unknown Company".to_string()),
        location: display_name("location").unwrap_or_default(),
        job_type: Some(job_type),
        salary: Some(format!(
            "{} - {}",
            salary_bound(result.get("salary_min")),
            salary_bound(result.get("salary_max"))
        )),
        is_remote: description.to_lowercase().contains("remote"),
        posted_at: text("created"),
        skills: extract_skills(&description),
        description,
        match_score: None,
        status: "new".to_string(),
        saved: false,
    }
}

fn salary_bound(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(n) if n.fract() == 0.0 => format!("{}", n as i64),
        Some(n) => n.to_string(),
        None => "N/A".to_string(),
    }
}

fn title_case(raw: &str) -> String {
    raw.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

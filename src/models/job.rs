//! Job postings relayed from the external job-search provider.

use serde::{Deserialize, Serialize};

/// A transient job posting, reshaped from the provider and annotated with
/// heuristic skills and a match score. Never persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub salary: Option<String>,
    pub is_remote: bool,
    pub posted_at: Option<String>,
    pub skills: Vec<String>,
    #[serde(rename = "match")]
    pub match_score: Option<u8>,
    pub status: String,
    pub saved: bool,
}

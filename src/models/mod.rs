//! Core data models for the résumé service.
//!
//! Uploads and résumés map to SQLite tables via `sqlx::FromRow`; job listings
//! are transient and only ever serialized to clients.

pub mod job;
pub mod resume;
pub mod upload;

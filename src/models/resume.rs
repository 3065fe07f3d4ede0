//! Résumé documents: the parser's intermediate shape and the stored content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};

pub const DEFAULT_TEMPLATE: &str = "professional";
pub const DEFAULT_SKILL_PROFICIENCY: u8 = 3;

// ---------------------------------------------------------------------------
// Parser output
// ---------------------------------------------------------------------------

/// Structured extraction from an uploaded file, before mapping.
///
/// Every top-level section is always present (possibly empty); nested entry
/// fields are optional because extraction may only find part of an entry.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedData {
    pub personal_info: ParsedPersonalInfo,
    pub summary: Option<String>,
    pub education: Vec<ParsedEducation>,
    pub experience: Vec<ParsedExperience>,
    pub skills: Vec<ParsedSkill>,
    pub certifications: Vec<Value>,
    pub languages: Vec<Value>,
    pub projects: Vec<ParsedProject>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedPersonalInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedEducation {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gpa: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedExperience {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub highlights: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedSkill {
    pub name: Option<String>,
    pub proficiency: Option<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ParsedProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub highlights: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Stored content
// ---------------------------------------------------------------------------

/// The résumé content schema served to clients (camelCase on the wire).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResumeContent {
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub skills: Vec<Skill>,
    pub certifications: Vec<Value>,
    pub languages: Vec<Value>,
    pub projects: Vec<Project>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    pub linkedin: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub highlights: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub proficiency: u8,
}

impl Default for Skill {
    fn default() -> Self {
        Self {
            name: String::new(),
            proficiency: DEFAULT_SKILL_PROFICIENCY,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    pub url: String,
    pub highlights: Vec<String>,
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// A résumé owned by exactly one user.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ResumeRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub template: String,
    pub content: Json<ResumeContent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Metadata of the original document when the résumé came from an upload.
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
}

/// Insert payload for a résumé, used by the pipeline and by `POST /resumes`.
#[derive(Deserialize, Clone, Debug)]
pub struct NewResume {
    pub user_id: i64,
    pub title: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub content: ResumeContent,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// Owner-scoped partial update; absent fields are left as they are.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ResumePatch {
    pub title: Option<String>,
    pub template: Option<String>,
    pub content: Option<ResumeContent>,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_parsed_data_serializes_every_section() {
        let value = serde_json::to_value(ParsedData::default()).unwrap();
        for key in [
            "personal_info",
            "summary",
            "education",
            "experience",
            "skills",
            "certifications",
            "languages",
            "projects",
        ] {
            assert!(value.get(key).is_some(), "missing section {key}");
        }
    }

    #[test]
    fn parsed_data_tolerates_missing_keys() {
        let parsed: ParsedData = serde_json::from_value(json!({
            "experience": [{ "title": "Engineer" }]
        }))
        .unwrap();
        assert_eq!(parsed.experience[0].title.as_deref(), Some("Engineer"));
        assert!(parsed.experience[0].company.is_none());
        assert!(parsed.education.is_empty());
    }

    #[test]
    fn content_uses_camel_case_keys() {
        let value = serde_json::to_value(ResumeContent::default()).unwrap();
        assert!(value.get("personalInfo").is_some());
        assert!(value["personalInfo"].get("linkedin").is_some());
    }

    #[test]
    fn new_resume_defaults_template() {
        let resume: NewResume = serde_json::from_value(json!({
            "user_id": 7,
            "title": "Backend engineer"
        }))
        .unwrap();
        assert_eq!(resume.template, DEFAULT_TEMPLATE);
        assert_eq!(resume.content, ResumeContent::default());
    }
}

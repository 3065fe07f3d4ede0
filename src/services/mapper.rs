//! Maps parser output onto the stored résumé content schema.
//!
//! Pure and total: absent fields become empty strings / empty lists, and a
//! skill without a proficiency gets `DEFAULT_SKILL_PROFICIENCY`.

use crate::models::resume::{
    DEFAULT_SKILL_PROFICIENCY, Education, Experience, ParsedData, ParsedEducation,
    ParsedExperience, ParsedPersonalInfo, ParsedProject, ParsedSkill, PersonalInfo, Project,
    ResumeContent, Skill,
};

pub fn to_resume_content(parsed: &ParsedData) -> ResumeContent {
    ResumeContent {
        personal_info: personal_info(&parsed.personal_info),
        summary: text(&parsed.summary),
        education: parsed.education.iter().map(education).collect(),
        experience: parsed.experience.iter().map(experience).collect(),
        skills: parsed.skills.iter().map(skill).collect(),
        certifications: parsed.certifications.clone(),
        languages: parsed.languages.clone(),
        projects: parsed.projects.iter().map(project).collect(),
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn personal_info(info: &ParsedPersonalInfo) -> PersonalInfo {
    PersonalInfo {
        name: text(&info.name),
        email: text(&info.email),
        phone: text(&info.phone),
        location: text(&info.location),
        website: text(&info.website),
        linkedin: text(&info.linkedin),
    }
}

fn education(edu: &ParsedEducation) -> Education {
    Education {
        institution: text(&edu.institution),
        degree: text(&edu.degree),
        field_of_study: text(&edu.field_of_study),
        start_date: text(&edu.start_date),
        end_date: text(&edu.end_date),
        gpa: text(&edu.gpa),
        description: text(&edu.description),
    }
}

fn experience(exp: &ParsedExperience) -> Experience {
    Experience {
        title: text(&exp.title),
        company: text(&exp.company),
        location: text(&exp.location),
        start_date: text(&exp.start_date),
        end_date: text(&exp.end_date),
        description: text(&exp.description),
        highlights: exp.highlights.clone().unwrap_or_default(),
    }
}

fn skill(skill: &ParsedSkill) -> Skill {
    Skill {
        name: text(&skill.name),
        proficiency: skill.proficiency.unwrap_or(DEFAULT_SKILL_PROFICIENCY),
    }
}

fn project(proj: &ParsedProject) -> Project {
    Project {
        name: text(&proj.name),
        description: text(&proj.description),
        url: text(&proj.url),
        highlights: proj.highlights.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn map_json(input: Value) -> Value {
        let parsed: ParsedData = serde_json::from_value(input).unwrap();
        serde_json::to_value(to_resume_content(&parsed)).unwrap()
    }

    #[test]
    fn empty_input_yields_every_default() {
        let content = to_resume_content(&ParsedData::default());
        assert_eq!(content, ResumeContent::default());

        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!({
                "personalInfo": {
                    "name": "", "email": "", "phone": "",
                    "location": "", "website": "", "linkedin": ""
                },
                "summary": "",
                "education": [],
                "experience": [],
                "skills": [],
                "certifications": [],
                "languages": [],
                "projects": []
            })
        );
    }

    #[test]
    fn mapping_table() {
        let cases = vec![
            (
                json!({ "personal_info": { "name": "Ada Lovelace", "email": "ada@example.com" } }),
                "/personalInfo/name",
                json!("Ada Lovelace"),
            ),
            (
                json!({ "personal_info": { "name": "Ada Lovelace" } }),
                "/personalInfo/phone",
                json!(""),
            ),
            (json!({ "summary": "Systems engineer" }), "/summary", json!("Systems engineer")),
            (
                json!({ "education": [{ "institution": "MIT", "field_of_study": "CS" }] }),
                "/education/0/fieldOfStudy",
                json!("CS"),
            ),
            (
                json!({ "education": [{ "institution": "MIT" }] }),
                "/education/0/gpa",
                json!(""),
            ),
            (
                json!({ "experience": [{ "title": "SRE", "start_date": "2020-01" }] }),
                "/experience/0/startDate",
                json!("2020-01"),
            ),
            (
                json!({ "experience": [{ "title": "SRE" }] }),
                "/experience/0/highlights",
                json!([]),
            ),
            (
                json!({ "experience": [{ "highlights": ["Cut p99 by 40%"] }] }),
                "/experience/0/highlights/0",
                json!("Cut p99 by 40%"),
            ),
            (json!({ "skills": [{ "name": "Rust" }] }), "/skills/0/proficiency", json!(3)),
            (
                json!({ "skills": [{ "name": "Rust", "proficiency": 5 }] }),
                "/skills/0/proficiency",
                json!(5),
            ),
            (json!({ "skills": [{}] }), "/skills/0/name", json!("")),
            (
                json!({ "certifications": ["CKA", { "name": "AWS SA" }] }),
                "/certifications",
                json!(["CKA", { "name": "AWS SA" }]),
            ),
            (json!({ "languages": ["English"] }), "/languages/0", json!("English")),
            (
                json!({ "projects": [{ "name": "crate", "url": "https://example.com" }] }),
                "/projects/0/url",
                json!("https://example.com"),
            ),
            (json!({ "projects": [{ "name": "crate" }] }), "/projects/0/description", json!("")),
        ];

        for (input, pointer, expected) in cases {
            let output = map_json(input.clone());
            assert_eq!(
                output.pointer(pointer),
                Some(&expected),
                "input {input} at {pointer}"
            );
        }
    }

    #[test]
    fn mapping_is_deterministic() {
        let parsed: ParsedData = serde_json::from_value(json!({
            "summary": "Backend engineer",
            "experience": [{ "title": "Engineer", "company": "Acme" }],
            "skills": [{ "name": "Go" }, { "name": "Rust", "proficiency": 4 }]
        }))
        .unwrap();
        assert_eq!(to_resume_content(&parsed), to_resume_content(&parsed));
        assert_eq!(to_resume_content(&parsed).skills.len(), 2);
    }
}

//! Job posting records: the stored row, the loose draft extractors produce, and the
//! validated record that crosses into storage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

const MAX_TITLE_CHARS: usize = 500;
const MAX_TEXT_CHARS: usize = 20_000;
const MAX_SHORT_CHARS: usize = 255;
const MAX_EXPERIENCE_YEARS: i32 = 50;

// ────────────────────────────────────────────────────────────────────────────
// Enumerations
// ────────────────────────────────────────────────────────────────────────────

/// How strongly a posting asks for a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageLevel {
    Required,
    Desirable,
}

/// Language code (`en`, `fr`, ...) → requirement level.
pub type LanguageRequirements = BTreeMap<String, LanguageLevel>;

/// Ordinal education ladder. Declaration order is the ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    #[serde(rename = "High School")]
    HighSchool,
    #[serde(rename = "Diploma/Certificate")]
    DiplomaCertificate,
    #[serde(rename = "Bachelor's")]
    Bachelors,
    #[serde(rename = "Master's")]
    Masters,
    #[serde(rename = "Doctorate")]
    Doctorate,
}

impl EducationLevel {
    /// Canonical label as stored in the `education_level` column.
    pub fn label(self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "High School",
            EducationLevel::DiplomaCertificate => "Diploma/Certificate",
            EducationLevel::Bachelors => "Bachelor's",
            EducationLevel::Masters => "Master's",
            EducationLevel::Doctorate => "Doctorate",
        }
    }

    /// 1-based position on the ladder.
    pub fn rank(self) -> u8 {
        match self {
            EducationLevel::HighSchool => 1,
            EducationLevel::DiplomaCertificate => 2,
            EducationLevel::Bachelors => 3,
            EducationLevel::Masters => 4,
            EducationLevel::Doctorate => 5,
        }
    }

    /// Lenient label parsing for values coming from parsers and the database.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace('’', "'");
        let level = match normalized.as_str() {
            "high school" | "secondary" | "secondary school" => EducationLevel::HighSchool,
            "diploma/certificate" | "diploma" | "certificate" => EducationLevel::DiplomaCertificate,
            "bachelor's" | "bachelor" | "bachelors" | "bachelor's degree" | "first-level" => {
                EducationLevel::Bachelors
            }
            "master's" | "master" | "masters" | "master's degree" | "advanced" => {
                EducationLevel::Masters
            }
            "doctorate" | "phd" | "ph.d." | "ph.d" | "doctoral" => EducationLevel::Doctorate,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stored row
// ────────────────────────────────────────────────────────────────────────────

/// One external vacancy as stored in the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    pub id: Uuid,
    pub job_id: String,
    pub title: String,
    pub organization: String,
    pub description: Option<String>,
    pub responsibilities: Option<String>,
    pub qualifications: Option<String>,
    pub category: Option<String>,
    pub grade: Option<String>,
    pub contract_type: Option<String>,
    pub location: Option<String>,
    pub duty_station: Option<String>,
    pub remote_eligible: bool,
    pub language_requirements: Json<LanguageRequirements>,
    pub education_level: Option<String>,
    pub years_of_experience: Option<i32>,
    pub apply_url: String,
    pub deadline: Option<NaiveDate>,
    pub posted_date: Option<NaiveDate>,
    pub source_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scraped: DateTime<Utc>,
}

impl JobPosting {
    /// Text the keyword extractor runs over.
    pub fn match_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.qualifications.as_deref(),
            self.responsibilities.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn education(&self) -> Option<EducationLevel> {
        self.education_level.as_deref().and_then(EducationLevel::from_label)
    }

    /// Location used for matching: duty station wins over the listing location.
    pub fn match_location(&self) -> Option<&str> {
        self.duty_station
            .as_deref()
            .or(self.location.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor output
// ────────────────────────────────────────────────────────────────────────────

/// Partial job record produced by an extractor from a listing row or a detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub job_id: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub responsibilities: Option<String>,
    pub qualifications: Option<String>,
    pub category: Option<String>,
    pub grade: Option<String>,
    pub contract_type: Option<String>,
    pub location: Option<String>,
    pub duty_station: Option<String>,
    pub remote_eligible: Option<bool>,
    pub language_requirements: LanguageRequirements,
    pub education_level: Option<EducationLevel>,
    pub years_of_experience: Option<i32>,
    pub apply_url: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub posted_date: Option<NaiveDate>,
    pub source_url: Option<String>,
}

impl JobDraft {
    /// Overlays fields found on a detail page. Present detail values win.
    pub fn enrich(&mut self, detail: JobDraft) {
        fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        overlay(&mut self.title, detail.title);
        overlay(&mut self.organization, detail.organization);
        overlay(&mut self.apply_url, detail.apply_url);
        overlay(&mut self.description, detail.description);
        overlay(&mut self.responsibilities, detail.responsibilities);
        overlay(&mut self.qualifications, detail.qualifications);
        overlay(&mut self.category, detail.category);
        overlay(&mut self.grade, detail.grade);
        overlay(&mut self.contract_type, detail.contract_type);
        overlay(&mut self.location, detail.location);
        overlay(&mut self.duty_station, detail.duty_station);
        overlay(&mut self.remote_eligible, detail.remote_eligible);
        overlay(&mut self.education_level, detail.education_level);
        overlay(&mut self.years_of_experience, detail.years_of_experience);
        overlay(&mut self.deadline, detail.deadline);
        overlay(&mut self.posted_date, detail.posted_date);
        overlay(&mut self.source_url, detail.source_url);
        self.language_requirements
            .extend(detail.language_requirements);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validated record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobValidationError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("apply_url is not an absolute http(s) URL: {0}")]
    BadUrl(String),
}

/// A job record that passed the crawler → storage boundary checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJob {
    pub job_id: String,
    pub title: String,
    pub organization: String,
    pub description: Option<String>,
    pub responsibilities: Option<String>,
    pub qualifications: Option<String>,
    pub category: Option<String>,
    pub grade: Option<String>,
    pub contract_type: Option<String>,
    pub location: Option<String>,
    pub duty_station: Option<String>,
    pub remote_eligible: bool,
    pub language_requirements: LanguageRequirements,
    pub education_level: Option<EducationLevel>,
    pub years_of_experience: Option<i32>,
    pub apply_url: String,
    pub deadline: Option<NaiveDate>,
    pub posted_date: Option<NaiveDate>,
    pub source_url: Option<String>,
}

impl TryFrom<JobDraft> for NewJob {
    type Error = JobValidationError;

    fn try_from(draft: JobDraft) -> Result<Self, Self::Error> {
        let job_id = required(draft.job_id, "job_id", MAX_SHORT_CHARS)?;
        let title = required(draft.title, "title", MAX_TITLE_CHARS)?;
        let organization = required(draft.organization, "organization", MAX_SHORT_CHARS)?;
        let apply_url = required(draft.apply_url, "apply_url", usize::MAX)?;

        match Url::parse(&apply_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(JobValidationError::BadUrl(apply_url)),
        }

        Ok(NewJob {
            job_id,
            title,
            organization,
            description: optional(draft.description, MAX_TEXT_CHARS),
            responsibilities: optional(draft.responsibilities, MAX_TEXT_CHARS),
            qualifications: optional(draft.qualifications, MAX_TEXT_CHARS),
            category: optional(draft.category, MAX_SHORT_CHARS),
            grade: optional(draft.grade, MAX_SHORT_CHARS),
            contract_type: optional(draft.contract_type, MAX_SHORT_CHARS),
            location: optional(draft.location, MAX_SHORT_CHARS),
            duty_station: optional(draft.duty_station, MAX_SHORT_CHARS),
            remote_eligible: draft.remote_eligible.unwrap_or(false),
            language_requirements: draft.language_requirements,
            education_level: draft.education_level,
            years_of_experience: draft
                .years_of_experience
                .filter(|y| (0..=MAX_EXPERIENCE_YEARS).contains(y)),
            apply_url,
            deadline: draft.deadline,
            posted_date: draft.posted_date,
            source_url: optional(draft.source_url, usize::MAX),
        })
    }
}

impl NewJob {
    /// Builds the row representation, used by stores that do not round-trip through SQL.
    pub fn to_posting(&self, id: Uuid, created_at: DateTime<Utc>, now: DateTime<Utc>) -> JobPosting {
        JobPosting {
            id,
            job_id: self.job_id.clone(),
            title: self.title.clone(),
            organization: self.organization.clone(),
            description: self.description.clone(),
            responsibilities: self.responsibilities.clone(),
            qualifications: self.qualifications.clone(),
            category: self.category.clone(),
            grade: self.grade.clone(),
            contract_type: self.contract_type.clone(),
            location: self.location.clone(),
            duty_station: self.duty_station.clone(),
            remote_eligible: self.remote_eligible,
            language_requirements: Json(self.language_requirements.clone()),
            education_level: self.education_level.map(|e| e.label().to_string()),
            years_of_experience: self.years_of_experience,
            apply_url: self.apply_url.clone(),
            deadline: self.deadline,
            posted_date: self.posted_date,
            source_url: self.source_url.clone(),
            is_active: true,
            created_at,
            updated_at: now,
            last_scraped: now,
        }
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
    max_chars: usize,
) -> Result<String, JobValidationError> {
    optional(value, max_chars).ok_or(JobValidationError::Missing(field))
}

fn optional(value: Option<String>, max_chars: usize) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| truncate_chars(v, max_chars))
}

fn truncate_chars(value: String, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].trim_end().to_string(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> JobDraft {
        JobDraft {
            job_id: Some("UN-12345".to_string()),
            title: Some("  Programme Management Officer ".to_string()),
            organization: Some("UN".to_string()),
            apply_url: Some("https://careers.un.org/jobopening/12345".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_draft_is_trimmed() {
        let job = NewJob::try_from(draft()).unwrap();
        assert_eq!(job.title, "Programme Management Officer");
        assert!(!job.remote_eligible);
    }

    #[test]
    fn test_missing_title_rejected() {
        let mut d = draft();
        d.title = Some("   ".to_string());
        assert_eq!(
            NewJob::try_from(d).unwrap_err(),
            JobValidationError::Missing("title")
        );
    }

    #[test]
    fn test_relative_apply_url_rejected() {
        let mut d = draft();
        d.apply_url = Some("/jobopening/12345".to_string());
        assert!(matches!(
            NewJob::try_from(d),
            Err(JobValidationError::BadUrl(_))
        ));
    }

    #[test]
    fn test_out_of_range_experience_coerced_to_none() {
        let mut d = draft();
        d.years_of_experience = Some(2015);
        assert_eq!(NewJob::try_from(d).unwrap().years_of_experience, None);

        let mut d = draft();
        d.years_of_experience = Some(7);
        assert_eq!(NewJob::try_from(d).unwrap().years_of_experience, Some(7));
    }

    #[test]
    fn test_long_description_truncated_on_char_boundary() {
        let mut d = draft();
        d.description = Some("é".repeat(MAX_TEXT_CHARS + 10));
        let job = NewJob::try_from(d).unwrap();
        assert_eq!(job.description.unwrap().chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_enrich_prefers_detail_values() {
        let mut listing = draft();
        listing.location = Some("New York".to_string());
        listing.grade = Some("P-3".to_string());

        let detail = JobDraft {
            grade: Some("P-4".to_string()),
            description: Some("Full text".to_string()),
            ..Default::default()
        };
        listing.enrich(detail);

        assert_eq!(listing.grade.as_deref(), Some("P-4"));
        assert_eq!(listing.location.as_deref(), Some("New York"));
        assert_eq!(listing.description.as_deref(), Some("Full text"));
    }

    #[test]
    fn test_education_ladder_order_and_labels() {
        assert!(EducationLevel::Doctorate > EducationLevel::Masters);
        assert!(EducationLevel::HighSchool < EducationLevel::DiplomaCertificate);
        assert_eq!(EducationLevel::from_label("PhD"), Some(EducationLevel::Doctorate));
        assert_eq!(
            EducationLevel::from_label("Master's Degree"),
            Some(EducationLevel::Masters)
        );
        assert_eq!(EducationLevel::Masters.label(), "Master's");
        assert_eq!(EducationLevel::from_label("kindergarten"), None);
    }

    #[test]
    fn test_language_level_serializes_lowercase() {
        let json = serde_json::to_string(&LanguageLevel::Required).unwrap();
        assert_eq!(json, "\"required\"");
    }
}

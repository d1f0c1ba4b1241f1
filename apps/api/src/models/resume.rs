use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::job::EducationLevel;

/// Parsed candidate input, read-only for matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct ResumeProfile {
    pub id: Uuid,
    pub raw_text: String,
    pub skills: Vec<String>,
    pub experience_years: Option<i32>,
    pub education_level: Option<String>,
}

impl ResumeProfile {
    pub fn education(&self) -> Option<EducationLevel> {
        self.education_level.as_deref().and_then(EducationLevel::from_label)
    }
}

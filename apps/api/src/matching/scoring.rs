//! Match scorer: weighted compatibility between one résumé and one job posting.
//!
//! Five independent factors, each in `[0, 1]`, combined by weights summing to 1.0.
//! Sparse input never fails: every factor has a neutral default.

use serde::{Deserialize, Serialize};

use crate::heuristics::{contains_term, language_names};
use crate::matching::fuzzy::FuzzyMatcher;
use crate::matching::keywords::{KeywordExtractor, WeightedKeyword, DEFAULT_MAX_KEYWORDS};
use crate::models::job::{EducationLevel, JobPosting, LanguageLevel, LanguageRequirements};
use crate::models::resume::ResumeProfile;

const TOP_KEYWORDS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Per-factor scores, rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword_match: f64,
    pub experience_match: f64,
    pub education_match: f64,
    pub language_match: f64,
    pub location_match: f64,
}

/// Full match result returned to callers and cached per (résumé, job).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: f64, // 0.0 – 1.0, two decimals
    pub matching_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub recommendation: String,
    pub breakdown: ScoreBreakdown,
}

/// Factor weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub keyword: f64,
    pub experience: f64,
    pub education: f64,
    pub language: f64,
    pub location: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            keyword: 0.40,
            experience: 0.25,
            education: 0.15,
            language: 0.12,
            location: 0.08,
        }
    }
}

impl MatchWeights {
    pub fn total(&self) -> f64 {
        self.keyword + self.experience + self.education + self.language + self.location
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scorer
// ────────────────────────────────────────────────────────────────────────────

/// Pure scoring over already-loaded records. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct MatchScorer {
    extractor: KeywordExtractor,
    fuzzy: FuzzyMatcher,
    fuzzy_accept: f64,
    weights: MatchWeights,
    max_keywords: usize,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new(KeywordExtractor::default(), FuzzyMatcher::default(), 0.8)
    }
}

impl MatchScorer {
    pub fn new(extractor: KeywordExtractor, fuzzy: FuzzyMatcher, fuzzy_accept: f64) -> Self {
        Self {
            extractor,
            fuzzy,
            fuzzy_accept,
            weights: MatchWeights::default(),
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }

    pub fn score(&self, resume: &ResumeProfile, job: &JobPosting) -> MatchResult {
        let keywords = self.extractor.extract(&job.match_text(), self.max_keywords);
        let overlap = keyword_overlap(resume, &keywords, &self.fuzzy, self.fuzzy_accept);

        let experience = experience_score(job.years_of_experience, resume.experience_years);
        let education = education_score(
            job.education_level.as_deref(),
            resume.education_level.as_deref(),
        );
        let language = language_score(
            &job.language_requirements,
            resume,
            &self.fuzzy,
            self.fuzzy_accept,
        );
        let location = location_score(job.match_location(), &resume.raw_text);

        let w = &self.weights;
        let total = overlap.score * w.keyword
            + experience * w.experience
            + education * w.education
            + language * w.language
            + location * w.location;
        let score = round2(total.clamp(0.0, 1.0));

        let matching_keywords: Vec<String> =
            overlap.matching.into_iter().take(TOP_KEYWORDS).collect();
        let missing_keywords: Vec<String> =
            overlap.missing.into_iter().take(TOP_KEYWORDS).collect();

        let recommendation = rule_based_recommendation(score, &missing_keywords, job, resume);

        MatchResult {
            score,
            matching_keywords,
            missing_keywords,
            recommendation,
            breakdown: ScoreBreakdown {
                keyword_match: round2(overlap.score),
                experience_match: round2(experience),
                education_match: round2(education),
                language_match: round2(language),
                location_match: round2(location),
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Factors
// ────────────────────────────────────────────────────────────────────────────

/// Keyword split into hits and misses, in the extractor's importance order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordOverlap {
    pub matching: Vec<String>,
    pub missing: Vec<String>,
    /// Matched weight over total weight; 0.5 when the job yields no keywords.
    pub score: f64,
}

pub fn keyword_overlap(
    resume: &ResumeProfile,
    keywords: &[WeightedKeyword],
    fuzzy: &FuzzyMatcher,
    accept: f64,
) -> KeywordOverlap {
    let mut matching = Vec::new();
    let mut missing = Vec::new();
    let mut total_weight = 0.0_f64;
    let mut matched_weight = 0.0_f64;

    for (keyword, weight) in keywords {
        let weight = *weight;
        total_weight += weight;

        let exact = contains_term(&resume.raw_text, keyword)
            || resume
                .skills
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(keyword));
        if exact {
            matched_weight += weight;
            matching.push(keyword.clone());
            continue;
        }

        let best = fuzzy.best_match(keyword, resume.skills.iter().map(String::as_str));
        if best >= accept {
            matched_weight += weight * best;
            matching.push(keyword.clone());
        } else {
            missing.push(keyword.clone());
        }
    }

    let score = if total_weight > 0.0 {
        matched_weight / total_weight
    } else {
        0.5
    };

    KeywordOverlap {
        matching,
        missing,
        score,
    }
}

/// Candidate years against required years.
pub fn experience_score(required: Option<i32>, candidate: Option<i32>) -> f64 {
    let required = match required {
        Some(r) if r > 0 => r as f64,
        _ => return 0.9,
    };
    let candidate = match candidate {
        Some(c) if c >= 0 => c as f64,
        _ => return 0.5,
    };

    if candidate >= required * 1.5 {
        return 1.0;
    }
    if candidate >= required {
        // linear from 0.95 at the requirement towards 1.0 at 1.5×
        return 0.95 + (candidate - required) / (0.5 * required) * 0.05;
    }

    let ratio = candidate / required;
    if ratio >= 0.75 {
        0.85
    } else if ratio >= 0.5 {
        0.70
    } else {
        ratio.max(0.30)
    }
}

/// Ladder comparison. Unrecognised labels sit at the Bachelor's rung.
pub fn education_score(required: Option<&str>, candidate: Option<&str>) -> f64 {
    let Some(required) = required.filter(|s| !s.trim().is_empty()) else {
        return 0.9;
    };
    let Some(candidate) = candidate.filter(|s| !s.trim().is_empty()) else {
        return 0.6;
    };

    let required_rank = ladder_rank(required);
    let candidate_rank = ladder_rank(candidate);

    if candidate_rank > required_rank {
        1.0
    } else if candidate_rank == required_rank {
        0.95
    } else {
        (candidate_rank as f64 / required_rank as f64 * 0.8).max(0.40)
    }
}

fn ladder_rank(label: &str) -> u8 {
    EducationLevel::from_label(label)
        .unwrap_or(EducationLevel::Bachelors)
        .rank()
}

/// Share of required languages the résumé evidences, mapped onto `[0.5, 1.0]`.
pub fn language_score(
    requirements: &LanguageRequirements,
    resume: &ResumeProfile,
    fuzzy: &FuzzyMatcher,
    accept: f64,
) -> f64 {
    let required: Vec<&str> = requirements
        .iter()
        .filter(|(_, level)| **level == LanguageLevel::Required)
        .map(|(code, _)| code.as_str())
        .collect();

    if required.is_empty() {
        return 0.9;
    }

    let matched = required
        .iter()
        .filter(|code| {
            language_names(code).into_iter().any(|name| {
                contains_term(&resume.raw_text, name)
                    || resume
                        .skills
                        .iter()
                        .any(|s| s.trim().eq_ignore_ascii_case(name))
                    || fuzzy.best_match(name, resume.skills.iter().map(String::as_str)) >= accept
            })
        })
        .count();

    0.5 + (matched as f64 / required.len() as f64) * 0.5
}

/// Job location against the résumé text. No signal is not a penalty.
pub fn location_score(job_location: Option<&str>, resume_text: &str) -> f64 {
    let Some(location) = job_location.map(str::trim).filter(|l| !l.is_empty()) else {
        return 0.85;
    };
    if resume_text.trim().is_empty() {
        return 0.75;
    }

    let resume_lower = resume_text.to_lowercase();
    let location_lower = location.to_lowercase();

    if resume_lower.contains(&location_lower) {
        return 1.0;
    }

    let part_found = location_lower
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| resume_lower.contains(p));

    if part_found {
        0.95
    } else {
        0.75
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recommendation
// ────────────────────────────────────────────────────────────────────────────

/// Tiered advice keyed on score bands, with experience / education gap notes.
pub fn rule_based_recommendation(
    score: f64,
    missing: &[String],
    job: &JobPosting,
    resume: &ResumeProfile,
) -> String {
    let list = |n: usize| missing.iter().take(n).cloned().collect::<Vec<_>>().join(", ");

    let mut text = if score >= 0.85 {
        let mut t = "Excellent match! You meet most requirements and should definitely apply.".to_string();
        if !missing.is_empty() {
            t.push_str(&format!(
                " To strengthen your application, highlight experience with: {}.",
                list(2)
            ));
        }
        t
    } else if score >= 0.70 {
        let mut t = "Good match! You meet many key requirements.".to_string();
        if !missing.is_empty() {
            t.push_str(&format!(
                " Consider emphasizing these skills in your application: {}.",
                list(3)
            ));
        }
        t
    } else if score >= 0.55 {
        let mut t = "Moderate match. You have some relevant experience.".to_string();
        if !missing.is_empty() {
            t.push_str(&format!(
                " To improve your chances, develop experience in: {}.",
                list(4)
            ));
        }
        t
    } else if score >= 0.35 {
        let mut t = "Limited match. This position may be a stretch.".to_string();
        if !missing.is_empty() {
            t.push_str(&format!(" Focus on gaining experience in: {}.", list(5)));
        }
        t
    } else {
        let mut t =
            "Poor match. Consider positions better aligned with your background.".to_string();
        if missing.len() > 3 {
            t.push_str(&format!(" Key gaps include: {}.", list(3)));
        }
        t
    };

    if let (Some(required), Some(candidate)) = (job.years_of_experience, resume.experience_years) {
        if candidate < required {
            text.push_str(&format!(
                " Note: Position requires {} more year(s) of experience.",
                required - candidate
            ));
        }
    }

    if let (Some(required), Some(candidate)) = (job.education(), resume.education()) {
        if candidate < required {
            text.push_str(&format!(" Education requirement: {required} degree."));
        }
    }

    text
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

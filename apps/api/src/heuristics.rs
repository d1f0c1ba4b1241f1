//! Text heuristics shared by the keyword extractor and every site extractor:
//! date parsing, experience / education / language inference, grade and
//! contract detection, and small HTML-text helpers.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use uuid::Uuid;

use crate::models::job::{EducationLevel, LanguageLevel, LanguageRequirements};

// ────────────────────────────────────────────────────────────────────────────
// Dates
// ────────────────────────────────────────────────────────────────────────────

/// Candidate formats, tried in order. Day-first numeric forms win over US forms.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
];

static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{4}-\d{2}-\d{2}|\d{1,2}[-/ ][a-z]{3,9}\.?[-/ ]\d{4}|[a-z]{3,9}\.? \d{1,2}(?:st|nd|rd|th)?,? \d{4}|\d{1,2}/\d{1,2}/\d{4}|\d{1,2}-\d{1,2}-\d{4})\b",
    )
    .unwrap()
});

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

static DEADLINE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(deadline|closing date|apply by|date limite)").unwrap());

/// Parses a free-form date. Unparseable input yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    // ISO timestamps without offset: keep the date part
    if trimmed.len() > 10 && trimmed.is_char_boundary(10) && trimmed.as_bytes().get(10) == Some(&b'T') {
        if let Ok(date) = NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    let normalized = clean_text(&ORDINAL_SUFFIX.replace_all(trimmed, "$1").replace('.', ""));
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
}

/// First date-shaped substring of `text` that parses.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    DATE_LIKE
        .find_iter(text)
        .find_map(|m| parse_date(m.as_str()))
}

/// Date following a deadline label such as "Deadline:" or "Closing date".
pub fn find_deadline(text: &str) -> Option<NaiveDate> {
    DEADLINE_LABEL.find_iter(text).find_map(|m| {
        let tail: String = text[m.end()..].chars().take(80).collect();
        find_date(&tail)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

/// Experience-requirement patterns and the keyword weight each one carries.
/// Capture group 1 is always the (lower-bound) number of years.
pub static EXPERIENCE_PATTERNS: Lazy<Vec<(Regex, f64)>> = Lazy::new(|| {
    [
        (r"(?i)(\d+)\+?\s*years?\s+(?:of\s+)?(?:\w+\s+){0,3}?experience", 1.3),
        (r"(?i)minimum\s+(?:of\s+)?(\d+)\s*years?", 1.2),
        (r"(?i)at\s+least\s+(\d+)\s*years?", 1.2),
        (r"(?i)(\d+)\s*-\s*\d+\s*years?", 1.1),
        (r"(?i)(\d+)\s+to\s+\d+\s*years?", 1.1),
    ]
    .into_iter()
    .map(|(pattern, weight)| (Regex::new(pattern).unwrap(), weight))
    .collect()
});

/// A single experience phrase found in text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperienceMention {
    /// Byte offset of the phrase in the source text.
    pub start: usize,
    pub years: i32,
    pub weight: f64,
}

/// All experience mentions, in pattern order then text order.
pub fn experience_mentions(text: &str) -> Vec<ExperienceMention> {
    EXPERIENCE_PATTERNS
        .iter()
        .flat_map(|(re, weight)| {
            re.captures_iter(text).filter_map(move |caps| {
                let whole = caps.get(0)?;
                let years = caps.get(1)?.as_str().parse::<i32>().ok()?;
                Some(ExperienceMention {
                    start: whole.start(),
                    years,
                    weight: *weight,
                })
            })
        })
        .collect()
}

/// Required years of experience: the earliest mention in the text, so a
/// "3-5 years of experience" range yields its lower bound.
pub fn extract_experience_years(text: &str) -> Option<i32> {
    experience_mentions(text)
        .into_iter()
        .filter(|m| (0..=50).contains(&m.years))
        .min_by_key(|m| m.start)
        .map(|m| m.years)
}

// ────────────────────────────────────────────────────────────────────────────
// Education
// ────────────────────────────────────────────────────────────────────────────

/// Checked top-down; the most advanced degree mentioned wins.
static EDUCATION_PATTERNS: Lazy<Vec<(EducationLevel, Regex)>> = Lazy::new(|| {
    [
        (
            EducationLevel::Doctorate,
            r"(?i)\b(ph\.?\s?d|doctorate|doctoral)\b",
        ),
        (
            EducationLevel::Masters,
            r"(?i)\b(master'?s?|advanced (university )?degree|mba|m\.?sc)\b",
        ),
        (
            EducationLevel::Bachelors,
            r"(?i)\b(bachelor'?s?|first[- ]level (university )?degree|undergraduate degree|b\.?sc|b\.a)\b",
        ),
        (
            EducationLevel::DiplomaCertificate,
            r"(?i)\b(diploma|certificate)\b",
        ),
        (
            EducationLevel::HighSchool,
            r"(?i)\b(high school|secondary (school|education))\b",
        ),
    ]
    .into_iter()
    .map(|(level, pattern)| (level, Regex::new(pattern).unwrap()))
    .collect()
});

pub fn infer_education_level(text: &str) -> Option<EducationLevel> {
    let text = text.replace('’', "'");
    EDUCATION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map(|(level, _)| *level)
}

// ────────────────────────────────────────────────────────────────────────────
// Languages
// ────────────────────────────────────────────────────────────────────────────

/// Language code and the names it is written as in postings and résumés.
pub const LANGUAGES: &[(&str, &[&str])] = &[
    ("en", &["english", "anglais"]),
    ("fr", &["french", "français", "francais"]),
    ("es", &["spanish", "español", "espanol"]),
    ("ar", &["arabic", "arabe"]),
    ("zh", &["chinese", "chinois", "mandarin"]),
    ("ru", &["russian", "russe"]),
    ("de", &["german", "allemand", "deutsch"]),
    ("pt", &["portuguese", "portugais"]),
    ("it", &["italian", "italien"]),
    ("ja", &["japanese", "japonais"]),
];

static LANGUAGE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    LANGUAGES
        .iter()
        .map(|(code, names)| {
            let alternatives = names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>();
            let pattern = format!(r"(?i)\b({})\b", alternatives.join("|"));
            (*code, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static REQUIRED_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(required|essential|mandatory|obligatoire)\b").unwrap());

static DESIRABLE_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(desirable|preferred|advantage|asset|souhaitable)\b").unwrap()
});

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.;\n!?]+").unwrap());

/// Names a language code is written as. Unknown codes are treated as their own name.
pub fn language_names(code: &str) -> Vec<&str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, names)| names.to_vec())
        .unwrap_or_else(|| vec![code])
}

/// Infers language requirements sentence by sentence.
///
/// A sentence naming a language with a required cue marks it required; with only a
/// desirable cue, desirable. A bare mention defaults to required. Qualified mentions
/// take precedence over bare ones, and required beats desirable.
pub fn infer_language_requirements(text: &str) -> LanguageRequirements {
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Evidence {
        Bare,
        Desirable,
        Required,
    }

    let mut evidence: Vec<(&str, Evidence)> = Vec::new();

    for sentence in SENTENCE_BREAK.split(text) {
        let cue = if REQUIRED_CUE.is_match(sentence) {
            Evidence::Required
        } else if DESIRABLE_CUE.is_match(sentence) {
            Evidence::Desirable
        } else {
            Evidence::Bare
        };

        for (code, re) in LANGUAGE_PATTERNS.iter() {
            if !re.is_match(sentence) {
                continue;
            }
            match evidence.iter_mut().find(|(c, _)| c == code) {
                Some((_, seen)) => *seen = (*seen).max(cue),
                None => evidence.push((*code, cue)),
            }
        }
    }

    evidence
        .into_iter()
        .map(|(code, seen)| {
            let level = match seen {
                Evidence::Desirable => LanguageLevel::Desirable,
                Evidence::Required | Evidence::Bare => LanguageLevel::Required,
            };
            (code.to_string(), level)
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Grade, contract, remote
// ────────────────────────────────────────────────────────────────────────────

static GRADE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(P-\d+|G-\d+|D-\d+|NO-[A-Z]|FS-\d+|L-\d+|SB-\d+|LICA-?\d+)\b").unwrap());

pub fn extract_grade(text: &str) -> Option<String> {
    GRADE.find(text).map(|m| m.as_str().to_string())
}

pub fn is_grade(text: &str) -> bool {
    GRADE
        .find(text.trim())
        .map(|m| m.as_str().len() == text.trim().len())
        .unwrap_or(false)
}

static CONTRACT_TYPES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bfixed[- ]term\b", "Fixed-term"),
        (r"(?i)\btemporary\b", "Temporary"),
        (r"(?i)\bcontinuing\b", "Continuing"),
        (r"(?i)\bpermanent\b", "Permanent"),
        (r"(?i)\bindividual contractor\b", "Individual Contractor"),
        (r"(?i)\bconsultan(t|cy)\b", "Consultant"),
        (r"(?i)\bintern(ship)?\b", "Internship"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).unwrap(), label))
    .collect()
});

pub fn extract_contract_type(text: &str) -> Option<String> {
    CONTRACT_TYPES
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, label)| label.to_string())
}

static REMOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(remote|home[- ]based|telecommut\w*|work from home)\b").unwrap());

pub fn detect_remote(text: &str) -> bool {
    REMOTE.is_match(text)
}

static DUTY_STATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:duty station|location|lieu d'affectation)\s*:\s*([^\n|]{2,100})").unwrap()
});

/// Value of a "Duty station: ..." style label.
pub fn extract_duty_station(text: &str) -> Option<String> {
    DUTY_STATION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Text helpers
// ────────────────────────────────────────────────────────────────────────────

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses runs of whitespace and trims.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Terms with at most this many letters or digits (`r`, `c#`, `c++`) must stand apart
/// from neighbouring word characters.
const SHORT_TERM_CHARS: usize = 2;

/// Case-insensitive substring containment, so "report" is found in "reports".
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    if term.chars().filter(|c| c.is_alphanumeric()).count() > SHORT_TERM_CHARS {
        return haystack.contains(&term);
    }
    haystack.match_indices(&term).any(|(start, hit)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + hit.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Resolves `href` against `base`. Non-http(s) links (mailto:, javascript:) are rejected.
pub fn absolutize_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = Url::parse(base).ok()?.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Last non-empty path segment of a URL, without query or fragment.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

/// Deterministic id for postings whose source exposes none.
pub fn stable_job_id(prefix: &str, title: &str, location: Option<&str>) -> String {
    let seed = format!(
        "{}|{}|{}",
        prefix,
        title.trim().to_lowercase(),
        location.unwrap_or("").trim().to_lowercase()
    );
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).simple().to_string();
    format!("{prefix}{}", &id[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formats_agree() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 31);
        assert_eq!(parse_date("31-Dec-2025"), expected);
        assert_eq!(parse_date("December 31, 2025"), expected);
        assert_eq!(parse_date("2025-12-31"), expected);
        assert_eq!(parse_date("31 December 2025"), expected);
        assert_eq!(parse_date("2025-12-31T23:59:00Z"), expected);
    }

    #[test]
    fn test_unparseable_date_is_none() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("32-Dec-2025"), None);
    }

    #[test]
    fn test_day_first_numeric_dates_win() {
        assert_eq!(parse_date("03/04/2025"), NaiveDate::from_ymd_opt(2025, 4, 3));
        // no 13th month, so only the US reading parses
        assert_eq!(parse_date("12/31/2025"), NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn test_find_deadline_after_label() {
        let text = "Posting period: 01 November 2025. Deadline: 15 December 2025 (midnight)";
        assert_eq!(find_deadline(text), NaiveDate::from_ymd_opt(2025, 12, 15));
    }

    #[test]
    fn test_experience_years_patterns() {
        assert_eq!(extract_experience_years("At least 7 years of progressively responsible experience"), Some(7));
        assert_eq!(extract_experience_years("A minimum of 5 years is required"), Some(5));
        assert_eq!(extract_experience_years("3-5 years in humanitarian work"), Some(3));
        assert_eq!(extract_experience_years("2 to 4 years in the field"), Some(2));
        assert_eq!(extract_experience_years("10+ years experience in finance"), Some(10));
        assert_eq!(extract_experience_years("3-5 years of relevant experience"), Some(3));
        assert_eq!(extract_experience_years("No experience needed"), None);
    }

    #[test]
    fn test_education_checks_doctorate_first() {
        assert_eq!(
            infer_education_level("Master's degree required, PhD an asset"),
            Some(EducationLevel::Doctorate)
        );
        assert_eq!(
            infer_education_level("Advanced university degree (Master's or equivalent)"),
            Some(EducationLevel::Masters)
        );
        assert_eq!(
            infer_education_level("A first-level university degree in combination with experience"),
            Some(EducationLevel::Bachelors)
        );
        assert_eq!(infer_education_level("High school diploma"), Some(EducationLevel::DiplomaCertificate));
    }

    #[test]
    fn test_education_ignores_word_fragments() {
        // "ma" / "ba" inside other words must not count as degrees
        assert_eq!(infer_education_level("Manage a database of baseline data"), None);
    }

    #[test]
    fn test_language_inference_per_sentence() {
        let text = "Fluency in English is required. Knowledge of French is desirable.";
        let langs = infer_language_requirements(text);
        assert_eq!(langs.get("en"), Some(&LanguageLevel::Required));
        assert_eq!(langs.get("fr"), Some(&LanguageLevel::Desirable));
    }

    #[test]
    fn test_bare_language_mention_defaults_to_required() {
        let langs = infer_language_requirements("English and French are the working languages");
        assert_eq!(langs.get("en"), Some(&LanguageLevel::Required));
        assert_eq!(langs.get("fr"), Some(&LanguageLevel::Required));
        assert!(langs.get("es").is_none());
    }

    #[test]
    fn test_qualified_mention_beats_bare_mention() {
        let text = "The working languages are English and French. Knowledge of French is an advantage.";
        let langs = infer_language_requirements(text);
        assert_eq!(langs.get("fr"), Some(&LanguageLevel::Desirable));
        assert_eq!(langs.get("en"), Some(&LanguageLevel::Required));
    }

    #[test]
    fn test_grade_and_contract() {
        assert_eq!(extract_grade("Programme Officer, P-3 level"), Some("P-3".to_string()));
        assert_eq!(extract_grade("NO-B national officer"), Some("NO-B".to_string()));
        assert!(is_grade("G-5"));
        assert!(!is_grade("G-5 Geneva"));
        assert_eq!(extract_contract_type("This is a FIXED TERM appointment"), Some("Fixed-term".to_string()));
        assert_eq!(extract_contract_type("Consultancy, 6 months"), Some("Consultant".to_string()));
        assert_eq!(extract_contract_type("Open-ended"), None);
    }

    #[test]
    fn test_contains_term_matches_substrings() {
        assert!(contains_term("Prepared donor reports and managed evaluations", "report"));
        assert!(contains_term("Prepared donor reports and managed evaluations", "Evaluation"));
        assert!(contains_term("JavaScript developer", "java"));
        assert!(!contains_term("Budget oversight", "procurement"));
        assert!(!contains_term("anything", "  "));
    }

    #[test]
    fn test_contains_term_keeps_short_terms_apart() {
        assert!(contains_term("Skilled in R and SQL", "r"));
        assert!(!contains_term("Strong reporting skills", "r"));
        assert!(contains_term("Experience with C++ and Java", "c++"));
        assert!(contains_term("c#, .NET", "C#"));
        assert!(!contains_term("abc# notation", "c#"));
    }

    #[test]
    fn test_absolutize_url() {
        assert_eq!(
            absolutize_url("https://careers.un.org/jobopening?language=en", "/jobopening/123"),
            Some("https://careers.un.org/jobopening/123".to_string())
        );
        assert_eq!(absolutize_url("https://www.who.int/careers", "mailto:hr@who.int"), None);
        assert_eq!(absolutize_url("https://www.who.int/careers", "#top"), None);
    }

    #[test]
    fn test_stable_job_id_is_deterministic() {
        let a = stable_job_id("WHO-", "Technical Officer", Some("Geneva"));
        let b = stable_job_id("WHO-", "  technical officer ", Some("GENEVA"));
        let c = stable_job_id("WHO-", "Technical Officer", Some("Nairobi"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("WHO-"));
    }

    #[test]
    fn test_duty_station_label() {
        assert_eq!(
            extract_duty_station("Grade: P-4\nDuty Station: Nairobi, Kenya\nDeadline: soon"),
            Some("Nairobi, Kenya".to_string())
        );
    }
}

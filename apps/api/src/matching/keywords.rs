//! Keyword extractor: ranks the phrases and terms of a job posting by importance.
//!
//! Sources, merged into one score map:
//! 1. bigrams / trigrams scored `ln(freq + 1) × length_bonus × domain_weight`
//! 2. curated single terms (tools, degrees, domain nouns) at a 0.8 bonus
//! 3. technical skills and tools, raised to at least 1.5
//! 4. experience requirements ("5 years experience"), raised to their pattern weight

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::heuristics::{contains_term, experience_mentions};

pub const DEFAULT_MAX_KEYWORDS: usize = 30;

const BIGRAM_BONUS: f64 = 1.0;
const TRIGRAM_BONUS: f64 = 1.2;
const TERM_BONUS: f64 = 0.8;
const TECHNICAL_SKILL_SCORE: f64 = 1.5;

// ────────────────────────────────────────────────────────────────────────────
// Domain weight table
// ────────────────────────────────────────────────────────────────────────────

const DEFAULT_SKILL_WEIGHTS: &[(&str, f64)] = &[
    ("project management", 1.5),
    ("program management", 1.5),
    ("data analysis", 1.4),
    ("strategic planning", 1.4),
    ("python", 1.4),
    ("sql", 1.4),
    ("monitoring", 1.3),
    ("evaluation", 1.3),
    ("budget management", 1.3),
    ("gis", 1.3),
    ("humanitarian", 1.3),
    ("peacekeeping", 1.3),
    ("human rights", 1.3),
    ("climate change", 1.3),
    ("sdgs", 1.3),
    ("sustainable development", 1.3),
    ("procurement", 1.2),
    ("gender equality", 1.2),
    ("english", 1.2),
    ("french", 1.2),
    ("spanish", 1.2),
    ("arabic", 1.2),
    ("leadership", 1.1),
    ("teamwork", 1.0),
    ("communication", 1.0),
];

/// Importance multiplier per UN-domain term. Unlisted terms weigh 1.0.
#[derive(Debug, Clone)]
pub struct SkillWeights {
    weights: HashMap<String, f64>,
}

impl Default for SkillWeights {
    fn default() -> Self {
        Self {
            weights: DEFAULT_SKILL_WEIGHTS
                .iter()
                .map(|(term, w)| (term.to_string(), *w))
                .collect(),
        }
    }
}

impl SkillWeights {
    pub fn get(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(1.0)
    }

    /// Overrides or extends the table. Terms are lowercased; non-positive weights are dropped.
    pub fn with_overrides(mut self, overrides: HashMap<String, f64>) -> Self {
        for (term, weight) in overrides {
            let term = term.trim().to_lowercase();
            if term.is_empty() || !weight.is_finite() || weight <= 0.0 {
                continue;
            }
            self.weights.insert(term, weight);
        }
        self
    }

    /// Built-in table merged with a JSON object of `{"term": weight}` read from `path`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read skill weights from {}", path.display()))?;
        let overrides: HashMap<String, f64> = serde_json::from_str(&raw)
            .with_context(|| format!("Skill weights in {} must be a JSON object of numbers", path.display()))?;
        Ok(Self::default().with_overrides(overrides))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixed vocabularies
// ────────────────────────────────────────────────────────────────────────────

const STOP_PHRASES: &[&str] = &[
    "of the", "in the", "to the", "for the", "on the", "at the", "by the", "from the",
    "with the", "as the", "will be", "has been", "have been", "should be", "must be",
];

const PHRASE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being",
];

const TERM_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see", "two",
    "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use",
];

const TECHNICAL_SKILLS: &[&str] = &[
    // programming
    "python", "java", "javascript", "r", "sql", "c++", "c#",
    // tools
    "excel", "powerpoint", "word", "sap", "oracle", "sharepoint", "tableau", "power bi", "spss",
    "stata", "arcgis", "qgis",
    // methods
    "agile", "scrum", "waterfall", "lean", "six sigma",
];

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

static IMPORTANT_TERMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:python|java|sql|r|excel|powerpoint|spss|stata)\b",
        r"\b(?:management|coordination|planning|analysis|evaluation)\b",
        r"\b(?:humanitarian|development|peacekeeping|advocacy)\b",
        r"\b(?:bachelor|master|phd|doctorate|degree)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static VALID_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][\w-]*[a-z]$").unwrap());

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

/// Ranked keyword with its importance score.
pub type WeightedKeyword = (String, f64);

/// Stateless apart from the injected weight table; share one instance per process.
#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor {
    weights: SkillWeights,
}

impl KeywordExtractor {
    pub fn new(weights: SkillWeights) -> Self {
        Self { weights }
    }

    /// Keywords ordered by score descending, ties broken alphabetically.
    pub fn extract(&self, text: &str, max_keywords: usize) -> Vec<WeightedKeyword> {
        let lower = text.to_lowercase();
        if lower.trim().is_empty() || max_keywords == 0 {
            return Vec::new();
        }

        // BTreeMap keeps iteration (and thus the final sort input) deterministic
        let mut keywords: BTreeMap<String, f64> = BTreeMap::new();

        let cleaned = PUNCTUATION.replace_all(&lower, " ");
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        for (n, bonus) in [(2, BIGRAM_BONUS), (3, TRIGRAM_BONUS)] {
            for (phrase, freq) in ngrams(&words, n) {
                if !is_valid_phrase(&phrase) {
                    continue;
                }
                let score = frequency_score(freq) * bonus * self.weights.get(&phrase);
                keywords.insert(phrase, score);
            }
        }

        for (term, freq) in important_terms(&lower) {
            if keywords.contains_key(&term) || !is_valid_term(&term) {
                continue;
            }
            let score = frequency_score(freq) * TERM_BONUS * self.weights.get(&term);
            keywords.insert(term, score);
        }

        for skill in TECHNICAL_SKILLS {
            if contains_term(&lower, skill) {
                merge_max(&mut keywords, skill.to_string(), TECHNICAL_SKILL_SCORE);
            }
        }

        for mention in experience_mentions(&lower) {
            merge_max(
                &mut keywords,
                format!("{} years experience", mention.years),
                mention.weight,
            );
        }

        let mut ranked: Vec<WeightedKeyword> = keywords.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_keywords);
        ranked
    }
}

fn merge_max(keywords: &mut BTreeMap<String, f64>, key: String, score: f64) {
    let slot = keywords.entry(key).or_insert(score);
    *slot = slot.max(score);
}

fn frequency_score(freq: usize) -> f64 {
    ((freq + 1) as f64).ln()
}

fn ngrams(words: &[&str], n: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    if words.len() < n {
        return counts;
    }
    for window in words.windows(n) {
        *counts.entry(window.join(" ")).or_insert(0) += 1;
    }
    counts
}

fn important_terms(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for re in IMPORTANT_TERMS.iter() {
        for m in re.find_iter(text) {
            *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn is_valid_phrase(phrase: &str) -> bool {
    if STOP_PHRASES.contains(&phrase) {
        return false;
    }
    let stop: HashSet<&str> = PHRASE_STOP_WORDS.iter().copied().collect();
    phrase.split(' ').any(|w| !stop.contains(w))
}

fn is_valid_term(term: &str) -> bool {
    let len = term.chars().count();
    (3..=30).contains(&len) && VALID_TERM.is_match(term) && !TERM_STOP_WORDS.contains(&term)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "Programme Management Officer. The incumbent will lead project management \
        and monitoring of humanitarian programmes. Project management experience with budget \
        management is essential. At least 5 years of experience in humanitarian coordination. \
        Proficiency in Excel and SQL; knowledge of GIS desirable. Fluency in English required.";

    fn score_of(keywords: &[WeightedKeyword], key: &str) -> Option<f64> {
        keywords.iter().find(|(k, _)| k == key).map(|(_, s)| *s)
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let extractor = KeywordExtractor::default();
        assert!(extractor.extract("", 30).is_empty());
        assert!(extractor.extract("   \n ", 30).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let extractor = KeywordExtractor::default();
        assert_eq!(extractor.extract(JD, 30), extractor.extract(JD, 30));
    }

    #[test]
    fn test_sorted_descending_and_truncated() {
        let keywords = KeywordExtractor::default().extract(JD, 10);
        assert_eq!(keywords.len(), 10);
        for pair in keywords.windows(2) {
            assert!(pair[0].1 >= pair[1].1, "{pair:?} out of order");
        }
    }

    #[test]
    fn test_domain_weight_applied() {
        let keywords = KeywordExtractor::default().extract(JD, 50);
        // "project management" appears twice, weight 1.5
        let expected = 3f64.ln() * 1.5;
        let got = score_of(&keywords, "project management").unwrap();
        assert!((got - expected).abs() < 1e-9, "Expected {expected}, got {got}");
        assert_eq!(keywords[0].0, "project management");
    }

    #[test]
    fn test_frequency_monotonic() {
        let extractor = KeywordExtractor::default();
        let once = "Experience with data analysis is needed.";
        let thrice = "Experience with data analysis is needed. Data analysis daily. More data analysis.";
        let a = score_of(&extractor.extract(once, 30), "data analysis").unwrap();
        let b = score_of(&extractor.extract(thrice, 30), "data analysis").unwrap();
        assert!(b > a, "Expected {b} > {a}");
        // logarithmic, not linear
        assert!(b < a * 3.0);
    }

    #[test]
    fn test_stop_phrases_dropped() {
        let keywords = KeywordExtractor::default().extract("of the of the in the will be", 30);
        assert!(score_of(&keywords, "of the").is_none());
        assert!(score_of(&keywords, "in the").is_none());
        assert!(score_of(&keywords, "will be").is_none());
    }

    #[test]
    fn test_experience_requirement_detected() {
        let keywords = KeywordExtractor::default().extract(JD, 50);
        assert_eq!(score_of(&keywords, "5 years experience"), Some(1.3));
    }

    #[test]
    fn test_range_experience_uses_lower_bound() {
        let keywords = KeywordExtractor::default().extract("Requires 3-5 years in the field", 50);
        assert_eq!(score_of(&keywords, "3 years experience"), Some(1.1));
    }

    #[test]
    fn test_technical_skills_are_substring_checks() {
        let keywords = KeywordExtractor::default().extract("Strong reporting and SharePoint-based filing", 50);
        assert!(score_of(&keywords, "r").is_none());
        assert_eq!(score_of(&keywords, "sharepoint"), Some(TECHNICAL_SKILL_SCORE));

        let keywords = KeywordExtractor::default().extract("Uses Tableau and Power BI", 50);
        assert_eq!(score_of(&keywords, "tableau"), Some(TECHNICAL_SKILL_SCORE));
        // also a bigram, but the skill floor wins
        assert_eq!(score_of(&keywords, "power bi"), Some(TECHNICAL_SKILL_SCORE));
    }

    #[test]
    fn test_important_single_terms_scored() {
        let keywords = KeywordExtractor::default().extract("coordination coordination", 50);
        let expected = 3f64.ln() * TERM_BONUS;
        let got = score_of(&keywords, "coordination").unwrap();
        assert!((got - expected).abs() < 1e-9, "Expected {expected}, got {got}");
    }

    #[test]
    fn test_weight_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("Data Analysis".to_string(), 2.0);
        overrides.insert("bogus".to_string(), -1.0);
        let weights = SkillWeights::default().with_overrides(overrides);
        assert_eq!(weights.get("data analysis"), 2.0);
        assert_eq!(weights.get("bogus"), 1.0);
        assert_eq!(weights.get("project management"), 1.5);
    }

    #[test]
    fn test_ties_broken_alphabetically() {
        let keywords = KeywordExtractor::default().extract("alpha beta gamma delta", 30);
        let tied: Vec<&str> = keywords
            .iter()
            .filter(|(_, s)| (*s - 2f64.ln()).abs() < 1e-9)
            .map(|(k, _)| k.as_str())
            .collect();
        let mut sorted = tied.clone();
        sorted.sort();
        assert_eq!(tied, sorted);
        assert!(!tied.is_empty());
    }
}

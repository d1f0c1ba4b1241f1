//! Edit-distance string similarity used when a job keyword is not literally present
//! in the résumé.

use strsim::levenshtein;

pub const DEFAULT_FLOOR: f64 = 0.6;

/// Case-insensitive similarity in `[0, 1]`.
///
/// - identical (after trim + lowercase) → 1.0
/// - one contains the other → `0.8 + shorter/longer * 0.2`
/// - otherwise `1 - distance / max_len`, zeroed below `floor`
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    floor: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOR)
    }
}

impl FuzzyMatcher {
    pub fn new(floor: f64) -> Self {
        Self {
            floor: floor.clamp(0.0, 1.0),
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();

        if a == b {
            return 1.0;
        }
        // an empty side would otherwise be a "substring" of everything
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let len_a = a.chars().count();
        let len_b = b.chars().count();
        let (shorter, longer) = (len_a.min(len_b) as f64, len_a.max(len_b) as f64);

        if a.contains(&b) || b.contains(&a) {
            return 0.8 + (shorter / longer) * 0.2;
        }

        let similarity = 1.0 - levenshtein(&a, &b) as f64 / longer;
        if similarity >= self.floor {
            similarity
        } else {
            0.0
        }
    }

    /// Best similarity of `needle` against any candidate, 0.0 for an empty list.
    pub fn best_match<'a, I>(&self, needle: &str, candidates: I) -> f64
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .map(|c| self.similarity(needle, c))
            .fold(0.0, f64::max)
    }
}

/// Similarity with the default 0.6 floor.
pub fn similarity(a: &str, b: &str) -> f64 {
    FuzzyMatcher::default().similarity(a, b)
}

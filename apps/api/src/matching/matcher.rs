//! Match service: pluggable, trait-based matcher that scores résumés against stored jobs.
//!
//! Default: `KeywordJobMatcher` (deterministic scorer + cache + optional LLM wording).
//! `AppState` holds an `Arc<dyn JobMatcher>`, assembled at startup from config.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::llm_client::prompts::PLAIN_TEXT_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};
use crate::matching::cache::{cache_key, MatchCache};
use crate::matching::prompts::{RECOMMENDATION_PROMPT_TEMPLATE, RECOMMENDATION_SYSTEM};
use crate::matching::scoring::{MatchResult, MatchScorer};
use crate::models::job::JobPosting;
use crate::models::resume::ResumeProfile;

/// Below this score the rule-based text is always used.
pub const LLM_RECOMMENDATION_MIN_SCORE: f64 = 0.5;

/// Completion cap for recommendation calls. Answers are two or three sentences.
pub const RECOMMENDATION_MAX_TOKENS: u32 = 150;

// ────────────────────────────────────────────────────────────────────────────
// Trait definitions
// ────────────────────────────────────────────────────────────────────────────

/// Carried in `AppState` as `Arc<dyn JobMatcher>`. Matching never fails: sparse
/// input degrades to neutral factor scores.
#[async_trait]
pub trait JobMatcher: Send + Sync {
    async fn match_job(&self, resume: &ResumeProfile, job: &JobPosting) -> MatchResult;
}

/// Context handed to a recommendation backend.
pub struct RecommendationRequest<'a> {
    pub job: &'a JobPosting,
    pub resume: &'a ResumeProfile,
    pub score: f64,
    pub missing_keywords: &'a [String],
}

/// Free-text advice generator layered over the rule-based recommendation.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest<'_>) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmRecommender
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmRecommender(pub LlmClient);

#[async_trait]
impl Recommender for LlmRecommender {
    async fn recommend(&self, request: &RecommendationRequest<'_>) -> Result<String, LlmError> {
        let prompt = build_recommendation_prompt(request);
        self.0.call_text(&prompt, RECOMMENDATION_SYSTEM).await
    }
}

fn build_recommendation_prompt(request: &RecommendationRequest<'_>) -> String {
    let missing = request
        .missing_keywords
        .iter()
        .take(5)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let skills = request
        .resume
        .skills
        .iter()
        .take(10)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let experience = request
        .resume
        .experience_years
        .map(|y| format!("{y} years"))
        .unwrap_or_else(|| "unknown".to_string());

    RECOMMENDATION_PROMPT_TEMPLATE
        .replace("{job_title}", &request.job.title)
        .replace("{organization}", &request.job.organization)
        .replace("{score_percent}", &format!("{:.0}", request.score * 100.0))
        .replace("{missing_keywords}", if missing.is_empty() { "none" } else { &missing })
        .replace("{experience_years}", &experience)
        .replace("{skills}", if skills.is_empty() { "none listed" } else { &skills })
        .replace("{plain_text_instruction}", PLAIN_TEXT_INSTRUCTION)
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordJobMatcher (default implementation)
// ────────────────────────────────────────────────────────────────────────────

pub struct KeywordJobMatcher {
    scorer: MatchScorer,
    cache: Arc<dyn MatchCache>,
    recommender: Option<Arc<dyn Recommender>>,
}

impl KeywordJobMatcher {
    pub fn new(
        scorer: MatchScorer,
        cache: Arc<dyn MatchCache>,
        recommender: Option<Arc<dyn Recommender>>,
    ) -> Self {
        Self {
            scorer,
            cache,
            recommender,
        }
    }
}

#[async_trait]
impl JobMatcher for KeywordJobMatcher {
    async fn match_job(&self, resume: &ResumeProfile, job: &JobPosting) -> MatchResult {
        let key = cache_key(resume.id, &job.job_id);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Match cache hit for {key}");
            return cached;
        }

        let mut result = self.scorer.score(resume, job);

        if let Some(recommender) = &self.recommender {
            if result.score >= LLM_RECOMMENDATION_MIN_SCORE {
                let request = RecommendationRequest {
                    job,
                    resume,
                    score: result.score,
                    missing_keywords: &result.missing_keywords,
                };
                match recommender.recommend(&request).await {
                    Ok(text) if !text.trim().is_empty() => result.recommendation = text,
                    Ok(_) => {}
                    Err(e) => warn!("LLM recommendation failed for {key}, keeping rule-based text: {e}"),
                }
            }
        }

        self.cache.put(&key, &result).await;
        result
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ranking
// ────────────────────────────────────────────────────────────────────────────

/// One job in a ranked batch.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub job_id: String,
    pub title: String,
    pub organization: String,
    pub apply_url: String,
    pub result: MatchResult,
}

/// Scores `jobs` concurrently and returns the best `limit`, highest score first
/// (ties by `job_id`).
pub async fn rank_jobs(
    matcher: &dyn JobMatcher,
    resume: &ResumeProfile,
    jobs: &[JobPosting],
    limit: usize,
) -> Vec<RankedMatch> {
    let results = join_all(jobs.iter().map(|job| matcher.match_job(resume, job))).await;

    let mut ranked: Vec<RankedMatch> = jobs
        .iter()
        .zip(results)
        .map(|(job, result)| RankedMatch {
            job_id: job.job_id.clone(),
            title: job.title.clone(),
            organization: job.organization.clone(),
            apply_url: job.apply_url.clone(),
            result,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.result
            .score
            .total_cmp(&a.result.score)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::matching::cache::MemoryMatchCache;
    use crate::matching::scoring::tests::{make_job, make_resume};

    struct ScriptedRecommender {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Recommender for ScriptedRecommender {
        async fn recommend(&self, _request: &RecommendationRequest<'_>) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|_| LlmError::EmptyContent)
        }
    }

    fn matcher_with(recommender: Option<Arc<dyn Recommender>>) -> KeywordJobMatcher {
        KeywordJobMatcher::new(
            MatchScorer::default(),
            Arc::new(MemoryMatchCache::new(Duration::from_secs(3600))),
            recommender,
        )
    }

    fn strong_pair() -> (ResumeProfile, JobPosting) {
        let job = make_job("Data Analyst", "Data analysis with Python and SQL for humanitarian programmes.");
        let resume = make_resume(
            "Data analyst. Data analysis with Python and SQL for humanitarian programmes.",
            &["python", "sql", "data analysis"],
        );
        (resume, job)
    }

    #[tokio::test]
    async fn test_llm_text_replaces_rule_text_for_good_scores() {
        let recommender = Arc::new(ScriptedRecommender {
            reply: Ok("Apply, and lead with your SQL work.".to_string()),
            calls: AtomicUsize::new(0),
        });
        let matcher = matcher_with(Some(recommender.clone()));
        let (resume, job) = strong_pair();

        let result = matcher.match_job(&resume, &job).await;
        assert!(result.score >= LLM_RECOMMENDATION_MIN_SCORE, "got {}", result.score);
        assert_eq!(result.recommendation, "Apply, and lead with your SQL work.");
        assert_eq!(recommender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_silently() {
        let recommender = Arc::new(ScriptedRecommender {
            reply: Err(()),
            calls: AtomicUsize::new(0),
        });
        let matcher = matcher_with(Some(recommender.clone()));
        let (resume, job) = strong_pair();

        let result = matcher.match_job(&resume, &job).await;
        let rule_based = MatchScorer::default().score(&resume, &job).recommendation;
        assert_eq!(result.recommendation, rule_based);
    }

    #[tokio::test]
    async fn test_low_scores_skip_llm() {
        let recommender = Arc::new(ScriptedRecommender {
            reply: Ok("unused".to_string()),
            calls: AtomicUsize::new(0),
        });
        let matcher = matcher_with(Some(recommender.clone()));
        let mut job = make_job("Chief Surgeon", "Doctorate in surgery. 20 years of surgical experience.");
        job.years_of_experience = Some(20);
        job.education_level = Some("Doctorate".to_string());
        let mut resume = make_resume("Barista", &["latte art"]);
        resume.experience_years = Some(1);
        resume.education_level = Some("High School".to_string());

        let result = matcher.match_job(&resume, &job).await;
        assert!(result.score < LLM_RECOMMENDATION_MIN_SCORE, "got {}", result.score);
        assert_eq!(recommender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let recommender = Arc::new(ScriptedRecommender {
            reply: Ok("Cached advice.".to_string()),
            calls: AtomicUsize::new(0),
        });
        let matcher = matcher_with(Some(recommender.clone()));
        let (resume, job) = strong_pair();

        let first = matcher.match_job(&resume, &job).await;
        let second = matcher.match_job(&resume, &job).await;
        assert_eq!(first, second);
        assert_eq!(recommender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rank_jobs_orders_and_truncates() {
        let matcher = matcher_with(None);
        let (resume, strong) = strong_pair();
        let mut weak = make_job("Chief Surgeon", "Surgery and anaesthesia.");
        weak.job_id = "WHO-1".to_string();
        let mut other = make_job("Logistics Officer", "Fleet and warehouse management.");
        other.job_id = "WFP-7".to_string();

        let ranked = rank_jobs(&matcher, &resume, &[weak, strong.clone(), other], 2).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].job_id, strong.job_id);
        assert!(ranked[0].result.score >= ranked[1].result.score);
    }

    #[test]
    fn test_prompt_includes_context() {
        let (resume, job) = strong_pair();
        let missing = vec!["gis".to_string()];
        let prompt = build_recommendation_prompt(&RecommendationRequest {
            job: &job,
            resume: &resume,
            score: 0.72,
            missing_keywords: &missing,
        });
        assert!(prompt.contains("Job Title: Data Analyst"));
        assert!(prompt.contains("Match Score: 72%"));
        assert!(prompt.contains("Missing Skills/Keywords: gis"));
        assert!(prompt.contains("Candidate Experience: unknown"));
    }
}

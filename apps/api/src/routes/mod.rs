pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::crawler::handlers as crawler_handlers;
use crate::matching::handlers as match_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Match API
        .route("/api/v1/match", post(match_handlers::handle_match))
        .route("/api/v1/match/batch", post(match_handlers::handle_match_batch))
        // Crawler API
        .route(
            "/api/v1/crawlers/health",
            get(crawler_handlers::handle_crawler_health),
        )
        .route(
            "/api/v1/crawlers/:org/health",
            get(crawler_handlers::handle_organization_health),
        )
        .route(
            "/api/v1/crawlers/:org/run",
            post(crawler_handlers::handle_run_crawler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::crawler::harness::tests::{draft, ScriptedExtractor};
    use crate::crawler::harness::Crawler;
    use crate::crawler::health::HealthTracker;
    use crate::crawler::retry::RetryPolicy;
    use crate::crawler::CrawlerRegistry;
    use crate::matching::cache::MemoryMatchCache;
    use crate::matching::matcher::KeywordJobMatcher;
    use crate::matching::scoring::MatchScorer;
    use crate::models::job::{JobDraft, NewJob};
    use crate::models::resume::ResumeProfile;
    use crate::storage::memory::{MemoryJobStore, MemoryResumeStore};
    use crate::storage::JobStore;

    struct Fixture {
        router: Router,
        jobs: Arc<MemoryJobStore>,
        resumes: Arc<MemoryResumeStore>,
    }

    fn fixture() -> Fixture {
        let jobs = Arc::new(MemoryJobStore::new());
        let resumes = Arc::new(MemoryResumeStore::new());

        let mut crawlers = CrawlerRegistry::new();
        crawlers.register(Crawler::new(
            Arc::new(ScriptedExtractor::new("UN", vec![draft(1), draft(2)])),
            jobs.clone(),
            RetryPolicy::new(1, Duration::from_millis(1)),
            Duration::from_secs(60),
        ));

        let matcher = KeywordJobMatcher::new(
            MatchScorer::default(),
            Arc::new(MemoryMatchCache::new(Duration::from_secs(60))),
            None,
        );

        let state = AppState {
            jobs: jobs.clone(),
            resumes: resumes.clone(),
            matcher: Arc::new(matcher),
            crawlers,
            health: Arc::new(HealthTracker::new()),
        };

        Fixture {
            router: build_router(state),
            jobs,
            resumes,
        }
    }

    async fn seed_job(store: &MemoryJobStore, job_id: &str, title: &str, description: &str) {
        let job = NewJob::try_from(JobDraft {
            job_id: Some(job_id.to_string()),
            title: Some(title.to_string()),
            organization: Some("UNICEF".to_string()),
            description: Some(description.to_string()),
            apply_url: Some(format!("https://jobs.unicef.org/{job_id}")),
            ..Default::default()
        })
        .unwrap();
        store.upsert_job(&job).await.unwrap();
    }

    fn seed_resume(store: &MemoryResumeStore) -> Uuid {
        let id = Uuid::new_v4();
        store.insert(ResumeProfile {
            id,
            raw_text: "Monitoring and evaluation specialist. Data analysis with Python and SQL."
                .to_string(),
            skills: vec!["python".to_string(), "sql".to_string(), "data analysis".to_string()],
            experience_years: Some(6),
            education_level: Some("Master's".to_string()),
        });
        id
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture();
        let (status, body) = send(&f.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "unjobs-api");
        assert_eq!(body["crawlers"], 1);
    }

    #[tokio::test]
    async fn test_match_unknown_resume_is_404() {
        let f = fixture();
        let (status, body) = send(
            &f.router,
            "POST",
            "/api/v1/match",
            Some(json!({"resume_id": Uuid::new_v4(), "job_id": "UN-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_match_scores_stored_job() {
        let f = fixture();
        seed_job(
            &f.jobs,
            "UNICEF-1",
            "Data Analyst",
            "Data analysis with Python and SQL for monitoring and evaluation.",
        )
        .await;
        let resume_id = seed_resume(&f.resumes);

        let (status, body) = send(
            &f.router,
            "POST",
            "/api/v1/match",
            Some(json!({"resume_id": resume_id, "job_id": "UNICEF-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let score = body["score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert!(body["recommendation"].as_str().is_some_and(|r| !r.is_empty()));
    }

    #[tokio::test]
    async fn test_batch_match_ranks_best_first() {
        let f = fixture();
        seed_job(
            &f.jobs,
            "UNICEF-1",
            "Data Analyst",
            "Data analysis with Python and SQL for monitoring and evaluation.",
        )
        .await;
        seed_job(
            &f.jobs,
            "UNICEF-2",
            "Driver",
            "Operate and maintain vehicles. Valid driving licence required.",
        )
        .await;
        let resume_id = seed_resume(&f.resumes);

        let (status, body) = send(
            &f.router,
            "POST",
            "/api/v1/match/batch",
            Some(json!({"resume_id": resume_id, "limit": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["considered"], 2);
        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        let first = matches[0]["result"]["score"].as_f64().unwrap();
        let second = matches[1]["result"]["score"].as_f64().unwrap();
        assert!(first >= second);
    }

    #[tokio::test]
    async fn test_run_crawler_then_report_health() {
        let f = fixture();
        let (status, body) = send(&f.router, "POST", "/api/v1/crawlers/un/run", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["jobs_saved"], 2);
        assert_eq!(f.jobs.len(), 2);

        let (status, body) = send(&f.router, "GET", "/api/v1/crawlers/UN/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health"], "healthy");

        let (_, body) = send(&f.router, "GET", "/api/v1/crawlers/health", None).await;
        assert_eq!(body["overall"]["crawler_count"], 1);
        assert_eq!(body["overall"]["healthy_count"], 1);
    }

    #[tokio::test]
    async fn test_unknown_crawler_is_404() {
        let f = fixture();
        let (status, _) = send(&f.router, "GET", "/api/v1/crawlers/UNHCR/health", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&f.router, "POST", "/api/v1/crawlers/UNHCR/run", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_never_run_crawler_is_unknown() {
        let f = fixture();
        let (_, body) = send(&f.router, "GET", "/api/v1/crawlers/health", None).await;
        assert_eq!(body["crawlers"][0]["health"], "unknown");
        assert_eq!(body["overall"]["status"], "unknown");
    }
}

mod config;
mod crawler;
mod db;
mod errors;
mod extractors;
mod heuristics;
mod llm_client;
mod matching;
mod models;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::crawler::health::HealthTracker;
use crate::crawler::scheduler::spawn_schedule;
use crate::db::{create_pool, ensure_schema};
use crate::extractors::sites::build_registry;
use crate::llm_client::LlmClient;
use crate::matching::cache::{MatchCache, MemoryMatchCache, RedisMatchCache};
use crate::matching::fuzzy::FuzzyMatcher;
use crate::matching::keywords::{KeywordExtractor, SkillWeights};
use crate::matching::matcher::{
    KeywordJobMatcher, LlmRecommender, Recommender, RECOMMENDATION_MAX_TOKENS,
};
use crate::matching::scoring::MatchScorer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::postgres::{PgJobStore, PgResumeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting UN Jobs API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;
    let jobs = Arc::new(PgJobStore::new(db.clone()));
    let resumes = Arc::new(PgResumeStore::new(db));

    // Match cache: Redis when configured and reachable, in-process otherwise
    let cache = build_match_cache(&config).await;

    // LLM wording of recommendations (optional)
    let recommender: Option<Arc<dyn Recommender>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?.with_max_tokens(RECOMMENDATION_MAX_TOKENS);
            info!("LLM recommendations enabled (model: {})", llm_client::MODEL);
            Some(Arc::new(LlmRecommender(llm)))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; using rule-based recommendations only");
            None
        }
    };

    // Scorer
    let weights = match &config.matching.skill_weights_path {
        Some(path) => SkillWeights::from_json_file(path)?,
        None => SkillWeights::default(),
    };
    info!("Loaded {} skill weights", weights.len());
    let scorer = MatchScorer::new(
        KeywordExtractor::new(weights),
        FuzzyMatcher::new(config.matching.fuzzy_floor),
        config.matching.fuzzy_accept,
    );
    let matcher = Arc::new(KeywordJobMatcher::new(scorer, cache, recommender));

    // Crawlers
    let crawlers = build_registry(&config.crawler, jobs.clone())?;
    info!("Registered crawlers: {}", crawlers.organizations().join(", "));
    let health = Arc::new(HealthTracker::new());

    if let Some(minutes) = config.crawler.interval_minutes.filter(|m| *m > 0) {
        info!("Scheduling all crawlers every {minutes} minutes");
        spawn_schedule(
            crawlers.clone(),
            health.clone(),
            Duration::from_secs(minutes * 60),
        );
    }

    // Build app state
    let state = AppState {
        jobs,
        resumes,
        matcher,
        crawlers,
        health,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_match_cache(config: &Config) -> Arc<dyn MatchCache> {
    let ttl = config.matching.cache_ttl_secs;
    if let Some(url) = &config.redis_url {
        match RedisMatchCache::connect(url, ttl).await {
            Ok(cache) => {
                info!("Match cache: Redis (ttl {ttl}s)");
                return Arc::new(cache);
            }
            Err(e) => warn!("Redis unavailable ({e}); falling back to in-process match cache"),
        }
    }
    info!("Match cache: in-process (ttl {ttl}s)");
    Arc::new(MemoryMatchCache::new(Duration::from_secs(ttl)))
}

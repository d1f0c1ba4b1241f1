use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Match cache backend. Falls back to an in-process cache when unset.
    pub redis_url: Option<String>,
    /// Enables LLM refinement of match recommendations when set.
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub crawler: CrawlerSettings,
    pub matching: MatchingSettings,
}

/// Tunables for crawl runs and the HTTP fetch layer.
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Wall-clock budget for one full crawl run.
    pub timeout_secs: u64,
    /// Politeness delay between requests to the same site.
    pub request_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub max_jobs_per_site: usize,
    pub max_pages: u32,
    /// Periodic crawl of every site. `None` disables the scheduler.
    pub interval_minutes: Option<u64>,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 5,
            timeout_secs: 300,
            request_delay_ms: 1000,
            http_timeout_secs: 30,
            max_jobs_per_site: 50,
            max_pages: 5,
            interval_minutes: None,
        }
    }
}

/// Empirically chosen matching constants, kept out of the code path so they can be tuned.
#[derive(Debug, Clone)]
pub struct MatchingSettings {
    /// Edit-distance similarities below this are treated as no match.
    pub fuzzy_floor: f64,
    /// Minimum similarity for a résumé skill to count as a keyword hit.
    pub fuzzy_accept: f64,
    pub cache_ttl_secs: u64,
    /// Optional JSON object of `{"term": weight}` merged over the built-in table.
    pub skill_weights_path: Option<String>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            fuzzy_floor: 0.6,
            fuzzy_accept: 0.8,
            cache_ttl_secs: 3600,
            skill_weights_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let crawler_defaults = CrawlerSettings::default();
        let matching_defaults = MatchingSettings::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            crawler: CrawlerSettings {
                max_retries: env_or("CRAWL_MAX_RETRIES", crawler_defaults.max_retries)?,
                retry_delay_secs: env_or(
                    "CRAWL_RETRY_DELAY_SECS",
                    crawler_defaults.retry_delay_secs,
                )?,
                timeout_secs: env_or("CRAWL_TIMEOUT_SECS", crawler_defaults.timeout_secs)?,
                request_delay_ms: env_or(
                    "CRAWL_REQUEST_DELAY_MS",
                    crawler_defaults.request_delay_ms,
                )?,
                http_timeout_secs: env_or(
                    "CRAWL_HTTP_TIMEOUT_SECS",
                    crawler_defaults.http_timeout_secs,
                )?,
                max_jobs_per_site: env_or(
                    "CRAWL_MAX_JOBS_PER_SITE",
                    crawler_defaults.max_jobs_per_site,
                )?,
                max_pages: env_or("CRAWL_MAX_PAGES", crawler_defaults.max_pages)?,
                interval_minutes: optional_env("CRAWL_INTERVAL_MINUTES")
                    .map(|v| {
                        v.parse::<u64>()
                            .context("CRAWL_INTERVAL_MINUTES must be a whole number of minutes")
                    })
                    .transpose()?,
            },
            matching: MatchingSettings {
                fuzzy_floor: env_or("MATCH_FUZZY_FLOOR", matching_defaults.fuzzy_floor)?,
                fuzzy_accept: env_or("MATCH_FUZZY_ACCEPT", matching_defaults.fuzzy_accept)?,
                cache_ttl_secs: env_or("MATCH_CACHE_TTL_SECS", matching_defaults.cache_ttl_secs)?,
                skill_weights_path: optional_env("MATCH_SKILL_WEIGHTS_PATH"),
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

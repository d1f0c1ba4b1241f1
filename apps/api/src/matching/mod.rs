//! Résumé ↔ job matching: fuzzy similarity, weighted keyword extraction, the five-factor
//! scorer, and the cached match service on top of them.
//! Recommendation wording goes through llm_client only.

pub mod cache;
pub mod fuzzy;
pub mod handlers;
pub mod keywords;
pub mod matcher;
pub mod prompts;
pub mod scoring;

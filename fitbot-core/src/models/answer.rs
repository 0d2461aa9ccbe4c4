use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// A web page cited by a cached answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedAnswer {
    pub id: i64,
    pub question_hash: String,
    pub original_question: String,
    pub answer: String,
    pub sources: Json<Vec<SourceMetadata>>,
    pub model: String,
    pub prompt_version: String,
    pub retriever_version: String,
    pub hit_count: i32,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_refreshing: bool,
}

impl CachedAnswer {
    /// Rows without an expiry never go stale.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// What a cache hit hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnswerResult {
    pub answer: String,
    pub sources: Vec<SourceMetadata>,
    /// Includes the hit that produced this result.
    pub hit_count: i32,
    pub original_question: String,
    pub is_stale: bool,
    pub model: String,
    pub prompt_version: String,
    pub retriever_version: String,
}

impl CachedAnswerResult {
    pub fn from_hit(row: CachedAnswer, is_stale: bool) -> Self {
        Self {
            answer: row.answer,
            sources: row.sources.0,
            hit_count: row.hit_count + 1,
            original_question: row.original_question,
            is_stale,
            model: row.model,
            prompt_version: row.prompt_version,
            retriever_version: row.retriever_version,
        }
    }
}

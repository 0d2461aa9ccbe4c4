//! Persistence seam for the answer and source caches.
//!
//! [`CacheStore`] exposes exactly the primitives the cache subsystems need
//! (keyed lookup, guarded upsert, conditional deletes, counts, ranked
//! retention). [`PgCacheStore`] is the production backend;
//! [`InMemoryStore`] backs tests and database-less runs.
//!
//! A store is constructed once at start-up and shared as
//! `Arc<dyn CacheStore>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FitbotError;
use crate::models::{CachedAnswer, ScrapedSource, SourceMetadata};

pub use memory::InMemoryStore;
pub use postgres::PgCacheStore;

pub type StoreResult<T> = Result<T, FitbotError>;

/// Row ranking for size-limit retention and the popular-answers list.
/// Every backend orders by exactly this.
pub const USAGE_ORDER: &str = "hit_count DESC, last_used DESC, id ASC";

/// Row ranking for the recent-sources list.
pub const RECENCY_ORDER: &str = "last_used DESC, id ASC";

/// The two cache tables, for operations that apply to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTable {
    Answers,
    Sources,
}

impl CacheTable {
    pub fn table_name(self) -> &'static str {
        match self {
            CacheTable::Answers => "cached_answers",
            CacheTable::Sources => "scraped_sources",
        }
    }
}

/// How an answer upsert treats a row flagged `is_refreshing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshGuard {
    /// Skip the write: another writer owns the regeneration.
    Yield,
    /// Write anyway. Used by the writer holding the refresh claim.
    Override,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_hash: String,
    pub original_question: String,
    pub answer: String,
    pub sources: Vec<SourceMetadata>,
    pub model: String,
    pub prompt_version: String,
    pub retriever_version: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSource {
    pub url_hash: String,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub raw_html: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl NewSource {
    /// Length in characters of the literal content.
    pub fn content_length(&self) -> i32 {
        i32::try_from(self.content.chars().count()).unwrap_or(i32::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableAggregate {
    pub total: i64,
    pub total_hits: i64,
    pub avg_hits: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PopularAnswer {
    pub original_question: String,
    pub hit_count: i32,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecentSource {
    pub url: String,
    pub hit_count: i32,
    pub last_used: DateTime<Utc>,
    pub content_length: i32,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    // ---- answers ----

    async fn find_answer(&self, question_hash: &str) -> StoreResult<Option<CachedAnswer>>;

    /// `hit_count += 1`, `last_used = now`.
    async fn touch_answer(&self, question_hash: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Insert or replace the answer for `answer.question_hash` in one
    /// transaction. Returns `None` when `guard` is [`RefreshGuard::Yield`]
    /// and the existing row is flagged `is_refreshing`.
    async fn upsert_answer(
        &self,
        answer: &NewAnswer,
        guard: RefreshGuard,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CachedAnswer>>;

    /// Compare-and-set on `is_refreshing`. Returns `true` only if this call
    /// flipped the flag to `refreshing`.
    async fn set_refreshing(&self, question_hash: &str, refreshing: bool) -> StoreResult<bool>;

    // ---- sources ----

    async fn find_source(&self, url_hash: &str) -> StoreResult<Option<ScrapedSource>>;

    async fn touch_source(&self, url_hash: &str, now: DateTime<Utc>) -> StoreResult<()>;

    async fn delete_source(&self, url_hash: &str) -> StoreResult<()>;

    /// On overwrite: content, title, html and expiry are replaced and the
    /// hit count is bumped.
    async fn upsert_source(&self, source: &NewSource, now: DateTime<Utc>)
        -> StoreResult<ScrapedSource>;

    // ---- maintenance ----

    /// Delete rows with `expires_at < now`.
    async fn delete_expired(&self, table: CacheTable, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Delete rows with `last_used < cutoff AND hit_count < min_hit_count`.
    async fn delete_unpopular(
        &self,
        table: CacheTable,
        cutoff: DateTime<Utc>,
        min_hit_count: i32,
    ) -> StoreResult<u64>;

    async fn count(&self, table: CacheTable) -> StoreResult<i64>;

    /// Keep the first `keep` rows by `(hit_count DESC, last_used DESC, id ASC)`
    /// and delete the rest.
    async fn retain_top(&self, table: CacheTable, keep: i64) -> StoreResult<u64>;

    // ---- statistics ----

    async fn aggregate(&self, table: CacheTable) -> StoreResult<TableAggregate>;

    async fn popular_answers(&self, limit: i64) -> StoreResult<Vec<PopularAnswer>>;

    async fn recent_sources(&self, limit: i64) -> StoreResult<Vec<RecentSource>>;
}

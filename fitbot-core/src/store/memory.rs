//! In-memory [`CacheStore`] for tests and database-less runs.
//!
//! Rows live in `HashMap`s behind `std::sync::RwLock`, keyed the same way as
//! the unique columns of the SQL tables. Every method takes the write lock
//! for its whole critical section, so the guarded upsert is atomic here.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::models::{CachedAnswer, ScrapedSource};

use super::{
    CacheStore, CacheTable, NewAnswer, NewSource, PopularAnswer, RecentSource, RefreshGuard,
    StoreResult, TableAggregate,
};

#[derive(Default)]
pub struct InMemoryStore {
    answers: RwLock<HashMap<String, CachedAnswer>>,
    sources: RwLock<HashMap<String, ScrapedSource>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    fn answers(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedAnswer>> {
        self.answers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn answers_read(&self) -> RwLockReadGuard<'_, HashMap<String, CachedAnswer>> {
        self.answers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources(&self) -> RwLockWriteGuard<'_, HashMap<String, ScrapedSource>> {
        self.sources.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources_read(&self) -> RwLockReadGuard<'_, HashMap<String, ScrapedSource>> {
        self.sources.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row as-is, assigning a fresh id. Lets callers stage rows
    /// with arbitrary timestamps and counters.
    pub fn insert_answer(&self, mut row: CachedAnswer) -> i64 {
        row.id = self.next_id();
        let id = row.id;
        self.answers().insert(row.question_hash.clone(), row);
        id
    }

    pub fn insert_source(&self, mut row: ScrapedSource) -> i64 {
        row.id = self.next_id();
        let id = row.id;
        self.sources().insert(row.url_hash.clone(), row);
        id
    }

    pub fn answer(&self, question_hash: &str) -> Option<CachedAnswer> {
        self.answers_read().get(question_hash).cloned()
    }

    pub fn source(&self, url_hash: &str) -> Option<ScrapedSource> {
        self.sources_read().get(url_hash).cloned()
    }
}

/// In-process rendering of [`USAGE_ORDER`](super::USAGE_ORDER).
fn usage_rank(a: (i32, DateTime<Utc>, i64), b: (i32, DateTime<Utc>, i64)) -> Ordering {
    b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2))
}

/// In-process rendering of [`RECENCY_ORDER`](super::RECENCY_ORDER).
fn recency_rank(a: (DateTime<Utc>, i64), b: (DateTime<Utc>, i64)) -> Ordering {
    b.0.cmp(&a.0).then(a.1.cmp(&b.1))
}

fn retain_ranked<T>(
    rows: &mut HashMap<String, T>,
    keep: i64,
    key: impl Fn(&T) -> (i32, DateTime<Utc>, i64),
) -> u64 {
    let keep = usize::try_from(keep.max(0)).unwrap_or(usize::MAX);
    if rows.len() <= keep {
        return 0;
    }

    let mut ranked: Vec<(String, (i32, DateTime<Utc>, i64))> =
        rows.iter().map(|(k, v)| (k.clone(), key(v))).collect();
    ranked.sort_by(|a, b| usage_rank(a.1, b.1));

    let mut removed = 0;
    for (k, _) in ranked.into_iter().skip(keep) {
        rows.remove(&k);
        removed += 1;
    }
    removed
}

fn aggregate_hits(hits: impl Iterator<Item = i32>) -> TableAggregate {
    let (total, total_hits) = hits.fold((0i64, 0i64), |(n, sum), h| (n + 1, sum + h as i64));
    let avg_hits = if total == 0 {
        0.0
    } else {
        total_hits as f64 / total as f64
    };
    TableAggregate {
        total,
        total_hits,
        avg_hits,
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn find_answer(&self, question_hash: &str) -> StoreResult<Option<CachedAnswer>> {
        Ok(self.answer(question_hash))
    }

    async fn touch_answer(&self, question_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(row) = self.answers().get_mut(question_hash) {
            row.hit_count += 1;
            row.last_used = now;
        }
        Ok(())
    }

    async fn upsert_answer(
        &self,
        answer: &NewAnswer,
        guard: RefreshGuard,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CachedAnswer>> {
        let mut answers = self.answers();

        if let Some(row) = answers.get_mut(&answer.question_hash) {
            if guard == RefreshGuard::Yield && row.is_refreshing {
                return Ok(None);
            }
            row.answer = answer.answer.clone();
            row.sources = Json(answer.sources.clone());
            row.model = answer.model.clone();
            row.prompt_version = answer.prompt_version.clone();
            row.retriever_version = answer.retriever_version.clone();
            row.last_used = now;
            row.expires_at = Some(answer.expires_at);
            row.is_refreshing = false;
            return Ok(Some(row.clone()));
        }

        let row = CachedAnswer {
            id: self.next_id(),
            question_hash: answer.question_hash.clone(),
            original_question: answer.original_question.clone(),
            answer: answer.answer.clone(),
            sources: Json(answer.sources.clone()),
            model: answer.model.clone(),
            prompt_version: answer.prompt_version.clone(),
            retriever_version: answer.retriever_version.clone(),
            hit_count: 0,
            created_at: now,
            last_used: now,
            expires_at: Some(answer.expires_at),
            is_refreshing: false,
        };
        answers.insert(row.question_hash.clone(), row.clone());
        Ok(Some(row))
    }

    async fn set_refreshing(&self, question_hash: &str, refreshing: bool) -> StoreResult<bool> {
        match self.answers().get_mut(question_hash) {
            Some(row) if row.is_refreshing != refreshing => {
                row.is_refreshing = refreshing;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_source(&self, url_hash: &str) -> StoreResult<Option<ScrapedSource>> {
        Ok(self.source(url_hash))
    }

    async fn touch_source(&self, url_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(row) = self.sources().get_mut(url_hash) {
            row.hit_count += 1;
            row.last_used = now;
        }
        Ok(())
    }

    async fn delete_source(&self, url_hash: &str) -> StoreResult<()> {
        self.sources().remove(url_hash);
        Ok(())
    }

    async fn upsert_source(
        &self,
        source: &NewSource,
        now: DateTime<Utc>,
    ) -> StoreResult<ScrapedSource> {
        let mut sources = self.sources();

        if let Some(row) = sources.get_mut(&source.url_hash) {
            row.title = source.title.clone();
            row.content = source.content.clone();
            row.raw_html = source.raw_html.clone();
            row.content_length = source.content_length();
            row.hit_count += 1;
            row.scraped_at = now;
            row.last_used = now;
            row.expires_at = source.expires_at;
            return Ok(row.clone());
        }

        let row = ScrapedSource {
            id: self.next_id(),
            url_hash: source.url_hash.clone(),
            url: source.url.clone(),
            title: source.title.clone(),
            content: source.content.clone(),
            raw_html: source.raw_html.clone(),
            content_length: source.content_length(),
            hit_count: 0,
            scraped_at: now,
            last_used: now,
            expires_at: source.expires_at,
        };
        sources.insert(row.url_hash.clone(), row.clone());
        Ok(row)
    }

    async fn delete_expired(&self, table: CacheTable, now: DateTime<Utc>) -> StoreResult<u64> {
        let removed = match table {
            CacheTable::Answers => {
                let mut rows = self.answers();
                let before = rows.len();
                rows.retain(|_, r| !r.is_expired(now));
                before - rows.len()
            }
            CacheTable::Sources => {
                let mut rows = self.sources();
                let before = rows.len();
                rows.retain(|_, r| !r.is_expired(now));
                before - rows.len()
            }
        };
        Ok(removed as u64)
    }

    async fn delete_unpopular(
        &self,
        table: CacheTable,
        cutoff: DateTime<Utc>,
        min_hit_count: i32,
    ) -> StoreResult<u64> {
        let removed = match table {
            CacheTable::Answers => {
                let mut rows = self.answers();
                let before = rows.len();
                rows.retain(|_, r| !(r.last_used < cutoff && r.hit_count < min_hit_count));
                before - rows.len()
            }
            CacheTable::Sources => {
                let mut rows = self.sources();
                let before = rows.len();
                rows.retain(|_, r| !(r.last_used < cutoff && r.hit_count < min_hit_count));
                before - rows.len()
            }
        };
        Ok(removed as u64)
    }

    async fn count(&self, table: CacheTable) -> StoreResult<i64> {
        let n = match table {
            CacheTable::Answers => self.answers_read().len(),
            CacheTable::Sources => self.sources_read().len(),
        };
        Ok(n as i64)
    }

    async fn retain_top(&self, table: CacheTable, keep: i64) -> StoreResult<u64> {
        let removed = match table {
            CacheTable::Answers => {
                retain_ranked(&mut self.answers(), keep, |r| (r.hit_count, r.last_used, r.id))
            }
            CacheTable::Sources => {
                retain_ranked(&mut self.sources(), keep, |r| (r.hit_count, r.last_used, r.id))
            }
        };
        Ok(removed)
    }

    async fn aggregate(&self, table: CacheTable) -> StoreResult<TableAggregate> {
        let agg = match table {
            CacheTable::Answers => aggregate_hits(self.answers_read().values().map(|r| r.hit_count)),
            CacheTable::Sources => aggregate_hits(self.sources_read().values().map(|r| r.hit_count)),
        };
        Ok(agg)
    }

    async fn popular_answers(&self, limit: i64) -> StoreResult<Vec<PopularAnswer>> {
        let mut rows: Vec<CachedAnswer> = self.answers_read().values().cloned().collect();
        rows.sort_by(|a, b| {
            usage_rank((a.hit_count, a.last_used, a.id), (b.hit_count, b.last_used, b.id))
        });
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(|r| PopularAnswer {
                original_question: r.original_question,
                hit_count: r.hit_count,
                last_used: r.last_used,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn recent_sources(&self, limit: i64) -> StoreResult<Vec<RecentSource>> {
        let mut rows: Vec<ScrapedSource> = self.sources_read().values().cloned().collect();
        rows.sort_by(|a, b| recency_rank((a.last_used, a.id), (b.last_used, b.id)));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(|r| RecentSource {
                url: r.url,
                hit_count: r.hit_count,
                last_used: r.last_used,
                content_length: r.content_length,
            })
            .collect())
    }
}

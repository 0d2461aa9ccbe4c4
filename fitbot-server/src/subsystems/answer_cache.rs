//! Answer cache: versioned, soft-TTL cache of generated answers.
//!
//! Reads are stale-while-revalidate: an expired row is still served (flagged
//! `is_stale`) unless the caller demands freshness. Every served read bumps
//! the usage stats; failing to record them never fails the read.
//!
//! Writes are guarded by the advisory `is_refreshing` flag. A plain `put`
//! yields to a row that another writer has claimed for regeneration. The
//! claim is best effort: two writers that both see the flag unset may both
//! write, and the last one wins.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fitbot_core::models::{CachedAnswer, CachedAnswerResult, SourceMetadata};
use fitbot_core::store::{CacheStore, NewAnswer, RefreshGuard};
use fitbot_core::ttl::days_after;
use fitbot_core::{build_key, CacheKeyParts};

#[derive(Clone)]
pub struct AnswerCache {
    store: Arc<dyn CacheStore>,
}

impl AnswerCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        parts: &CacheKeyParts,
        require_fresh: bool,
    ) -> Result<Option<CachedAnswerResult>> {
        let question_hash = build_key(parts);
        let Some(row) = self.store.find_answer(&question_hash).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let stale = row.is_expired(now);
        if stale && require_fresh {
            tracing::debug!("Answer cache: stale entry {} skipped (fresh required)", question_hash);
            return Ok(None);
        }

        if let Err(e) = self.store.touch_answer(&question_hash, now).await {
            tracing::warn!("Failed to update answer cache stats for {}: {}", question_hash, e);
        }

        tracing::debug!("Answer cache HIT {} (stale: {})", question_hash, stale);
        Ok(Some(CachedAnswerResult::from_hit(row, stale)))
    }

    /// Returns `None` when another writer holds the refresh claim.
    pub async fn put(
        &self,
        parts: &CacheKeyParts,
        original_question: &str,
        answer: &str,
        sources: &[SourceMetadata],
        ttl_days: i64,
    ) -> Result<Option<CachedAnswer>> {
        let now = Utc::now();
        let row = new_answer(parts, original_question, answer, sources, ttl_days, now)?;
        let written = self
            .store
            .upsert_answer(&row, RefreshGuard::Yield, now)
            .await?;

        match &written {
            Some(_) => tracing::info!("Cached answer for: {}", original_question),
            None => tracing::info!(
                "Answer cache write skipped, refresh in progress: {}",
                row.question_hash
            ),
        }
        Ok(written)
    }

    /// Claim the right to regenerate an entry. `false` means the row is
    /// missing or someone else already claimed it.
    pub async fn begin_refresh(&self, parts: &CacheKeyParts) -> Result<bool> {
        let claimed = self.store.set_refreshing(&build_key(parts), true).await?;
        Ok(claimed)
    }

    /// Write the regenerated answer as the claim holder and clear the claim.
    pub async fn complete_refresh(
        &self,
        parts: &CacheKeyParts,
        original_question: &str,
        answer: &str,
        sources: &[SourceMetadata],
        ttl_days: i64,
    ) -> Result<CachedAnswer> {
        let now = Utc::now();
        let row = new_answer(parts, original_question, answer, sources, ttl_days, now)?;
        self.store
            .upsert_answer(&row, RefreshGuard::Override, now)
            .await?
            .ok_or_else(|| anyhow::anyhow!("refresh write for {} was not applied", row.question_hash))
    }

    /// Drop a claim after a failed regeneration.
    pub async fn release_refresh(&self, parts: &CacheKeyParts) -> Result<bool> {
        let released = self.store.set_refreshing(&build_key(parts), false).await?;
        Ok(released)
    }
}

fn new_answer(
    parts: &CacheKeyParts,
    original_question: &str,
    answer: &str,
    sources: &[SourceMetadata],
    ttl_days: i64,
    now: DateTime<Utc>,
) -> Result<NewAnswer> {
    Ok(NewAnswer {
        question_hash: build_key(parts),
        original_question: original_question.to_string(),
        answer: answer.to_string(),
        sources: sources.to_vec(),
        model: parts.model.clone(),
        prompt_version: parts.prompt_version.clone(),
        retriever_version: parts.retriever_version.clone(),
        expires_at: days_after(now, "ttl_days", ttl_days)?,
    })
}

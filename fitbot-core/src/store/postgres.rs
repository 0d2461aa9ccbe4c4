use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::{CachedAnswer, ScrapedSource};

use super::{
    CacheStore, CacheTable, NewAnswer, NewSource, PopularAnswer, RecentSource, RefreshGuard,
    StoreResult, TableAggregate, RECENCY_ORDER, USAGE_ORDER,
};

/// Postgres-backed store over the `cached_answers` / `scraped_sources` tables.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn find_answer(&self, question_hash: &str) -> StoreResult<Option<CachedAnswer>> {
        let row = sqlx::query_as::<_, CachedAnswer>(
            "SELECT * FROM cached_answers WHERE question_hash = $1",
        )
        .bind(question_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn touch_answer(&self, question_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE cached_answers
            SET hit_count = hit_count + 1,
                last_used = $2
            WHERE question_hash = $1
            "#,
        )
        .bind(question_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_answer(
        &self,
        answer: &NewAnswer,
        guard: RefreshGuard,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CachedAnswer>> {
        let mut tx = self.pool.begin().await?;

        if guard == RefreshGuard::Yield {
            let existing: Option<(bool,)> = sqlx::query_as(
                "SELECT is_refreshing FROM cached_answers WHERE question_hash = $1 FOR UPDATE",
            )
            .bind(&answer.question_hash)
            .fetch_optional(&mut *tx)
            .await?;

            if matches!(existing, Some((true,))) {
                tx.rollback().await?;
                return Ok(None);
            }
        }

        let row = sqlx::query_as::<_, CachedAnswer>(
            r#"
            INSERT INTO cached_answers (
                question_hash, original_question, answer, sources, model,
                prompt_version, retriever_version, hit_count, created_at,
                last_used, expires_at, is_refreshing
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8, $9, FALSE)
            ON CONFLICT (question_hash) DO UPDATE SET
                answer = EXCLUDED.answer,
                sources = EXCLUDED.sources,
                model = EXCLUDED.model,
                prompt_version = EXCLUDED.prompt_version,
                retriever_version = EXCLUDED.retriever_version,
                last_used = EXCLUDED.last_used,
                expires_at = EXCLUDED.expires_at,
                is_refreshing = FALSE
            RETURNING *
            "#,
        )
        .bind(&answer.question_hash)
        .bind(&answer.original_question)
        .bind(&answer.answer)
        .bind(Json(&answer.sources))
        .bind(&answer.model)
        .bind(&answer.prompt_version)
        .bind(&answer.retriever_version)
        .bind(now)
        .bind(answer.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn set_refreshing(&self, question_hash: &str, refreshing: bool) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cached_answers
            SET is_refreshing = $2
            WHERE question_hash = $1 AND is_refreshing <> $2
            "#,
        )
        .bind(question_hash)
        .bind(refreshing)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_source(&self, url_hash: &str) -> StoreResult<Option<ScrapedSource>> {
        let row = sqlx::query_as::<_, ScrapedSource>(
            "SELECT * FROM scraped_sources WHERE url_hash = $1",
        )
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn touch_source(&self, url_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE scraped_sources
            SET hit_count = hit_count + 1,
                last_used = $2
            WHERE url_hash = $1
            "#,
        )
        .bind(url_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_source(&self, url_hash: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM scraped_sources WHERE url_hash = $1")
            .bind(url_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_source(
        &self,
        source: &NewSource,
        now: DateTime<Utc>,
    ) -> StoreResult<ScrapedSource> {
        let row = sqlx::query_as::<_, ScrapedSource>(
            r#"
            INSERT INTO scraped_sources (
                url_hash, url, title, content, raw_html, content_length,
                hit_count, scraped_at, last_used, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7, $8)
            ON CONFLICT (url_hash) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                raw_html = EXCLUDED.raw_html,
                content_length = EXCLUDED.content_length,
                hit_count = scraped_sources.hit_count + 1,
                scraped_at = EXCLUDED.scraped_at,
                last_used = EXCLUDED.last_used,
                expires_at = EXCLUDED.expires_at
            RETURNING *
            "#,
        )
        .bind(&source.url_hash)
        .bind(&source.url)
        .bind(&source.title)
        .bind(&source.content)
        .bind(&source.raw_html)
        .bind(source.content_length())
        .bind(now)
        .bind(source.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_expired(&self, table: CacheTable, now: DateTime<Utc>) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE expires_at < $1", table.table_name());
        let result = sqlx::query(&sql).bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_unpopular(
        &self,
        table: CacheTable,
        cutoff: DateTime<Utc>,
        min_hit_count: i32,
    ) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE last_used < $1 AND hit_count < $2",
            table.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .bind(min_hit_count)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, table: CacheTable) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let row: (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    async fn retain_top(&self, table: CacheTable, keep: i64) -> StoreResult<u64> {
        let name = table.table_name();
        let sql = format!(
            r#"
            DELETE FROM {name}
            WHERE id NOT IN (
                SELECT id FROM {name}
                ORDER BY {USAGE_ORDER}
                LIMIT $1
            )
            "#
        );
        let result = sqlx::query(&sql)
            .bind(keep.max(0))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn aggregate(&self, table: CacheTable) -> StoreResult<TableAggregate> {
        let sql = format!(
            r#"
            SELECT COUNT(*)::BIGINT,
                   COALESCE(SUM(hit_count), 0)::BIGINT,
                   COALESCE(AVG(hit_count), 0)::FLOAT8
            FROM {}
            "#,
            table.table_name()
        );
        let (total, total_hits, avg_hits): (i64, i64, f64) =
            sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(TableAggregate {
            total,
            total_hits,
            avg_hits,
        })
    }

    async fn popular_answers(&self, limit: i64) -> StoreResult<Vec<PopularAnswer>> {
        let sql = format!(
            r#"
            SELECT original_question, hit_count, last_used, created_at
            FROM cached_answers
            ORDER BY {USAGE_ORDER}
            LIMIT $1
            "#
        );
        let rows = sqlx::query_as::<_, PopularAnswer>(&sql)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_sources(&self, limit: i64) -> StoreResult<Vec<RecentSource>> {
        let sql = format!(
            r#"
            SELECT url, hit_count, last_used, content_length
            FROM scraped_sources
            ORDER BY {RECENCY_ORDER}
            LIMIT $1
            "#
        );
        let rows = sqlx::query_as::<_, RecentSource>(&sql)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

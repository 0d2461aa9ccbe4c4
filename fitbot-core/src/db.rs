use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Cache tables. Idempotent, so it is safe to run on every start-up.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cached_answers (
    id                BIGSERIAL PRIMARY KEY,
    question_hash     TEXT NOT NULL UNIQUE,
    original_question TEXT NOT NULL,
    answer            TEXT NOT NULL,
    sources           JSONB NOT NULL DEFAULT '[]'::jsonb,
    model             TEXT NOT NULL,
    prompt_version    TEXT NOT NULL,
    retriever_version TEXT NOT NULL,
    hit_count         INTEGER NOT NULL DEFAULT 0,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_used         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    expires_at        TIMESTAMPTZ,
    is_refreshing     BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS cached_answers_expires_at_idx ON cached_answers (expires_at);
CREATE INDEX IF NOT EXISTS cached_answers_usage_idx ON cached_answers (hit_count DESC, last_used DESC);

CREATE TABLE IF NOT EXISTS scraped_sources (
    id             BIGSERIAL PRIMARY KEY,
    url_hash       TEXT NOT NULL UNIQUE,
    url            TEXT NOT NULL,
    title          TEXT,
    content        TEXT NOT NULL,
    raw_html       TEXT,
    content_length INTEGER NOT NULL DEFAULT 0,
    hit_count      INTEGER NOT NULL DEFAULT 0,
    scraped_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_used      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    expires_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS scraped_sources_expires_at_idx ON scraped_sources (expires_at);
CREATE INDEX IF NOT EXISTS scraped_sources_usage_idx ON scraped_sources (hit_count DESC, last_used DESC);
"#;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let strategy = ExponentialBackoff::from_millis(200)
        .max_delay(std::time::Duration::from_secs(5))
        .map(jitter)
        .take(config.connect_retries);

    Retry::spawn(strategy, || async {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .inspect_err(|e| tracing::warn!("Database connect attempt failed: {}", e))
    })
    .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapedSource {
    pub id: i64,
    pub url_hash: String,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub raw_html: Option<String>,
    pub content_length: i32,
    pub hit_count: i32,
    pub scraped_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ScrapedSource {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub title: Option<String>,
    pub content: String,
    pub raw_html: Option<String>,
    pub hit_count: i32,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedContent {
    pub fn from_hit(row: ScrapedSource) -> Self {
        Self {
            title: row.title,
            content: row.content,
            raw_html: row.raw_html,
            hit_count: row.hit_count + 1,
            scraped_at: row.scraped_at,
        }
    }
}

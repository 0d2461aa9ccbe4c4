//! Source cache: fetched page content keyed by the literal URL.
//!
//! Unlike answers, expired pages are never served: the row is deleted on
//! read and the caller refetches.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use fitbot_core::hash_text;
use fitbot_core::models::{ScrapedContent, ScrapedSource};
use fitbot_core::store::{CacheStore, NewSource};
use fitbot_core::ttl::days_after;

#[derive(Clone)]
pub struct SourceCache {
    store: Arc<dyn CacheStore>,
}

impl SourceCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, url: &str) -> Result<Option<ScrapedContent>> {
        let url_hash = hash_text(url);
        let Some(row) = self.store.find_source(&url_hash).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if row.is_expired(now) {
            tracing::debug!("Source cache: dropping expired page {}", url);
            self.store.delete_source(&url_hash).await?;
            return Ok(None);
        }

        if let Err(e) = self.store.touch_source(&url_hash, now).await {
            tracing::warn!("Failed to update source cache stats for {}: {}", url, e);
        }

        Ok(Some(ScrapedContent::from_hit(row)))
    }

    /// Expiry is always `now + ttl_days`, never stacked on a prior expiry.
    pub async fn put(
        &self,
        url: &str,
        content: &str,
        title: Option<&str>,
        raw_html: Option<&str>,
        ttl_days: i64,
    ) -> Result<ScrapedSource> {
        let now = Utc::now();
        let source = NewSource {
            url_hash: hash_text(url),
            url: url.to_string(),
            title: title.map(str::to_string),
            content: content.to_string(),
            raw_html: raw_html.map(str::to_string),
            expires_at: days_after(now, "ttl_days", ttl_days)?,
        };
        let row = self.store.upsert_source(&source, now).await?;
        tracing::debug!("Cached page {} ({} chars)", url, row.content_length);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fitbot_core::store::InMemoryStore;

    const URL: &str = "https://example.com/articles/squat-depth";

    fn setup() -> (Arc<InMemoryStore>, SourceCache) {
        let store = Arc::new(InMemoryStore::new());
        let cache = SourceCache::new(store.clone());
        (store, cache)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_store, cache) = setup();
        cache
            .put(URL, "Squat to parallel or below.", Some("Squat depth"), None, 3)
            .await
            .unwrap();

        let hit = cache.get(URL).await.unwrap().expect("cache hit");
        assert_eq!(hit.content, "Squat to parallel or below.");
        assert_eq!(hit.title.as_deref(), Some("Squat depth"));
        assert!(hit.raw_html.is_none());
        assert_eq!(hit.hit_count, 1);
    }

    #[tokio::test]
    async fn test_get_miss() {
        let (_store, cache) = setup();
        assert!(cache.get(URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_url_is_not_normalized() {
        let (_store, cache) = setup();
        cache.put(URL, "content", None, None, 3).await.unwrap();
        assert!(cache.get(&format!("{URL}/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_source_is_deleted_on_read() {
        let (store, cache) = setup();
        cache.put(URL, "old content", None, None, -1).await.unwrap();
        assert!(store.source(&hash_text(URL)).is_some());

        assert!(cache.get(URL).await.unwrap().is_none());
        assert!(store.source(&hash_text(URL)).is_none(), "expired row removed");
    }

    #[tokio::test]
    async fn test_overwrite_recomputes_length_and_expiry() {
        let (store, cache) = setup();
        cache.put(URL, "short", None, None, 3).await.unwrap();
        let first = store.source(&hash_text(URL)).unwrap();
        assert_eq!(first.content_length, 5);

        let before = Utc::now();
        let row = cache
            .put(URL, "a much longer body, with ünïcode", Some("New"), Some("<p>"), 1)
            .await
            .unwrap();

        assert_eq!(row.id, first.id);
        assert_eq!(row.content_length, 32, "counted in chars, not bytes");
        assert_eq!(row.hit_count, 1);
        assert_eq!(row.title.as_deref(), Some("New"));
        // expiry measured from now, not stacked on the old 3 days
        assert!(row.expires_at < first.expires_at);
        assert!(row.expires_at >= before + Duration::days(1));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_an_error_not_a_panic() {
        let (store, cache) = setup();
        let err = cache
            .put(URL, "body", None, None, 1_000_000_000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ttl_days"));
        assert!(store.source(&hash_text(URL)).is_none(), "nothing written");
    }
}

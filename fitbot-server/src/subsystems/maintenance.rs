//! Cache maintenance sweep
//!
//! Three passes per cache, in order, each over whatever the previous pass
//! left behind:
//!
//! 1. **Expired**: `expires_at < now`
//! 2. **Unpopular**: `last_used < now - cache_days` AND `hit_count < min_hit_count`
//! 3. **Size limit**: if more than `max_entries` rows remain, keep the top
//!    `max_entries` by `(hit_count DESC, last_used DESC, id ASC)`
//!
//! Answers and scraped sources are swept concurrently. A failing pass is
//! recorded in the report and does not stop the passes after it. Nothing
//! schedules this; it runs when an operator triggers it.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use fitbot_core::config::MaintenanceConfig;
use fitbot_core::ipc::CleanupOptions;
use fitbot_core::store::{CacheStore, CacheTable};
use fitbot_core::ttl::{checked_days, days_before};
use serde::{Deserialize, Serialize};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Effective thresholds for one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupThresholds {
    pub answer_cache_days: i64,
    pub scrape_cache_days: i64,
    pub min_hit_count: i32,
    pub max_answer_entries: i64,
    pub max_scrape_entries: i64,
}

impl Default for CleanupThresholds {
    fn default() -> Self {
        Self::from(&MaintenanceConfig::default())
    }
}

impl From<&MaintenanceConfig> for CleanupThresholds {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            answer_cache_days: config.answer_cache_days,
            scrape_cache_days: config.scrape_cache_days,
            min_hit_count: config.min_hit_count,
            max_answer_entries: config.max_answer_entries,
            max_scrape_entries: config.max_scrape_entries,
        }
    }
}

impl CleanupThresholds {
    /// Caller-supplied options win; anything unset keeps the configured value.
    /// The merged thresholds are validated before they are returned.
    pub fn with_options(mut self, options: &CleanupOptions) -> Result<Self> {
        if let Some(v) = options.answer_cache_days {
            self.answer_cache_days = v;
        }
        if let Some(v) = options.scrape_cache_days {
            self.scrape_cache_days = v;
        }
        if let Some(v) = options.min_hit_count {
            self.min_hit_count = v;
        }
        if let Some(v) = options.max_answer_entries {
            self.max_answer_entries = v;
        }
        if let Some(v) = options.max_scrape_entries {
            self.max_scrape_entries = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// No threshold may be negative, and day windows must stay representable.
    pub fn validate(&self) -> Result<()> {
        for (field, days) in [
            ("answer_cache_days", self.answer_cache_days),
            ("scrape_cache_days", self.scrape_cache_days),
        ] {
            if days < 0 {
                bail!("{field} must not be negative, got {days}");
            }
            checked_days(field, days)?;
        }
        if self.min_hit_count < 0 {
            bail!("min_hit_count must not be negative, got {}", self.min_hit_count);
        }
        for (field, max) in [
            ("max_answer_entries", self.max_answer_entries),
            ("max_scrape_entries", self.max_scrape_entries),
        ] {
            if max < 0 {
                bail!("{field} must not be negative, got {max}");
            }
        }
        Ok(())
    }
}

/// Deletions per pass for one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub expired: u64,
    pub unpopular: u64,
    pub size_limit: u64,
    pub total: u64,
    /// One message per failed pass. A failed pass counts zero deletions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub answers: CategoryCounts,
    pub scrapes: CategoryCounts,
    pub elapsed_ms: u64,
}

impl CleanupReport {
    pub fn is_partial(&self) -> bool {
        !self.answers.errors.is_empty() || !self.scrapes.errors.is_empty()
    }
}

/// Run one sweep over both caches. Never fails as a whole; per-pass
/// failures are reported in the returned counts.
pub async fn run_cleanup(store: &dyn CacheStore, thresholds: &CleanupThresholds) -> CleanupReport {
    let start = std::time::Instant::now();
    let now = Utc::now();

    let (answers, scrapes) = tokio::join!(
        sweep_table(
            store,
            CacheTable::Answers,
            thresholds.answer_cache_days,
            thresholds.min_hit_count,
            thresholds.max_answer_entries,
            now,
        ),
        sweep_table(
            store,
            CacheTable::Sources,
            thresholds.scrape_cache_days,
            thresholds.min_hit_count,
            thresholds.max_scrape_entries,
            now,
        ),
    );

    let report = CleanupReport {
        answers,
        scrapes,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    tracing::info!(
        "Cache cleanup complete: answers {} removed ({} expired, {} unpopular, {} size limit), scrapes {} removed ({} expired, {} unpopular, {} size limit) in {}ms",
        report.answers.total,
        report.answers.expired,
        report.answers.unpopular,
        report.answers.size_limit,
        report.scrapes.total,
        report.scrapes.expired,
        report.scrapes.unpopular,
        report.scrapes.size_limit,
        report.elapsed_ms
    );
    if report.is_partial() {
        tracing::warn!(
            "Cache cleanup finished with errors: answers={:?} scrapes={:?}",
            report.answers.errors,
            report.scrapes.errors
        );
    }

    report
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

async fn sweep_table(
    store: &dyn CacheStore,
    table: CacheTable,
    cache_days: i64,
    min_hit_count: i32,
    max_entries: i64,
    now: DateTime<Utc>,
) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    let name = table.table_name();

    match store.delete_expired(table, now).await {
        Ok(n) => counts.expired = n,
        Err(e) => counts.errors.push(format!("{name} expired pass: {e}")),
    }

    match days_before(now, "cache_days", cache_days) {
        Ok(cutoff) => match store.delete_unpopular(table, cutoff, min_hit_count).await {
            Ok(n) => counts.unpopular = n,
            Err(e) => counts.errors.push(format!("{name} unpopular pass: {e}")),
        },
        Err(e) => counts.errors.push(format!("{name} unpopular pass: {e}")),
    }

    if max_entries < 0 {
        counts
            .errors
            .push(format!("{name} size limit pass: max entries must not be negative"));
        counts.total = counts.expired + counts.unpopular;
        return counts;
    }

    match store.count(table).await {
        Ok(remaining) if remaining > max_entries => {
            match store.retain_top(table, max_entries).await {
                Ok(n) => counts.size_limit = n,
                Err(e) => counts.errors.push(format!("{name} size limit pass: {e}")),
            }
        }
        Ok(_) => {}
        Err(e) => counts.errors.push(format!("{name} size limit pass: {e}")),
    }

    counts.total = counts.expired + counts.unpopular + counts.size_limit;
    counts
}

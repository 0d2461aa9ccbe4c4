//! Read-only cache statistics for the admin surfaces.

use anyhow::Result;
use fitbot_core::store::{CacheStore, CacheTable, PopularAnswer, RecentSource, TableAggregate};
use serde::{Deserialize, Serialize};

const POPULAR_LIMIT: i64 = 10;
const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub answers: TableAggregate,
    pub scrapes: TableAggregate,
    pub popular_answers: Vec<PopularAnswer>,
    pub recent_sources: Vec<RecentSource>,
}

pub async fn cache_stats(store: &dyn CacheStore) -> Result<CacheStats> {
    let (answers, scrapes, popular, recent) = tokio::try_join!(
        store.aggregate(CacheTable::Answers),
        store.aggregate(CacheTable::Sources),
        store.popular_answers(POPULAR_LIMIT),
        store.recent_sources(RECENT_LIMIT),
    )?;

    Ok(CacheStats {
        answers: round_avg(answers),
        scrapes: round_avg(scrapes),
        popular_answers: popular,
        recent_sources: recent,
    })
}

fn round_avg(mut agg: TableAggregate) -> TableAggregate {
    agg.avg_hits = (agg.avg_hits * 100.0).round() / 100.0;
    agg
}

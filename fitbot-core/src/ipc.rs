use serde::{Deserialize, Serialize};

use crate::models::SourceMetadata;

/// Optional overrides of the configured cleanup thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOptions {
    pub answer_cache_days: Option<i64>,
    pub scrape_cache_days: Option<i64>,
    pub min_hit_count: Option<i32>,
    pub max_answer_entries: Option<i64>,
    pub max_scrape_entries: Option<i64>,
}

/// Version tags for an answer lookup or write. Unset tags fall back to the
/// service's configured versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTags {
    pub model: Option<String>,
    pub prompt_version: Option<String>,
    pub retriever_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FitbotRequest {
    Ping,
    Health,
    Classify {
        query: String,
    },
    AnswerGet {
        question: String,
        #[serde(default)]
        versions: VersionTags,
        #[serde(default)]
        require_fresh: bool,
    },
    AnswerPut {
        question: String,
        answer: String,
        #[serde(default)]
        sources: Vec<SourceMetadata>,
        #[serde(default)]
        versions: VersionTags,
        ttl_days: Option<i64>,
    },
    SourceGet {
        url: String,
    },
    SourcePut {
        url: String,
        content: String,
        title: Option<String>,
        raw_html: Option<String>,
        ttl_days: Option<i64>,
    },
    CacheStats,
    CacheCleanup {
        #[serde(default)]
        options: CleanupOptions,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FitbotResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl FitbotResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

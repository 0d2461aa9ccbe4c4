//! Everything a request handler needs, built once at start-up and shared by
//! the IPC and HTTP servers.

use std::sync::Arc;

use fitbot_core::ipc::VersionTags;
use fitbot_core::store::CacheStore;
use fitbot_core::{CacheKeyParts, FitbotConfig, InMemoryStore, PgCacheStore, ScopeClassifier};
use sqlx::PgPool;

use crate::subsystems::answer_cache::AnswerCache;
use crate::subsystems::escalation::{RejectingEscalation, ScopeEscalation};
use crate::subsystems::source_cache::SourceCache;

#[derive(Clone)]
pub struct ServiceState {
    pub config: FitbotConfig,
    pub store: Arc<dyn CacheStore>,
    /// `None` when running on the in-memory store.
    pub pool: Option<PgPool>,
    pub classifier: Arc<ScopeClassifier>,
    pub escalation: Arc<dyn ScopeEscalation>,
    pub answers: AnswerCache,
    pub sources: SourceCache,
}

impl ServiceState {
    pub fn new(config: FitbotConfig, store: Arc<dyn CacheStore>, pool: Option<PgPool>) -> Self {
        Self {
            config,
            answers: AnswerCache::new(store.clone()),
            sources: SourceCache::new(store.clone()),
            store,
            pool,
            classifier: Arc::new(ScopeClassifier::new()),
            escalation: Arc::new(RejectingEscalation),
        }
    }

    pub fn postgres(config: FitbotConfig, pool: PgPool) -> Self {
        let store = Arc::new(PgCacheStore::new(pool.clone()));
        Self::new(config, store, Some(pool))
    }

    pub fn in_memory(config: FitbotConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()), None)
    }

    pub fn with_escalation(mut self, escalation: Arc<dyn ScopeEscalation>) -> Self {
        self.escalation = escalation;
        self
    }

    /// Key parts for `question`, filling unset tags from `[versions]`.
    pub fn key_parts(&self, question: &str, tags: &VersionTags) -> CacheKeyParts {
        let versions = &self.config.versions;
        CacheKeyParts::new(
            question,
            tags.model.as_deref().unwrap_or(&versions.model),
            tags.prompt_version.as_deref().unwrap_or(&versions.prompt_version),
            tags.retriever_version.as_deref().unwrap_or(&versions.retriever_version),
        )
    }
}

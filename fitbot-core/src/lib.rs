pub mod cache_key;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod scope;
pub mod store;
pub mod ttl;

pub use cache_key::{build_key, hash_text, normalize_question, CacheKeyParts};
pub use config::FitbotConfig;
pub use error::FitbotError;
pub use scope::{MatchSource, ScopeClassifier, ScopeDecision, ScopeVocabulary};
pub use store::{CacheStore, CacheTable, InMemoryStore, PgCacheStore};

//! Versioned cache identities.
//!
//! A cached answer is addressed by the normalized question *and* the
//! model / prompt / retriever version tags that produced it, so upgrading
//! any of those can never serve an answer computed under old semantics.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stored keys are the first 16 hex chars of a SHA-256 digest.
pub const KEY_LENGTH: usize = 16;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?!.,;:]").unwrap());
static STOP_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(the|a|an|and|or|but|in|on|at|to|for|of|with|by)\b").unwrap()
});

/// Coarse question normalization: paraphrases that differ only in case,
/// spacing, punctuation or stop words collapse onto one key.
pub fn normalize_question(question: &str) -> String {
    let q = question.to_lowercase();
    let q = WHITESPACE.replace_all(q.trim(), " ");
    let q = PUNCTUATION.replace_all(&q, "");
    let q = STOP_WORDS.replace_all(&q, " ");
    WHITESPACE.replace_all(&q, " ").trim().to_string()
}

/// The four inputs of an answer cache key. Field order is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKeyParts {
    #[serde(rename = "q")]
    pub normalized_query: String,
    pub model: String,
    pub prompt_version: String,
    pub retriever_version: String,
}

impl CacheKeyParts {
    pub fn new(
        question: &str,
        model: impl Into<String>,
        prompt_version: impl Into<String>,
        retriever_version: impl Into<String>,
    ) -> Self {
        Self {
            normalized_query: normalize_question(question),
            model: model.into(),
            prompt_version: prompt_version.into(),
            retriever_version: retriever_version.into(),
        }
    }
}

pub fn build_key(parts: &CacheKeyParts) -> String {
    // Serializing plain strings in a derived struct cannot fail.
    let canonical = serde_json::to_string(parts).unwrap_or_default();
    hash_text(&canonical)
}

/// Truncated SHA-256 hex digest. Also used for literal URL hashes.
pub fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(KEY_LENGTH);
    encoded
}

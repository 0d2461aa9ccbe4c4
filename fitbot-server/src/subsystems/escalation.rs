//! Second opinion for queries the keyword classifier could not place.
//!
//! Plug an LLM-backed judge in here. The router only calls `judge` for
//! [`MatchSource::Deferred`] decisions; matched queries never reach it.

use async_trait::async_trait;
use fitbot_core::{MatchSource, ScopeDecision};

#[async_trait]
pub trait ScopeEscalation: Send + Sync {
    /// Return the final decision for a deferred query.
    async fn judge(&self, query: &str, decision: ScopeDecision) -> ScopeDecision;
}

/// Treats every deferred query as out of scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingEscalation;

#[async_trait]
impl ScopeEscalation for RejectingEscalation {
    async fn judge(&self, query: &str, decision: ScopeDecision) -> ScopeDecision {
        tracing::debug!("Scope: no keyword match, rejecting {:?}", query);
        decision
    }
}

/// Classify, then escalate only when no keyword tier matched.
pub async fn resolve_scope(
    classifier: &fitbot_core::ScopeClassifier,
    escalation: &dyn ScopeEscalation,
    query: &str,
) -> ScopeDecision {
    let decision = classifier.classify(query);
    if decision.match_source != MatchSource::Deferred {
        return decision;
    }
    escalation.judge(query, decision).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitbot_core::ScopeClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts everything and counts how often it was asked.
    #[derive(Default)]
    struct PermissiveEscalation {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScopeEscalation for PermissiveEscalation {
        async fn judge(&self, _query: &str, mut decision: ScopeDecision) -> ScopeDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            decision.in_scope = true;
            decision.fallback_reply = None;
            decision
        }
    }

    #[tokio::test]
    async fn test_rejecting_keeps_deferred_reply() {
        let classifier = ScopeClassifier::new();
        let decision = resolve_scope(&classifier, &RejectingEscalation, "capital of France").await;
        assert!(!decision.in_scope);
        assert_eq!(decision.match_source, MatchSource::Deferred);
        assert!(decision.fallback_reply.is_some());
    }

    #[tokio::test]
    async fn test_escalation_skipped_for_keyword_match() {
        let classifier = ScopeClassifier::new();
        let judge = PermissiveEscalation::default();
        let decision = resolve_scope(&classifier, &judge, "bench press form").await;
        assert!(decision.in_scope);
        assert_eq!(decision.match_source, MatchSource::Phrase);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_escalation_consulted_for_deferred() {
        let classifier = ScopeClassifier::new();
        let judge = PermissiveEscalation::default();
        let decision = resolve_scope(&classifier, &judge, "how do I file my taxes").await;
        assert!(decision.in_scope);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    }
}

use crate::state::ServiceState;
use crate::subsystems::{escalation, maintenance, stats};
use fitbot_core::ipc::{CleanupOptions, FitbotRequest, FitbotResponse, VersionTags};
use fitbot_core::models::SourceMetadata;

pub async fn handle_request(request: FitbotRequest, state: &ServiceState) -> FitbotResponse {
    match request {
        FitbotRequest::Ping => FitbotResponse::pong(),
        FitbotRequest::Health => handle_health(state).await,
        FitbotRequest::Classify { query } => {
            let decision =
                escalation::resolve_scope(&state.classifier, state.escalation.as_ref(), &query)
                    .await;
            match serde_json::to_value(&decision) {
                Ok(data) => FitbotResponse::ok(data),
                Err(e) => FitbotResponse::err(e.to_string()),
            }
        }
        FitbotRequest::AnswerGet {
            question,
            versions,
            require_fresh,
        } => handle_answer_get(state, &question, &versions, require_fresh).await,
        FitbotRequest::AnswerPut {
            question,
            answer,
            sources,
            versions,
            ttl_days,
        } => handle_answer_put(state, &question, &answer, &sources, &versions, ttl_days).await,
        FitbotRequest::SourceGet { url } => handle_source_get(state, &url).await,
        FitbotRequest::SourcePut {
            url,
            content,
            title,
            raw_html,
            ttl_days,
        } => {
            handle_source_put(
                state,
                &url,
                &content,
                title.as_deref(),
                raw_html.as_deref(),
                ttl_days,
            )
            .await
        }
        FitbotRequest::CacheStats => match stats::cache_stats(state.store.as_ref()).await {
            Ok(stats) => match serde_json::to_value(&stats) {
                Ok(data) => FitbotResponse::ok(data),
                Err(e) => FitbotResponse::err(e.to_string()),
            },
            Err(e) => FitbotResponse::err(format!("Failed to read cache stats: {}", e)),
        },
        FitbotRequest::CacheCleanup { options } => handle_cleanup(state, &options).await,
    }
}

async fn handle_health(state: &ServiceState) -> FitbotResponse {
    let Some(pool) = &state.pool else {
        return FitbotResponse::ok(serde_json::json!({
            "status": "healthy",
            "backend": "memory",
        }));
    };

    match fitbot_core::db::health_check(pool).await {
        Ok(version) => FitbotResponse::ok(serde_json::json!({
            "status": "healthy",
            "backend": "postgres",
            "postgresql": version,
        })),
        Err(e) => FitbotResponse::err(format!("DB Health Check failed: {}", e)),
    }
}

async fn handle_answer_get(
    state: &ServiceState,
    question: &str,
    versions: &VersionTags,
    require_fresh: bool,
) -> FitbotResponse {
    if question.trim().is_empty() {
        return FitbotResponse::err("question is required");
    }

    let parts = state.key_parts(question, versions);
    match state.answers.get(&parts, require_fresh).await {
        Ok(Some(hit)) => FitbotResponse::ok(serde_json::json!({
            "hit": true,
            "question_hash": fitbot_core::build_key(&parts),
            "result": hit,
        })),
        Ok(None) => FitbotResponse::ok(serde_json::json!({ "hit": false })),
        Err(e) => FitbotResponse::err(format!("Answer cache lookup failed: {}", e)),
    }
}

async fn handle_answer_put(
    state: &ServiceState,
    question: &str,
    answer: &str,
    sources: &[SourceMetadata],
    versions: &VersionTags,
    ttl_days: Option<i64>,
) -> FitbotResponse {
    if question.trim().is_empty() {
        return FitbotResponse::err("question is required");
    }

    let min_chars = state.config.cache.min_answer_chars;
    if answer.chars().count() < min_chars {
        tracing::debug!("Not caching short answer ({} < {} chars)", answer.chars().count(), min_chars);
        return FitbotResponse::ok(serde_json::json!({
            "cached": false,
            "reason": "answer_too_short",
        }));
    }

    let parts = state.key_parts(question, versions);
    let ttl_days = ttl_days.unwrap_or(state.config.cache.answer_ttl_days);
    if let Err(e) = fitbot_core::ttl::checked_days("ttl_days", ttl_days) {
        return FitbotResponse::err(e.to_string());
    }
    match state.answers.put(&parts, question, answer, sources, ttl_days).await {
        Ok(Some(row)) => FitbotResponse::ok(serde_json::json!({
            "cached": true,
            "question_hash": row.question_hash,
            "expires_at": row.expires_at,
        })),
        Ok(None) => FitbotResponse::ok(serde_json::json!({
            "cached": false,
            "reason": "refresh_in_progress",
        })),
        Err(e) => {
            tracing::error!("Failed to cache answer: {}", e);
            FitbotResponse::ok(serde_json::json!({ "cached": false }))
        }
    }
}

async fn handle_source_get(state: &ServiceState, url: &str) -> FitbotResponse {
    if url.trim().is_empty() {
        return FitbotResponse::err("url is required");
    }

    match state.sources.get(url).await {
        Ok(Some(page)) => FitbotResponse::ok(serde_json::json!({
            "hit": true,
            "source": page,
        })),
        Ok(None) => FitbotResponse::ok(serde_json::json!({ "hit": false })),
        Err(e) => FitbotResponse::err(format!("Source cache lookup failed: {}", e)),
    }
}

async fn handle_source_put(
    state: &ServiceState,
    url: &str,
    content: &str,
    title: Option<&str>,
    raw_html: Option<&str>,
    ttl_days: Option<i64>,
) -> FitbotResponse {
    if url.trim().is_empty() {
        return FitbotResponse::err("url is required");
    }

    let ttl_days = ttl_days.unwrap_or(state.config.cache.source_ttl_days);
    if let Err(e) = fitbot_core::ttl::checked_days("ttl_days", ttl_days) {
        return FitbotResponse::err(e.to_string());
    }
    match state.sources.put(url, content, title, raw_html, ttl_days).await {
        Ok(row) => FitbotResponse::ok(serde_json::json!({
            "cached": true,
            "content_length": row.content_length,
            "expires_at": row.expires_at,
        })),
        Err(e) => {
            tracing::error!("Failed to cache source {}: {}", url, e);
            FitbotResponse::ok(serde_json::json!({ "cached": false }))
        }
    }
}

async fn handle_cleanup(state: &ServiceState, options: &CleanupOptions) -> FitbotResponse {
    let thresholds =
        match maintenance::CleanupThresholds::from(&state.config.maintenance).with_options(options) {
            Ok(t) => t,
            Err(e) => return FitbotResponse::err(format!("Invalid cleanup options: {}", e)),
        };
    let report = maintenance::run_cleanup(state.store.as_ref(), &thresholds).await;
    FitbotResponse::ok(serde_json::json!({
        "message": "Cache cleanup completed",
        "answers": report.answers,
        "scrapes": report.scrapes,
        "elapsed_ms": report.elapsed_ms,
    }))
}

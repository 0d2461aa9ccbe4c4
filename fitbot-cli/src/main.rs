//! fitbot-cli: operator frontend for the FitBot HTTP API
//!
//! # Subcommands
//! - `classify <query> [--json]`: check whether a query is a fitness topic
//! - `stats [--json]`           : cache statistics
//! - `cleanup [thresholds…]`    : run cache maintenance now
//! - `status`                   : show server health

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "fitbot-cli", version, about = "FitBot scope & cache service CLI")]
struct Cli {
    /// FitBot HTTP server URL (overrides FITBOT_HTTP_URL env var)
    #[arg(long, env = "FITBOT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify a query as in or out of the fitness domain
    Classify {
        query: String,

        /// Print the raw decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show cache statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Run cache maintenance; unset thresholds use the server's config
    Cleanup(CleanupArgs),

    /// Show FitBot server status
    Status,
}

#[derive(Debug, Args, Default)]
struct CleanupArgs {
    /// Answers idle longer than this may be removed as unpopular
    #[arg(long)]
    answer_cache_days: Option<i64>,

    /// Pages idle longer than this may be removed as unpopular
    #[arg(long)]
    scrape_cache_days: Option<i64>,

    /// Idle entries with fewer hits than this are removed
    #[arg(long)]
    min_hit_count: Option<i32>,

    #[arg(long)]
    max_answer_entries: Option<i64>,

    #[arg(long)]
    max_scrape_entries: Option<i64>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Decision {
    pub in_scope: bool,
    pub matched_term: Option<String>,
    pub match_source: String,
    pub fallback_reply: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryCounts {
    pub expired: u64,
    pub unpopular: u64,
    pub size_limit: u64,
    pub total: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupResponse {
    pub message: String,
    pub answers: CategoryCounts,
    pub scrapes: CategoryCounts,
}

// ============================================================================
// Output formatting
// ============================================================================

pub fn format_decision(d: &Decision) -> String {
    if d.in_scope {
        match &d.matched_term {
            Some(term) => format!("in scope ({} match: {})", d.match_source, term),
            None => format!("in scope ({})", d.match_source),
        }
    } else {
        let reply = d.fallback_reply.as_deref().unwrap_or("");
        format!("out of scope\n\n{}", reply)
    }
}

fn format_counts(label: &str, c: &CategoryCounts) -> String {
    let mut line = format!(
        "{:<8} {:>5} removed ({} expired, {} unpopular, {} over size limit)",
        label, c.total, c.expired, c.unpopular, c.size_limit
    );
    for err in &c.errors {
        line.push_str(&format!("\n         error: {}", err));
    }
    line
}

pub fn format_cleanup(r: &CleanupResponse) -> String {
    format!(
        "{}\n{}\n{}",
        r.message,
        format_counts("answers", &r.answers),
        format_counts("scrapes", &r.scrapes)
    )
}

pub fn format_stats(body: &serde_json::Value) -> String {
    let mut out = String::new();
    for (label, key) in [("Answers", "answers"), ("Sources", "scrapes")] {
        let t = &body[key];
        out.push_str(&format!(
            "{:<8} {} entries, {} hits, {} avg hits\n",
            label,
            t["total"].as_i64().unwrap_or(0),
            t["total_hits"].as_i64().unwrap_or(0),
            t["avg_hits"].as_f64().unwrap_or(0.0)
        ));
    }

    let popular = body["popular_answers"].as_array().cloned().unwrap_or_default();
    if !popular.is_empty() {
        out.push_str("\nMost used answers:\n");
        for a in &popular {
            out.push_str(&format!(
                "  {:>5}  {}\n",
                a["hit_count"].as_i64().unwrap_or(0),
                a["original_question"].as_str().unwrap_or("?")
            ));
        }
    }

    let recent = body["recent_sources"].as_array().cloned().unwrap_or_default();
    if !recent.is_empty() {
        out.push_str("\nRecently used sources:\n");
        for s in &recent {
            out.push_str(&format!(
                "  {:>5}  {}\n",
                s["hit_count"].as_i64().unwrap_or(0),
                s["url"].as_str().unwrap_or("?")
            ));
        }
    }
    out
}

/// Query-string pairs for the thresholds that were set.
fn cleanup_query(args: &CleanupArgs) -> Vec<(&'static str, String)> {
    let mut q = Vec::new();
    if let Some(v) = args.answer_cache_days {
        q.push(("answer_cache_days", v.to_string()));
    }
    if let Some(v) = args.scrape_cache_days {
        q.push(("scrape_cache_days", v.to_string()));
    }
    if let Some(v) = args.min_hit_count {
        q.push(("min_hit_count", v.to_string()));
    }
    if let Some(v) = args.max_answer_entries {
        q.push(("max_answer_entries", v.to_string()));
    }
    if let Some(v) = args.max_scrape_entries {
        q.push(("max_scrape_entries", v.to_string()));
    }
    q
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and return the JSON body, exiting on transport or HTTP errors.
fn send_json(req: reqwest::blocking::RequestBuilder, url: &str) -> serde_json::Value {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fitbot-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("fitbot-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    match resp.json() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("fitbot-cli: failed to parse response: {}", e);
            std::process::exit(1);
        }
    }
}

fn do_classify(server: &str, query: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/classify", server);
    let body = send_json(
        client(10)?.post(&url).json(&serde_json::json!({ "query": query })),
        &url,
    );

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let decision: Decision = serde_json::from_value(body)?;
        println!("{}", format_decision(&decision));
    }
    Ok(())
}

fn do_stats(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/cache", server);
    let body = send_json(client(10)?.get(&url), &url);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", format_stats(&body));
    }
    Ok(())
}

fn do_cleanup(server: &str, args: &CleanupArgs) -> anyhow::Result<()> {
    let url = format!("{}/cache", server);
    let body = send_json(client(120)?.delete(&url).query(&cleanup_query(args)), &url);
    let report: CleanupResponse = serde_json::from_value(body)?;
    println!("{}", format_cleanup(&report));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("FitBot server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:       {}", body["backend"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:    {}", pg);
            }
            println!("Socket:        {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("fitbot-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("fitbot-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Classify { query, json } => do_classify(&server, &query, json),
        Commands::Stats { json } => do_stats(&server, json),
        Commands::Cleanup(args) => do_cleanup(&server, &args),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("fitbot-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decision_in_scope() {
        let d = Decision {
            in_scope: true,
            matched_term: Some("bench press".to_string()),
            match_source: "phrase".to_string(),
            fallback_reply: None,
        };
        assert_eq!(format_decision(&d), "in scope (phrase match: bench press)");
    }

    #[test]
    fn test_format_decision_out_of_scope_shows_reply() {
        let d: Decision = serde_json::from_value(serde_json::json!({
            "in_scope": false,
            "matched_term": null,
            "match_source": "deferred",
            "fallback_reply": "I'm FitBot",
        }))
        .unwrap();
        let out = format_decision(&d);
        assert!(out.starts_with("out of scope"));
        assert!(out.ends_with("I'm FitBot"));
    }

    #[test]
    fn test_cleanup_query_only_set_thresholds() {
        assert!(cleanup_query(&CleanupArgs::default()).is_empty());

        let args = CleanupArgs {
            min_hit_count: Some(3),
            max_scrape_entries: Some(100),
            ..Default::default()
        };
        assert_eq!(
            cleanup_query(&args),
            vec![
                ("min_hit_count", "3".to_string()),
                ("max_scrape_entries", "100".to_string())
            ]
        );
    }

    #[test]
    fn test_format_cleanup_lists_errors() {
        let report: CleanupResponse = serde_json::from_value(serde_json::json!({
            "message": "Cache cleanup completed",
            "answers": {"expired": 2, "unpopular": 1, "size_limit": 0, "total": 3},
            "scrapes": {"expired": 0, "unpopular": 0, "size_limit": 0, "total": 0,
                        "errors": ["scraped_sources expired pass: timeout"]},
        }))
        .unwrap();
        let out = format_cleanup(&report);
        assert!(out.starts_with("Cache cleanup completed"));
        assert!(out.contains("3 removed (2 expired, 1 unpopular, 0 over size limit)"));
        assert!(out.contains("error: scraped_sources expired pass: timeout"));
    }

    #[test]
    fn test_format_stats() {
        let body = serde_json::json!({
            "answers": {"total": 2, "total_hits": 5, "avg_hits": 2.5},
            "scrapes": {"total": 0, "total_hits": 0, "avg_hits": 0.0},
            "popular_answers": [{"original_question": "How much protein?", "hit_count": 4}],
            "recent_sources": [],
        });
        let out = format_stats(&body);
        assert!(out.contains("Answers  2 entries, 5 hits, 2.5 avg hits"));
        assert!(out.contains("How much protein?"));
        assert!(!out.contains("Recently used sources"));
    }

    #[test]
    fn test_cli_parses_cleanup_flags() {
        let cli = Cli::parse_from([
            "fitbot-cli",
            "--server",
            "http://localhost:9000/",
            "cleanup",
            "--answer-cache-days",
            "14",
            "--max-answer-entries",
            "50",
        ]);
        assert_eq!(cli.server, "http://localhost:9000/");
        match cli.command {
            Commands::Cleanup(args) => {
                assert_eq!(args.answer_cache_days, Some(14));
                assert_eq!(args.max_answer_entries, Some(50));
                assert!(args.min_hit_count.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}

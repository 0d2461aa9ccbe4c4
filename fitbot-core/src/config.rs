use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct FitbotConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub versions: VersionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

fn default_connect_retries() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Version tags folded into every answer cache key. Bumping any of them
/// invalidates answers computed under the previous setup.
#[derive(Debug, Deserialize, Clone)]
pub struct VersionConfig {
    pub model: String,
    pub prompt_version: String,
    pub retriever_version: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            prompt_version: "v1.0.0".to_string(),
            retriever_version: "v1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub answer_ttl_days: i64,
    pub source_ttl_days: i64,
    /// Answers shorter than this are not written through to the cache.
    pub min_answer_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            answer_ttl_days: 7,
            source_ttl_days: 3,
            min_answer_chars: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    pub answer_cache_days: i64,
    pub scrape_cache_days: i64,
    pub min_hit_count: i32,
    pub max_answer_entries: i64,
    pub max_scrape_entries: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            answer_cache_days: 30,
            scrape_cache_days: 7,
            min_hit_count: 2,
            max_answer_entries: 1000,
            max_scrape_entries: 500,
        }
    }
}

impl FitbotConfig {
    /// Load from a TOML file. `DATABASE_URL`, when set, wins over the file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?;
        s.try_deserialize()
    }
}

use serde::Deserialize;
use std::env;

use farescope_engine::EngineConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub max_concurrent_searches: usize,
    pub search_timeout_ms: u64,
    pub cache_ttl_seconds: i64,
    pub cache_max_entries: usize,
    pub sweep_interval_seconds: u64,
    pub terminal_retention_seconds: i64,
}

impl SearchConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_searches: self.max_concurrent_searches,
            search_timeout: std::time::Duration::from_millis(self.search_timeout_ms),
            cache_ttl: chrono::Duration::seconds(self.cache_ttl_seconds),
            terminal_retention: chrono::Duration::seconds(self.terminal_retention_seconds),
        }
    }
}

/// Stub supplier wiring for demo deployments; production deployments swap in
/// real adapters at startup
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterConfig {
    pub id: String,
    pub airline: String,
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_offers")]
    pub offers: usize,
    #[serde(default = "default_base_price")]
    pub base_price: i32,
    #[serde(default)]
    pub failing: bool,
}

fn default_latency_ms() -> u64 {
    150
}
fn default_jitter_ms() -> u64 {
    100
}
fn default_offers() -> usize {
    5
}
fn default_base_price() -> i32 {
    18000
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of FARESCOPE)
            .add_source(config::Environment::with_prefix("FARESCOPE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

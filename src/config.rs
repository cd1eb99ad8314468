use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    /// Use the first hop of `X-Forwarded-For` as the client address.
    /// Only enable behind a reverse proxy that overwrites the header.
    #[serde(default = "default_trust_forwarded_for")]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_ms: u64,
    /// Entries inserted when the whitelist table is empty at startup.
    #[serde(default = "default_seed")]
    pub seed: Vec<String>,
}

impl WhitelistConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Inserted as an active API key when the key table is empty.
    #[serde(default)]
    pub bootstrap_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8000 }
fn default_trust_forwarded_for() -> bool { true }
fn default_db_path() -> String { "./ip-gate.db".to_string() }
fn default_cache_ttl() -> u64 { 300 }
fn default_refresh_timeout() -> u64 { 5_000 }
fn default_seed() -> Vec<String> { vec!["127.0.0.1".to_string(), "::1".to_string()] }
fn default_max_upload() -> usize { 5 * 1024 * 1024 }

/// Minimum length accepted for a bootstrap API key.
const MIN_API_KEY_LEN: usize = 32;

pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.whitelist.cache_ttl_secs == 0 {
        anyhow::bail!("CONFIG ERROR: whitelist.cache_ttl_secs must be greater than zero");
    }

    if cfg.whitelist.refresh_timeout_ms == 0 {
        anyhow::bail!("CONFIG ERROR: whitelist.refresh_timeout_ms must be greater than zero");
    }

    if let Some(key) = &cfg.auth.bootstrap_api_key {
        if key.len() < MIN_API_KEY_LEN {
            anyhow::bail!(
                "CONFIG ERROR: bootstrap API key must be at least {} characters (current: {})",
                MIN_API_KEY_LEN,
                key.len()
            );
        }
    }

    if cfg.ocr.max_upload_bytes == 0 {
        anyhow::bail!("CONFIG ERROR: ocr.max_upload_bytes must be greater than zero");
    }

    if let Some(parent) = std::path::Path::new(&cfg.database.path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!(
                "CONFIG ERROR: Database directory does not exist: {}",
                parent.display()
            );
        }
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

/// Load from `path` (any extension the config crate understands, optional),
/// overridden by `IP_GATE__SECTION__KEY` environment variables.
pub fn load(path: &str) -> Result<Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("IP_GATE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.cors_allowed_origins")
                .with_list_parse_key("whitelist.seed")
                .try_parsing(true),
        )
        .set_default("api.bind", "0.0.0.0")?
        .set_default("api.port", 8000)?
        .set_default("api.cors_allowed_origins", Vec::<String>::new())?
        .set_default("api.trust_forwarded_for", true)?
        .set_default("database.path", "./ip-gate.db")?
        .set_default("whitelist.cache_ttl_secs", 300)?
        .set_default("whitelist.refresh_timeout_ms", 5_000)?
        .set_default("whitelist.seed", vec!["127.0.0.1", "::1"])?
        .set_default("ocr.max_upload_bytes", 5 * 1024 * 1024)?
        .build()?
        .try_deserialize()?;

    validate(&cfg)?;

    Ok(cfg)
}

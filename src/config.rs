use anyhow::Error;
use serde::Deserialize;

/// Top-level configuration loaded from a TOML file. Engine parameters are
/// fixed (see `EngineSettings`); only logging and the demo account are
/// configurable.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub account: Option<AccountConfig>,
}

/// Credentials the demo binary registers with at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            account: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }
}

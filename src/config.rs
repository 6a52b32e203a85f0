//! TOML configuration for `esu`.
//!
//! ```toml
//! [cluster]
//! base_url = "https://localhost:9200"
//! username = "elastic"
//! password_env = "ELASTIC_PASSWORD"
//!
//! [scan]
//! batch_size = 5000
//! sort_field = "@timestamp"
//! ```
//!
//! `[scan]` is optional; every key in it has a default.

use anyhow::{bail, Context, Result};
use elasticutils_core::query::{SortField, SortOrder};
use elasticutils_core::scan::{
    ScanOptions, DEFAULT_BATCH_SIZE, DEFAULT_KEEP_ALIVE, DEFAULT_MAX_RECORDS, DEFAULT_SORT_FIELD,
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password; read at load time.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClusterConfig {
    /// Basic-auth pair, when a username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|user| (user, self.password.as_deref().unwrap_or("")))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_max_records")]
    pub max_records: u64,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Field that `--since` / `--until` filter on.
    #[serde(default = "default_sort_field")]
    pub date_field: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: default_sort_order(),
            date_field: DEFAULT_SORT_FIELD.to_string(),
        }
    }
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}
fn default_max_records() -> u64 {
    DEFAULT_MAX_RECORDS
}
fn default_keep_alive() -> String {
    DEFAULT_KEEP_ALIVE.to_string()
}
fn default_sort_field() -> String {
    DEFAULT_SORT_FIELD.to_string()
}
fn default_sort_order() -> String {
    "desc".to_string()
}

impl ScanConfig {
    /// Scan options seeded from this section. `sort_order` is validated at load.
    pub fn options(&self) -> ScanOptions {
        let order = self.sort_order.parse().unwrap_or(SortOrder::Desc);
        ScanOptions::new()
            .batch_size(self.batch_size)
            .max_records(self.max_records)
            .keep_alive(self.keep_alive.clone())
            .sort(vec![SortField::new(self.sort_field.clone(), order)])
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate cluster
    let base_url = config.cluster.base_url.trim();
    if base_url.is_empty() {
        bail!("cluster.base_url must not be empty");
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        bail!(
            "cluster.base_url must start with http:// or https://, got '{}'",
            base_url
        );
    }
    config.cluster.base_url = base_url.trim_end_matches('/').to_string();

    if config.cluster.password.is_none() {
        if let Some(ref var) = config.cluster.password_env {
            let password = std::env::var(var).with_context(|| {
                format!("cluster.password_env names '{}', which is not set", var)
            })?;
            config.cluster.password = Some(password);
        }
    }

    // Validate scan
    if config.scan.batch_size == 0 {
        bail!("scan.batch_size must be >= 1");
    }
    if config.scan.max_records == 0 {
        bail!("scan.max_records must be >= 1");
    }
    if config.scan.keep_alive.trim().is_empty() {
        bail!("scan.keep_alive must not be empty");
    }
    if config.scan.sort_order.parse::<SortOrder>().is_err() {
        bail!(
            "scan.sort_order must be asc or desc, got '{}'",
            config.scan.sort_order
        );
    }

    Ok(config)
}

//! `esu index exists|create|delete`.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::client::ElasticsearchClient;
use crate::config::Config;
use crate::get::ensure_success;

/// Mappings from a JSON file, or empty mappings.
pub fn load_mappings(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mappings file: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse mappings file: {}", path.display()))
        }
        None => Ok(json!({})),
    }
}

/// Prints `true` or `false`; exits non-zero when the index is absent.
pub fn run_exists(cfg: &Config, index: &str) -> Result<bool> {
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let exists = client.index_exists(index);
    println!("{}", exists);
    Ok(exists)
}

pub fn run_create(cfg: &Config, index: &str, mappings: Option<&Path>) -> Result<()> {
    let mappings = load_mappings(mappings)?;
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let body = ensure_success(client.create_index(index, mappings)?, "create index")?;
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

pub fn run_delete(cfg: &Config, index: &str) -> Result<()> {
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let body = ensure_success(client.delete_index(index)?, "delete index")?;
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mappings_from_file_or_empty() {
        assert_eq!(load_mappings(None).unwrap(), json!({}));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.json");
        std::fs::write(&path, r#"{"properties": {"ts": {"type": "date"}}}"#).unwrap();
        assert_eq!(
            load_mappings(Some(path.as_path())).unwrap()["properties"]["ts"]["type"],
            "date"
        );

        std::fs::write(&path, "not json").unwrap();
        assert!(load_mappings(Some(path.as_path())).is_err());
    }
}

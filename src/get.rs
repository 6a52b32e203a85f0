//! Single-document commands: `esu get`, `esu put`, `esu update`.

use anyhow::{bail, Context, Result};
use elasticutils_core::transport::{Response, Transport};
use serde_json::Value;

use crate::client::ElasticsearchClient;
use crate::config::Config;

/// `_source` of document `id`; a missing document is an error.
pub fn get_source<T: Transport>(
    client: &ElasticsearchClient<T>,
    index: &str,
    id: &str,
) -> Result<Value> {
    let resp = client.get_document(index, id)?;
    if resp.status == 404 {
        bail!("document not found: {}/{}", index, id);
    }
    let body = ensure_success(resp, "get")?;
    Ok(body.get("_source").cloned().unwrap_or(Value::Null))
}

/// Parse a document argument, reading stdin when it is `-`.
pub fn read_document(raw: &str) -> Result<Value> {
    let text = if raw == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read document from stdin")?
    } else {
        raw.to_string()
    };
    let doc: Value = serde_json::from_str(&text).context("document is not valid JSON")?;
    if !doc.is_object() {
        bail!("document must be a JSON object");
    }
    Ok(doc)
}

pub(crate) fn ensure_success(resp: Response, action: &str) -> Result<Value> {
    if !resp.is_success() {
        bail!("{} failed with status {}: {}", action, resp.status, resp.body);
    }
    Ok(resp.body)
}

pub fn run_get(cfg: &Config, index: &str, id: &str) -> Result<()> {
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let source = get_source(&client, index, id)?;
    println!("{}", serde_json::to_string_pretty(&source)?);
    Ok(())
}

pub fn run_put(cfg: &Config, index: &str, id: Option<&str>, document: &str) -> Result<()> {
    let doc = read_document(document)?;
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let body = ensure_success(client.index_document(index, &doc, id)?, "index")?;
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

/// The document is sent as the partial `doc` of an update.
pub fn run_update(cfg: &Config, index: &str, id: &str, document: &str) -> Result<()> {
    let doc = read_document(document)?;
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let body = ensure_success(
        client.update_document(index, id, &serde_json::json!({ "doc": doc }))?,
        "update",
    )?;
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

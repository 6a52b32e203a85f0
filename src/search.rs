//! One-shot search: `esu search <index>`.
//!
//! Posts the query built from the command-line flags to `{index}/_search`
//! and prints either the whole response or one `_source` per line.

use anyhow::{bail, Result};
use elasticutils_core::query::Query;
use elasticutils_core::transport::Transport;
use serde_json::Value;

use crate::client::ElasticsearchClient;
use crate::config::Config;
use crate::query_args::QueryArgs;

/// Run the query and return the response body; non-2xx statuses are errors.
pub fn search<T: Transport>(
    client: &ElasticsearchClient<T>,
    index: &str,
    query: &Query,
) -> Result<Value> {
    let resp = client.search(index, query)?;
    if !resp.is_success() {
        bail!("search on '{}' failed with status {}: {}", index, resp.status, resp.body);
    }
    Ok(resp.body)
}

/// `_source` of every hit, in response order.
pub fn hit_sources(body: &Value) -> Vec<&Value> {
    body.pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| hits.iter().filter_map(|h| h.get("_source")).collect())
        .unwrap_or_default()
}

pub fn run_search(cfg: &Config, index: &str, args: &QueryArgs, hits_only: bool) -> Result<()> {
    let query = args.build(&cfg.scan.date_field)?;
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let body = search(&client, index, &query)?;

    if hits_only {
        for source in hit_sources(&body) {
            println!("{}", serde_json::to_string(source)?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

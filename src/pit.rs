//! `esu pit open|close`: manage point-in-time snapshots by hand, e.g. to
//! run several `esu scan --pit` passes over the same view of an index.

use anyhow::Result;
use elasticutils_core::scan::{CloseReport, PointInTime};
use elasticutils_core::transport::Transport;
use serde_json::json;

use crate::client::ElasticsearchClient;
use crate::config::Config;

pub fn open<T: Transport>(
    client: &ElasticsearchClient<T>,
    index: &str,
    keep_alive: &str,
) -> Result<PointInTime> {
    Ok(client.scanner().open(index, keep_alive)?)
}

pub fn close<T: Transport>(client: &ElasticsearchClient<T>, ids: &[String]) -> Result<CloseReport> {
    Ok(client.scanner().close(ids.iter().cloned())?)
}

pub fn run_open(cfg: &Config, index: &str, keep_alive: Option<&str>) -> Result<()> {
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let keep_alive = keep_alive.unwrap_or(cfg.scan.keep_alive.as_str());
    let pit = open(&client, index, keep_alive)?;
    println!("{}", pit.id);
    Ok(())
}

pub fn run_close(cfg: &Config, ids: &[String]) -> Result<()> {
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let report = close(&client, ids)?;
    println!(
        "{}",
        json!({
            "succeeded": report.succeeded,
            "num_freed": report.num_freed,
            "status": report.status,
        })
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elasticutils_core::transport::memory::InMemoryEngine;

    const BASE: &str = "http://es.local:9200";

    #[test]
    fn open_then_close_twice() {
        let engine = InMemoryEngine::new(BASE);
        engine.create_index("logs");
        let client = ElasticsearchClient::new(&engine, BASE);

        let pit = open(&client, "logs", "2m").unwrap();
        assert_eq!(pit.keep_alive, "2m");

        let ids = vec![pit.id];
        let first = close(&client, &ids).unwrap();
        assert!(first.succeeded);
        assert_eq!(first.num_freed, 1);

        let again = close(&client, &ids).unwrap();
        assert!(!again.succeeded);
        assert_eq!(again.status, Some(404));
    }
}

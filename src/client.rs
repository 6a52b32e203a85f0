//! HTTP access to a cluster.
//!
//! [`HttpTransport`] implements the core [`Transport`] over a blocking
//! `reqwest` client with HTTP Basic auth. [`ElasticsearchClient`] wraps any
//! transport with the index and document calls the CLI needs, and hands out
//! a [`PaginatedScanner`] bound to the same connection.

use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use elasticutils_core::query::Query;
use elasticutils_core::scan::PaginatedScanner;
use elasticutils_core::transport::{Method, Response, Transport};
use elasticutils_core::urls::{resolve, ElasticUrls};
use elasticutils_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ClusterConfig;

/// Blocking transport with default auth and JSON headers.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(cluster: &ClusterConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some((user, password)) = cluster.credentials() {
            let mut value = HeaderValue::from_str(&basic_auth(user, password))
                .context("credentials contain characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if cluster.accept_invalid_certs {
            warn!(
                base_url = %cluster.base_url,
                "TLS certificate verification is disabled"
            );
        }

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cluster.timeout_secs))
            .danger_accept_invalid_certs(cluster.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

/// `Basic base64(user:password)`.
pub fn basic_auth(user: &str, password: &str) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", token)
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Empty bodies become `null`; bodies that are not JSON come back as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

impl Transport for HttpTransport {
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self.client.request(to_reqwest(method), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|e| Error::Transport(format!("{} {}: {}", method, url, e)))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| Error::Transport(format!("reading body of {} {}: {}", method, url, e)))?;

        debug!(%method, url, status, "request complete");
        Ok(Response::new(status, parse_body(&text)))
    }
}

/// Index, document, and search calls against one cluster.
pub struct ElasticsearchClient<T = HttpTransport> {
    transport: T,
    base_url: String,
}

impl ElasticsearchClient<HttpTransport> {
    pub fn from_config(cluster: &ClusterConfig) -> anyhow::Result<Self> {
        Ok(Self::new(HttpTransport::new(cluster)?, &cluster.base_url))
    }
}

impl<T: Transport> ElasticsearchClient<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn urls(&self, index: &str) -> ElasticUrls {
        ElasticUrls::new(&self.base_url, index)
    }

    /// Send to `endpoint`, which may be absolute or relative to the base URL.
    pub fn send(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<Response> {
        let url = resolve(&self.base_url, endpoint);
        self.transport.send(method, &url, body)
    }

    pub fn get_document(&self, index: &str, id: &str) -> Result<Response> {
        self.send(Method::Get, &self.urls(index).document(id), None)
    }

    pub fn search(&self, index: &str, query: &Query) -> Result<Response> {
        self.send(Method::Post, &self.urls(index).search(), Some(&query.to_value()))
    }

    /// Store `document`, under `id` when given, otherwise with a generated id.
    pub fn index_document(&self, index: &str, document: &Value, id: Option<&str>) -> Result<Response> {
        let urls = self.urls(index);
        let url = match id {
            Some(id) => urls.document(id),
            None => urls.add(),
        };
        self.send(Method::Post, &url, Some(document))
    }

    /// Partial update; `body` is sent as-is, e.g. `{"doc": {...}}`.
    pub fn update_document(&self, index: &str, id: &str, body: &Value) -> Result<Response> {
        self.send(Method::Post, &self.urls(index).update(id), Some(body))
    }

    /// True only when the index answers `200`; any failure counts as absent.
    pub fn index_exists(&self, index: &str) -> bool {
        match self.send(Method::Get, &self.urls(index).index(), None) {
            Ok(resp) => resp.status == 200,
            Err(e) => {
                debug!(index, error = %e, "index existence check failed");
                false
            }
        }
    }

    pub fn create_index(&self, index: &str, mappings: Value) -> Result<Response> {
        let body = json!({
            "mappings": mappings,
            "settings": { "number_of_shards": 1, "number_of_replicas": 1 }
        });
        self.send(Method::Put, &self.urls(index).index(), Some(&body))
    }

    pub fn delete_index(&self, index: &str) -> Result<Response> {
        self.send(Method::Delete, &self.urls(index).index(), None)
    }

    /// Scanner sharing this client's transport.
    pub fn scanner(&self) -> PaginatedScanner<&T> {
        PaginatedScanner::new(&self.transport, &self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elasticutils_core::query::QueryBuilder;
    use elasticutils_core::transport::memory::InMemoryEngine;

    const BASE: &str = "http://es.local:9200";

    #[test]
    fn basic_auth_header_value() {
        assert_eq!(basic_auth("elastic", "changeme"), "Basic ZWxhc3RpYzpjaGFuZ2VtZQ==");
    }

    #[test]
    fn parse_body_variants() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("not json"), json!("not json"));
    }

    #[test]
    fn document_round_trip_through_engine() {
        let engine = InMemoryEngine::new(BASE);
        let client = ElasticsearchClient::new(&engine, BASE);

        let created = client
            .index_document("books", &json!({"title": "Dune"}), Some("1"))
            .unwrap();
        assert_eq!(created.status, 201);

        let got = client.get_document("books", "1").unwrap();
        assert_eq!(got.body["_source"]["title"], "Dune");
        assert_eq!(client.get_document("books", "2").unwrap().status, 404);
    }

    #[test]
    fn index_lifecycle() {
        let engine = InMemoryEngine::new(BASE);
        let client = ElasticsearchClient::new(&engine, BASE);

        assert!(!client.index_exists("logs"));
        let resp = client.create_index("logs", json!({"properties": {}})).unwrap();
        assert!(resp.is_success());
        assert!(client.index_exists("logs"));

        let put = engine.requests().into_iter().find(|r| r.method == Method::Put).unwrap();
        assert_eq!(put.body.unwrap()["settings"]["number_of_shards"], 1);

        assert!(client.delete_index("logs").unwrap().is_success());
        assert!(!client.index_exists("logs"));
    }

    #[test]
    fn index_exists_is_false_on_transport_failure() {
        let engine = InMemoryEngine::new("http://other:9200");
        let client = ElasticsearchClient::new(&engine, BASE);
        assert!(!client.index_exists("logs"));
    }

    #[test]
    fn search_posts_built_query() {
        let engine = InMemoryEngine::new(BASE);
        engine.insert("logs", json!({"level": "warn"}));
        let client = ElasticsearchClient::new(&engine, BASE);

        let mut qb = QueryBuilder::new();
        qb.term("level", "warn").unwrap().query_size(5);
        let resp = client.search("logs", &qb.build()).unwrap();
        assert_eq!(resp.body["hits"]["hits"].as_array().unwrap().len(), 1);

        let sent = engine.requests().pop().unwrap();
        assert_eq!(sent.url, format!("{BASE}/logs/_search"));
        assert_eq!(sent.body.unwrap()["size"], 5);
    }

    #[test]
    fn scanner_shares_transport() {
        let engine = InMemoryEngine::new(BASE);
        for ts in 0..3 {
            engine.insert("logs", json!({"timestamp": ts}));
        }
        let client = ElasticsearchClient::new(&engine, BASE);
        let scanner = client.scanner();
        let pit = scanner.open("logs", "1m").unwrap();
        let (records, _) = scanner
            .collect(
                &pit,
                &QueryBuilder::new().build(),
                elasticutils_core::ScanOptions::new(),
            )
            .unwrap();
        assert_eq!(records.len(), 3);
    }
}

mod common;

use common::{dead_url, FakeCluster};
use elasticutils::client::{basic_auth, ElasticsearchClient};
use elasticutils::config::ClusterConfig;
use elasticutils_core::query::QueryBuilder;
use elasticutils_core::scan::{ScanOptions, ScanState};
use elasticutils_core::transport::Method;
use elasticutils_core::Error;
use serde_json::json;

fn cluster_config(base_url: &str, user: Option<&str>) -> ClusterConfig {
    ClusterConfig {
        base_url: base_url.to_string(),
        username: user.map(String::from),
        password: user.map(|_| "s3cret".to_string()),
        password_env: None,
        timeout_secs: 5,
        accept_invalid_certs: false,
    }
}

#[test]
fn test_basic_auth_sent_on_every_request() {
    let cluster = FakeCluster::start();
    let client =
        ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, Some("ops"))).unwrap();

    assert!(!client.index_exists("metrics"));
    client.create_index("metrics", json!({})).unwrap();
    assert!(client.index_exists("metrics"));

    let headers = cluster.auth_headers();
    assert_eq!(headers.len(), 3);
    let expected = basic_auth("ops", "s3cret");
    assert!(headers.iter().all(|h| h.as_deref() == Some(expected.as_str())));
}

#[test]
fn test_no_auth_header_without_username() {
    let cluster = FakeCluster::start();
    let client = ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, None)).unwrap();
    client.index_exists("anything");
    assert_eq!(cluster.auth_headers(), vec![None]);
}

#[test]
fn test_document_calls_over_http() {
    let cluster = FakeCluster::start();
    let client = ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, None)).unwrap();

    let created = client
        .index_document("books", &json!({"title": "Ubik", "year": 1969}), Some("ubik"))
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.body["result"], "created");

    let fetched = client.get_document("books", "ubik").unwrap();
    assert_eq!(fetched.body["_source"]["year"], 1969);

    let generated = client
        .index_document("books", &json!({"title": "Valis"}), None)
        .unwrap();
    assert!(generated.body["_id"].as_str().is_some());
    assert_eq!(cluster.engine.count("books"), 2);

    let missing = client.get_document("books", "nope").unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["found"], false);
}

#[test]
fn test_search_over_http() {
    let cluster = FakeCluster::start();
    for n in 0..15 {
        cluster.engine.insert("logs", json!({"n": n}));
    }
    let client = ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, None)).unwrap();

    let mut qb = QueryBuilder::new();
    qb.match_query("message", "hello").unwrap().from_size(10, 10);
    let resp = client.search("logs", &qb.build()).unwrap();

    assert!(resp.is_success());
    assert_eq!(resp.body["hits"]["total"]["value"], 15);
    assert_eq!(resp.body["hits"]["hits"].as_array().unwrap().len(), 5);
}

#[test]
fn test_scan_over_http() {
    let cluster = FakeCluster::start();
    for ts in 0..23 {
        cluster.engine.insert("events", json!({"timestamp": ts}));
    }
    let client = ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, None)).unwrap();
    let scanner = client.scanner();

    let pit = scanner.open("events", "1m").unwrap();
    let mut scan = scanner
        .scan(&pit, &QueryBuilder::new().build(), ScanOptions::new().batch_size(5))
        .unwrap();
    let stamps: Vec<i64> = scan
        .by_ref()
        .map(|hit| hit.unwrap().source["timestamp"].as_i64().unwrap())
        .collect();

    assert_eq!(stamps, (0..23).rev().collect::<Vec<_>>());
    assert_eq!(scan.state(), ScanState::Exhausted);
    assert_eq!(scan.pages(), 6);

    let report = scanner.close_pit(&pit).unwrap();
    assert!(report.succeeded);
    assert_eq!(cluster.engine.open_snapshots(), 0);
}

#[test]
fn test_retrieval_error_carries_status() {
    let cluster = FakeCluster::start();
    for ts in 0..10 {
        cluster.engine.insert("events", json!({"timestamp": ts}));
    }
    cluster.engine.fail_search(1, 429);
    let client = ElasticsearchClient::from_config(&cluster_config(&cluster.base_url, None)).unwrap();
    let scanner = client.scanner();
    let pit = scanner.open("events", "1m").unwrap();

    let err = scanner
        .collect(&pit, &QueryBuilder::new().build(), ScanOptions::new())
        .unwrap_err();
    match err {
        Error::Retrieval { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body["error"]["type"], "injected_fault");
        }
        other => panic!("expected retrieval error, got {other:?}"),
    }
}

#[test]
fn test_unreachable_cluster_is_transport_error() {
    let base = dead_url();
    let client = ElasticsearchClient::from_config(&cluster_config(&base, None)).unwrap();

    assert!(!client.index_exists("logs"));
    let err = client.send(Method::Get, "_cluster/health", None).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(matches!(
        client.scanner().open("logs", "1m").unwrap_err(),
        Error::Transport(_)
    ));
}

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use common::FakeCluster;
use serde_json::{json, Value};
use tempfile::TempDir;

fn esu_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_esu"))
}

fn run_esu(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = esu_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run esu binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn setup(extra: &str) -> (TempDir, FakeCluster, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let cluster = FakeCluster::start();
    let config_path = cluster.write_config(tmp.path(), extra);
    (tmp, cluster, config_path)
}

fn ndjson(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_query_needs_no_config() {
    let (stdout, stderr, success) = run_esu(
        Path::new("/nonexistent/esu.toml"),
        &[
            "query",
            "--compact",
            "--match",
            "status=active",
            "--term",
            "age=18",
        ],
    );
    assert!(success, "query failed: {}", stderr);
    let q: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(
        q,
        json!({"query": {"bool": {
            "must": [{"match": {"status": "active"}}],
            "filter": [{"term": {"age": 18}}]
        }}})
    );
}

#[test]
fn test_query_uses_configured_date_field() {
    let (_tmp, _cluster, config_path) = setup("[scan]\ndate_field = \"@timestamp\"\n");
    let (stdout, _, success) = run_esu(&config_path, &["query", "--since", "2024-03-01"]);
    assert!(success);
    let q: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        q["query"]["range"]["@timestamp"]["gte"],
        "2024-03-01T00:00:00"
    );
}

#[test]
fn test_query_rejects_bad_sort_order() {
    let (_, stderr, success) = run_esu(
        Path::new("/nonexistent/esu.toml"),
        &["query", "--sort", "timestamp:sideways"],
    );
    assert!(!success);
    assert!(stderr.contains("sideways"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("esu.toml");
    fs::write(&config_path, "[cluster]\nbase_url = \"localhost:9200\"\n").unwrap();

    let (_, stderr, success) = run_esu(&config_path, &["get", "logs", "1"]);
    assert!(!success);
    assert!(stderr.contains("base_url"), "stderr: {}", stderr);
}

#[test]
fn test_scan_streams_ndjson() {
    let (_tmp, cluster, config_path) = setup("[scan]\nbatch_size = 4\n");
    for ts in 0..10 {
        cluster
            .engine
            .insert("logs", json!({"timestamp": ts, "level": "info"}));
    }

    let (stdout, stderr, success) =
        run_esu(&config_path, &["scan", "logs", "--progress", "off"]);
    assert!(success, "scan failed: {}", stderr);

    let records = ndjson(&stdout);
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["timestamp"], 9);
    assert_eq!(records[9]["timestamp"], 0);
    assert!(stderr.contains("cursor: ["), "stderr: {}", stderr);
    assert_eq!(cluster.engine.open_snapshots(), 0);
}

#[test]
fn test_scan_limit_then_resume() {
    let (_tmp, cluster, config_path) = setup("");
    for ts in 0..9 {
        cluster.engine.insert("logs", json!({"timestamp": ts}));
    }

    let (first, stderr, success) = run_esu(
        &config_path,
        &[
            "scan",
            "logs",
            "--batch-size",
            "2",
            "--max-records",
            "5",
            "--progress",
            "json",
        ],
    );
    assert!(success, "scan failed: {}", stderr);
    assert_eq!(ndjson(&first).len(), 5);
    assert!(stderr.contains("\"limit_reached\""), "stderr: {}", stderr);

    let cursor = stderr
        .lines()
        .find_map(|l| l.strip_prefix("cursor: "))
        .expect("cursor line")
        .to_string();

    let (rest, stderr, success) = run_esu(
        &config_path,
        &["scan", "logs", "--after", cursor.as_str(), "--progress", "off"],
    );
    assert!(success, "resume failed: {}", stderr);
    let stamps: Vec<i64> = ndjson(&first)
        .iter()
        .chain(ndjson(&rest).iter())
        .map(|r| r["timestamp"].as_i64().unwrap())
        .collect();
    assert_eq!(stamps, vec![8, 7, 6, 5, 4, 3, 2, 1, 0]);
}

#[test]
fn test_scan_missing_index_fails() {
    let (_tmp, _cluster, config_path) = setup("");
    let (_, stderr, success) = run_esu(&config_path, &["scan", "nope", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("snapshot"), "stderr: {}", stderr);
}

#[test]
fn test_pit_open_and_close() {
    let (_tmp, cluster, config_path) = setup("");
    cluster.engine.create_index("logs");

    let (stdout, stderr, success) = run_esu(&config_path, &["pit", "open", "logs"]);
    assert!(success, "pit open failed: {}", stderr);
    let id = stdout.trim().to_string();
    assert_eq!(cluster.engine.open_snapshots(), 1);

    let (stdout, _, success) = run_esu(&config_path, &["pit", "close", id.as_str()]);
    assert!(success);
    let report: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["succeeded"], true);
    assert_eq!(report["num_freed"], 1);

    let (stdout, _, success) = run_esu(&config_path, &["pit", "close", id.as_str()]);
    assert!(success);
    let report: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["succeeded"], false);
}

#[test]
fn test_document_commands() {
    let (_tmp, _cluster, config_path) = setup("");

    let (_, stderr, success) = run_esu(
        &config_path,
        &["put", "books", "{\"title\": \"Dune\"}", "--id", "dune"],
    );
    assert!(success, "put failed: {}", stderr);

    let (_, stderr, success) = run_esu(
        &config_path,
        &["update", "books", "dune", "{\"year\": 1965}"],
    );
    assert!(success, "update failed: {}", stderr);

    let (stdout, _, success) = run_esu(&config_path, &["get", "books", "dune"]);
    assert!(success);
    let doc: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc, json!({"title": "Dune", "year": 1965}));

    let (_, _, success) = run_esu(&config_path, &["update", "books", "nope", "{\"a\": 1}"]);
    assert!(!success);

    let (_, stderr, success) = run_esu(&config_path, &["get", "books", "missing"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_index_commands() {
    let (tmp, _cluster, config_path) = setup("");
    let mappings = tmp.path().join("mappings.json");
    fs::write(&mappings, r#"{"properties": {"timestamp": {"type": "date"}}}"#).unwrap();

    let (stdout, _, success) = run_esu(&config_path, &["index", "exists", "metrics"]);
    assert!(!success);
    assert_eq!(stdout.trim(), "false");

    let (_, stderr, success) = run_esu(
        &config_path,
        &[
            "index",
            "create",
            "metrics",
            "--mappings",
            mappings.to_str().unwrap(),
        ],
    );
    assert!(success, "create failed: {}", stderr);

    let (stdout, _, success) = run_esu(&config_path, &["index", "exists", "metrics"]);
    assert!(success);
    assert_eq!(stdout.trim(), "true");

    let (_, stderr, success) = run_esu(
        &config_path,
        &["index", "create", "metrics"],
    );
    assert!(!success);
    assert!(stderr.contains("400"), "stderr: {}", stderr);

    let (_, _, success) = run_esu(&config_path, &["index", "delete", "metrics"]);
    assert!(success);
}

#[test]
fn test_search_hits_only() {
    let (_tmp, cluster, config_path) = setup("");
    cluster.engine.insert("logs", json!({"msg": "a"}));
    cluster.engine.insert("logs", json!({"msg": "b"}));

    let (stdout, stderr, success) =
        run_esu(&config_path, &["search", "logs", "--hits-only", "--size", "1"]);
    assert!(success, "search failed: {}", stderr);
    assert_eq!(ndjson(&stdout), vec![json!({"msg": "a"})]);
}

#[test]
fn test_completions() {
    let (stdout, _, success) = run_esu(Path::new("/nonexistent/esu.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("esu"));
}

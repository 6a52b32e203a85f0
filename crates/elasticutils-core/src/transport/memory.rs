//! In-memory [`Transport`] that behaves like a single-node search engine.
//!
//! Supports just enough of the protocol to exercise the scanner:
//!
//! | Request | Behaviour |
//! |---------|-----------|
//! | `POST {base}/{index}/_search/point_in_time?keep_alive=..` | freeze a copy of the index, return `{"id"}`; `404` for unknown indexes |
//! | `POST {base}/_search` with `pit` | sort the snapshot, apply `search_after`, `size`, `_source` |
//! | `POST {base}/{index}/_search` | `from`/`size` window over the live index |
//! | `DELETE {base}/_search/point_in_time` | drop snapshots, `404` when none were found |
//! | `GET/PUT/DELETE {base}/{index}` | existence, create, delete |
//! | `GET/POST {base}/{index}/_doc[/{id}]` | fetch and insert documents |
//! | `POST {base}/{index}/_update/{id}` | merge `doc` into a stored document |
//!
//! Queries are not evaluated: every document matches. Like the real engine,
//! each hit's `sort` array ends with an implicit `_shard_doc` tie-breaker, so
//! the order is total even when sort fields repeat.
//!
//! Uses `Mutex` for interior mutability so a shared engine can sit behind a
//! test HTTP server thread.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use super::{Method, Response, Transport};
use crate::error::{Error, Result};

/// A request as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    source: Value,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Status(u16),
    Transport,
}

#[derive(Default)]
struct State {
    indexes: BTreeMap<String, Vec<StoredDoc>>,
    snapshots: HashMap<String, Vec<StoredDoc>>,
    next_pit: u64,
    next_doc: u64,
    searches: u64,
    faults: HashMap<u64, Fault>,
    requests: Vec<RecordedRequest>,
}

/// Simulated engine for tests and demos.
pub struct InMemoryEngine {
    base_url: String,
    state: Mutex<State>,
}

impl InMemoryEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn create_index(&self, index: &str) {
        let mut state = self.state.lock().unwrap();
        state.indexes.entry(index.to_string()).or_default();
    }

    /// Add a document with a generated id, creating the index if needed.
    pub fn insert(&self, index: &str, source: Value) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_doc += 1;
        let id = format!("doc-{}", state.next_doc);
        state
            .indexes
            .entry(index.to_string())
            .or_default()
            .push(StoredDoc {
                id: id.clone(),
                source,
            });
        id
    }

    /// Number of documents currently in `index` (not in any snapshot).
    pub fn count(&self, index: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.indexes.get(index).map(Vec::len).unwrap_or(0)
    }

    pub fn open_snapshots(&self) -> usize {
        self.state.lock().unwrap().snapshots.len()
    }

    /// Answer the `nth` search request (1-based) with `status`.
    pub fn fail_search(&self, nth: u64, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.faults.insert(nth, Fault::Status(status));
    }

    /// Drop the `nth` search request (1-based) without a response.
    pub fn fail_transport_on_search(&self, nth: u64) {
        let mut state = self.state.lock().unwrap();
        state.faults.insert(nth, Fault::Transport);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    fn route(&self, state: &mut State, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let rest = url
            .strip_prefix(&self.base_url)
            .ok_or_else(|| Error::Transport(format!("no route to {}", url)))?;
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };
        let decoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

        match (method, segments.as_slice()) {
            (Method::Post, ["_search"]) => search(state, body),
            (Method::Post, [index, "_search"]) => Ok(index_search(state, index, body)),
            (Method::Delete, ["_search", "point_in_time"]) => Ok(close_snapshots(state, body)),
            (Method::Post, [index, "_search", "point_in_time"]) => {
                Ok(open_snapshot(state, index, query))
            }
            (Method::Get, [index]) => Ok(match state.indexes.get(*index) {
                Some(_) => {
                    let mut body = Map::new();
                    body.insert(index.to_string(), json!({}));
                    Response::new(200, Value::Object(body))
                }
                None => index_not_found(index),
            }),
            (Method::Put, [index]) => {
                if state.indexes.contains_key(*index) {
                    return Ok(Response::new(
                        400,
                        json!({"error": {"type": "resource_already_exists_exception"}}),
                    ));
                }
                state.indexes.insert(index.to_string(), Vec::new());
                Ok(Response::new(200, json!({"acknowledged": true, "index": index})))
            }
            (Method::Delete, [index]) => Ok(match state.indexes.remove(*index) {
                Some(_) => Response::new(200, json!({"acknowledged": true})),
                None => index_not_found(index),
            }),
            (Method::Get, [index, "_doc", id]) => Ok(get_doc(state, index, id)),
            (Method::Post, [index, "_doc"]) => {
                state.next_doc += 1;
                let id = format!("doc-{}", state.next_doc);
                Ok(put_doc(state, index, &id, body))
            }
            (Method::Post, [index, "_doc", id]) => Ok(put_doc(state, index, id, body)),
            (Method::Post, [index, "_update", id]) => Ok(update_doc(state, index, id, body)),
            _ => Ok(Response::new(
                400,
                json!({"error": {"type": "illegal_argument_exception", "reason": format!("unsupported {} {}", method, path)}}),
            )),
        }
    }
}

impl Transport for InMemoryEngine {
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });

        let is_search = method == Method::Post && url.trim_end_matches('/').ends_with("/_search");
        if is_search {
            state.searches += 1;
            let nth = state.searches;
            match state.faults.get(&nth) {
                Some(Fault::Transport) => {
                    return Err(Error::Transport(format!("connection reset on {}", url)))
                }
                Some(Fault::Status(status)) => {
                    return Ok(Response::new(
                        *status,
                        json!({"error": {"type": "injected_fault"}, "status": status}),
                    ))
                }
                None => {}
            }
        }

        self.route(&mut state, method, url, body)
    }
}

fn index_not_found(index: &str) -> Response {
    Response::new(
        404,
        json!({"error": {"type": "index_not_found_exception", "index": index}, "status": 404}),
    )
}

fn open_snapshot(state: &mut State, index: &str, query: Option<&str>) -> Response {
    let has_keep_alive = query
        .map(|q| q.split('&').any(|kv| kv.starts_with("keep_alive=")))
        .unwrap_or(false);
    if !has_keep_alive {
        return Response::new(
            400,
            json!({"error": {"type": "action_request_validation_exception", "reason": "keep_alive is missing"}}),
        );
    }
    let docs = match state.indexes.get(index) {
        Some(docs) => docs.clone(),
        None => return index_not_found(index),
    };
    state.next_pit += 1;
    let id = format!("pit-{}-{}", index, state.next_pit);
    state.snapshots.insert(id.clone(), docs);
    Response::new(200, json!({ "id": id }))
}

fn close_snapshots(state: &mut State, body: Option<&Value>) -> Response {
    let ids: Vec<&str> = body
        .and_then(|b| b.get("pit_id"))
        .map(|v| match v {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(s) => vec![s.as_str()],
            _ => Vec::new(),
        })
        .unwrap_or_default();

    let freed = ids
        .iter()
        .filter(|id| state.snapshots.remove(**id).is_some())
        .count();
    if freed == 0 {
        Response::new(404, json!({"succeeded": false, "num_freed": 0}))
    } else {
        Response::new(200, json!({"succeeded": true, "num_freed": freed}))
    }
}

fn search(state: &mut State, body: Option<&Value>) -> Result<Response> {
    let body = match body {
        Some(b) => b,
        None => return Ok(bad_request("search body is required")),
    };
    let pit_id = match body.pointer("/pit/id").and_then(Value::as_str) {
        Some(id) => id,
        None => return Ok(bad_request("only point-in-time searches are supported")),
    };
    let docs = match state.snapshots.get(pit_id) {
        Some(docs) => docs,
        None => {
            return Ok(Response::new(
                404,
                json!({"error": {"type": "search_context_missing_exception"}, "status": 404}),
            ))
        }
    };

    let sort = parse_sort(body.get("sort"));
    let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
    let after = body.get("search_after").and_then(Value::as_array);
    let fields: Option<Vec<&str>> = body
        .get("_source")
        .and_then(Value::as_array)
        .map(|f| f.iter().filter_map(Value::as_str).collect());

    let mut keyed: Vec<(Vec<Value>, &StoredDoc)> = docs
        .iter()
        .enumerate()
        .map(|(pos, doc)| {
            let mut key: Vec<Value> = sort
                .iter()
                .map(|(field, _)| doc.source.get(field).cloned().unwrap_or(Value::Null))
                .collect();
            key.push(json!(pos));
            (key, doc)
        })
        .collect();
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, &sort));

    let total = keyed.len();
    let hits: Vec<Value> = keyed
        .into_iter()
        .filter(|(key, _)| match after {
            Some(after) => compare_keys(key, after, &sort) == Ordering::Greater,
            None => true,
        })
        .take(size)
        .map(|(key, doc)| {
            json!({
                "_id": doc.id,
                "_source": project(&doc.source, fields.as_deref()),
                "sort": key,
            })
        })
        .collect();

    Ok(Response::new(
        200,
        json!({
            "pit_id": pit_id,
            "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
        }),
    ))
}

/// Plain `from`/`size` search over the live index.
fn index_search(state: &State, index: &str, body: Option<&Value>) -> Response {
    let docs = match state.indexes.get(index) {
        Some(docs) => docs,
        None => return index_not_found(index),
    };
    let size = body
        .and_then(|b| b.get("size"))
        .and_then(Value::as_u64)
        .unwrap_or(10) as usize;
    let from = body
        .and_then(|b| b.get("from"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let fields: Option<Vec<&str>> = body
        .and_then(|b| b.get("_source"))
        .and_then(Value::as_array)
        .map(|f| f.iter().filter_map(Value::as_str).collect());

    let hits: Vec<Value> = docs
        .iter()
        .skip(from)
        .take(size)
        .map(|doc| {
            json!({
                "_index": index,
                "_id": doc.id,
                "_source": project(&doc.source, fields.as_deref()),
            })
        })
        .collect();
    Response::new(
        200,
        json!({"hits": {"total": {"value": docs.len(), "relation": "eq"}, "hits": hits}}),
    )
}

fn bad_request(reason: &str) -> Response {
    Response::new(
        400,
        json!({"error": {"type": "illegal_argument_exception", "reason": reason}}),
    )
}

/// `[(field, descending)]` from `[{field: {"order": ..}}]`.
fn parse_sort(sort: Option<&Value>) -> Vec<(String, bool)> {
    sort.and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|obj| obj.iter())
                .map(|(field, spec)| {
                    let desc = spec.get("order").and_then(Value::as_str) == Some("desc");
                    (field.clone(), desc)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Compare sort keys field by field; the trailing tie-breaker is ascending.
fn compare_keys(a: &[Value], b: &[Value], sort: &[(String, bool)]) -> Ordering {
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let ord = compare_values(x, y);
        let ord = match sort.get(i) {
            Some((_, true)) => ord.reverse(),
            _ => ord,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        // missing values sort last
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn project(source: &Value, fields: Option<&[&str]>) -> Value {
    match (fields, source.as_object()) {
        (Some(fields), Some(obj)) => {
            let picked: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(picked)
        }
        _ => source.clone(),
    }
}

fn get_doc(state: &State, index: &str, id: &str) -> Response {
    let docs = match state.indexes.get(index) {
        Some(docs) => docs,
        None => return index_not_found(index),
    };
    match docs.iter().find(|d| d.id == id) {
        Some(doc) => Response::new(
            200,
            json!({"_index": index, "_id": doc.id, "found": true, "_source": doc.source}),
        ),
        None => Response::new(404, json!({"_index": index, "_id": id, "found": false})),
    }
}

fn put_doc(state: &mut State, index: &str, id: &str, body: Option<&Value>) -> Response {
    let source = body.cloned().unwrap_or_else(|| json!({}));
    let docs = state.indexes.entry(index.to_string()).or_default();
    let result = match docs.iter().position(|d| d.id == id) {
        Some(pos) => {
            docs[pos].source = source;
            "updated"
        }
        None => {
            docs.push(StoredDoc {
                id: id.to_string(),
                source,
            });
            "created"
        }
    };
    let status = if result == "created" { 201 } else { 200 };
    Response::new(status, json!({"_index": index, "_id": id, "result": result}))
}

/// Shallow-merge `body.doc` into an existing document.
fn update_doc(state: &mut State, index: &str, id: &str, body: Option<&Value>) -> Response {
    let patch = match body.and_then(|b| b.get("doc")).and_then(Value::as_object) {
        Some(patch) => patch,
        None => return bad_request("update requires a doc object"),
    };
    let docs = match state.indexes.get_mut(index) {
        Some(docs) => docs,
        None => return index_not_found(index),
    };
    let doc = match docs.iter_mut().find(|d| d.id == id) {
        Some(doc) => doc,
        None => {
            return Response::new(
                404,
                json!({"error": {"type": "document_missing_exception", "id": id}, "status": 404}),
            )
        }
    };
    if let Some(source) = doc.source.as_object_mut() {
        for (k, v) in patch {
            source.insert(k.clone(), v.clone());
        }
    }
    Response::new(200, json!({"_index": index, "_id": id, "result": "updated"}))
}

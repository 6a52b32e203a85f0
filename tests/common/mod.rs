#![allow(dead_code)]

//! A fake cluster for integration tests: an axum server on a background
//! thread that forwards every request to an `InMemoryEngine`.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method as HttpMethod, StatusCode, Uri};
use axum::{Json, Router};
use elasticutils_core::transport::memory::InMemoryEngine;
use elasticutils_core::transport::{Method, Transport};
use serde_json::{json, Value};

#[derive(Clone)]
struct Shared {
    engine: Arc<InMemoryEngine>,
    base_url: String,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

pub struct FakeCluster {
    pub base_url: String,
    pub engine: Arc<InMemoryEngine>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

impl FakeCluster {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let shared = Shared {
            engine: Arc::new(InMemoryEngine::new(&base_url)),
            base_url: base_url.clone(),
            auth: Arc::new(Mutex::new(Vec::new())),
        };
        let cluster = FakeCluster {
            base_url,
            engine: shared.engine.clone(),
            auth: shared.auth.clone(),
        };

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new().fallback(forward).with_state(shared);
                axum::serve(listener, app).await.unwrap();
            });
        });

        cluster
    }

    /// `Authorization` header of every request received so far.
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth.lock().unwrap().clone()
    }

    /// Write a config file pointing at this cluster.
    pub fn write_config(&self, dir: &std::path::Path, extra: &str) -> std::path::PathBuf {
        let path = dir.join("esu.toml");
        let content = format!(
            "[cluster]\nbase_url = \"{}\"\nusername = \"elastic\"\npassword = \"changeme\"\ntimeout_secs = 5\n\n{}",
            self.base_url, extra
        );
        std::fs::write(&path, content).unwrap();
        path
    }
}

async fn forward(
    State(shared): State<Shared>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    shared.auth.lock().unwrap().push(auth);

    let method = match method.as_str().parse::<Method>() {
        Ok(m) => m,
        Err(_) => return (StatusCode::METHOD_NOT_ALLOWED, Json(json!({}))),
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{}", shared.base_url, path);
    let body: Option<Value> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };

    match shared.engine.send(method, &url, body.as_ref()) {
        Ok(resp) => (
            StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(resp.body),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": {"type": "transport", "reason": e.to_string()}})),
        ),
    }
}

/// An address nothing listens on.
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

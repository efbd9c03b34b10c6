//! In-process servers for integration tests.
//!
//! `MockBridge` serves `POST /<action>` on an ephemeral 127.0.0.1 port from a background
//! thread and records every call it receives.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PROXY_PORT: i64 = 9978;

/// Serve `app` on an ephemeral loopback port from a background thread.
pub fn serve(app: Router) -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let port = listener.local_addr().expect("local addr").port();
    listener.set_nonblocking(true).expect("nonblocking listener");

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, app).await.expect("test server");
        });
    });

    port
}

#[derive(Clone, Default)]
pub struct MockBridge {
    store: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockBridge {
    /// Start serving and return the bridge with its port.
    pub fn start() -> (Self, u16) {
        let bridge = MockBridge::default();
        let app = Router::new()
            .route("/:action", post(handle))
            .with_state(bridge.clone());

        (bridge, serve(app))
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self, action: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .rev()
            .find(|(name, _)| name == action)
            .map(|(_, body)| body)
    }
}

fn text(body: &Value, field: &str) -> String {
    body.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn handle(
    State(bridge): State<MockBridge>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    bridge.calls.lock().unwrap().push((action.clone(), body.clone()));

    let response = match action.as_str() {
        "local.get" => {
            let store = bridge.store.lock().unwrap();
            let value = store
                .get(&text(&body, "key"))
                .cloned()
                .unwrap_or_else(|| text(&body, "default"));
            json!({ "value": value })
        }
        "local.set" => {
            let mut store = bridge.store.lock().unwrap();
            store.insert(text(&body, "key"), text(&body, "value"));
            json!({})
        }
        "local.delete" => {
            bridge.store.lock().unwrap().remove(&text(&body, "key"));
            json!({})
        }
        "md5" => json!({ "result": format!("md5:{}", text(&body, "data")) }),
        "aes.encrypt" => json!({ "result": format!("aes:{}:{}", text(&body, "data"), text(&body, "iv")) }),
        "s2t" => json!({ "result": text(&body, "text").replace('说', "說") }),
        "t2s" => json!({ "result": text(&body, "text").replace('說', "说") }),
        "getPort" => json!({ "port": PROXY_PORT }),
        "getProxy" => json!({ "url": format!("http://127.0.0.1:{}/proxy", PROXY_PORT) }),
        "joinUrl" => json!({
            "url": format!("{}/{}", text(&body, "base").trim_end_matches('/'), text(&body, "path").trim_start_matches('/'))
        }),
        // echo the request so tests can inspect what the transport sent
        "http" => json!({ "data": body.to_string() }),
        other => json!({ "error": format!("unsupported action: {}", other) }),
    };

    Json(response)
}

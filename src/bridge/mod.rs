// Bridge RPC Client
//
// Synchronous request/response client for the host-side bridge service.
// The bridge listens on 127.0.0.1:<port>; every action is a `POST /<action>`
// with a JSON body and answers with a JSON object.
//
// The client never raises past its public boundary: `call` folds every
// failure into `{"error": ...}`. Callers that need to tell failures apart use
// `try_call`, which keeps the `BridgeError` around.

use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

/// Why a bridge primitive could not be served.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge service not started")]
    NotStarted,
    #[error("bridge request failed: {0}")]
    Transport(String),
    #[error("bridge returned malformed response: {0}")]
    Decode(String),
    #[error("bridge error: {0}")]
    Remote(String),
}

/// Client for the loopback bridge. Cheap to clone; holds no connection.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    endpoint: Option<Url>,
}

impl BridgeClient {
    /// Create a client for the given port. A port <= 0 (or one that does not
    /// fit a TCP port) yields a client whose every call fails with
    /// `BridgeError::NotStarted`.
    pub fn new(port: i64) -> Self {
        let endpoint = if port > 0 && port <= u16::MAX as i64 {
            Url::parse(&format!("http://127.0.0.1:{}/", port)).ok()
        } else {
            None
        };

        Self { endpoint }
    }

    /// A client that is never connected.
    pub fn disabled() -> Self {
        Self { endpoint: None }
    }

    pub fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().and_then(|url| url.port())
    }

    /// Issue one action and return the decoded response object.
    ///
    /// An empty response body decodes to `{}`. A response carrying an
    /// `error` field is reported as `BridgeError::Remote`.
    pub fn try_call(&self, action: &str, data: &Value) -> Result<Map<String, Value>, BridgeError> {
        let endpoint = self.endpoint.as_ref().ok_or(BridgeError::NotStarted)?;
        let url = endpoint
            .join(action)
            .map_err(|e| BridgeError::Transport(format!("invalid action {}: {}", action, e)))?;

        let body = if data.is_null() {
            "{}".to_string()
        } else {
            data.to_string()
        };

        log::debug!("bridge call: {} ({} bytes)", action, body.len());

        let response = ureq::post(url.as_str())
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let text = response
            .into_string()
            .map_err(|e| BridgeError::Transport(format!("failed to read response body: {}", e)))?;

        parse_response(&text)
    }

    /// Fail-closed variant of `try_call`: failures come back as `{"error": message}`.
    pub fn call(&self, action: &str, data: &Value) -> Value {
        match self.try_call(action, data) {
            Ok(map) => Value::Object(map),
            Err(BridgeError::NotStarted) => {
                log::debug!("bridge call {} skipped: bridge not started", action);
                json!({ "error": BridgeError::NotStarted.to_string() })
            }
            Err(e) => {
                log::warn!("bridge call failed: {} - {}", action, e);
                json!({ "error": e.to_string() })
            }
        }
    }
}

fn parse_response(text: &str) -> Result<Map<String, Value>, BridgeError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(message)) => Err(BridgeError::Remote(message.clone())),
            Some(Value::Null) | None => Ok(map),
            Some(other) => Err(BridgeError::Remote(other.to_string())),
        },
        Ok(other) => Err(BridgeError::Decode(format!("expected object, got {}", other))),
        Err(e) => Err(BridgeError::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_port_disables_bridge() {
        assert!(!BridgeClient::new(0).is_available());
        assert!(!BridgeClient::new(-5).is_available());
        assert!(!BridgeClient::new(70_000).is_available());
        assert_eq!(BridgeClient::new(9978).port(), Some(9978));
    }

    #[test]
    fn test_disabled_call_fails_closed() {
        let client = BridgeClient::new(0);
        assert!(matches!(
            client.try_call("md5", &json!({"data": "x"})),
            Err(BridgeError::NotStarted)
        ));

        let value = client.call("md5", &json!({"data": "x"}));
        assert_eq!(value["error"], "bridge service not started");
    }

    #[test]
    fn test_parse_response_shapes() {
        assert!(parse_response("").unwrap().is_empty());
        assert!(parse_response("  \n").unwrap().is_empty());
        assert_eq!(parse_response(r#"{"result":"abc"}"#).unwrap()["result"], "abc");
        assert!(matches!(parse_response("not json"), Err(BridgeError::Decode(_))));
        assert!(matches!(parse_response("[1,2]"), Err(BridgeError::Decode(_))));
        assert!(matches!(
            parse_response(r#"{"error":"unknown action"}"#),
            Err(BridgeError::Remote(msg)) if msg == "unknown action"
        ));
    }
}

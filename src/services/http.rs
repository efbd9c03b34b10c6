// Outbound HTTP for extensions
//
// Two interchangeable transports behind one trait:
// - BridgeTransport delegates to the bridge `http` action
// - DirectTransport issues the request in-process with ureq
//
// Both return the raw response body as a string.

use crate::bridge::{BridgeClient, BridgeError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
const MAX_BODY_BYTES: u64 = 10_000_000;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("http request failed: {0}")]
    Request(String),
}

/// Request body as handed over by the extension.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Text(String),
    Json(Value),
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// Options object accepted from scripts: `{method, headers, data|body, timeout}`.
#[derive(Debug, Default, Deserialize)]
pub struct HttpOptions {
    pub method: Option<String>,
    pub headers: Option<Map<String, Value>>,
    pub data: Option<Value>,
    pub body: Option<Value>,
    pub timeout: Option<u64>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: RequestBody::None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn from_options(url: &str, options: HttpOptions, default_timeout: Duration) -> Self {
        let method = options
            .method
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();

        let headers = options
            .headers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect();

        // `data` wins over `body`; empty strings and null mean no body
        let body = match options.data.or(options.body) {
            None | Some(Value::Null) => RequestBody::None,
            Some(Value::String(s)) if s.is_empty() => RequestBody::None,
            Some(Value::String(s)) => RequestBody::Text(s),
            Some(Value::Bool(false)) => RequestBody::None,
            Some(other @ (Value::Object(_) | Value::Array(_))) => RequestBody::Json(other),
            Some(other) => RequestBody::Text(other.to_string()),
        };

        let timeout = options
            .timeout
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(default_timeout);

        Self {
            url: url.to_string(),
            method,
            headers,
            body,
            timeout,
        }
    }

    /// Only POST carries a body.
    fn sends_body(&self) -> bool {
        self.method == "POST" && self.body != RequestBody::None
    }
}

/// Strategy for issuing extension HTTP requests.
pub trait HttpTransport {
    fn name(&self) -> &'static str;
    fn execute(&self, request: &HttpRequest) -> Result<String, HttpError>;
}

/// Delegates requests to the bridge `http` action.
pub struct BridgeTransport {
    bridge: BridgeClient,
}

impl BridgeTransport {
    pub fn new(bridge: BridgeClient) -> Self {
        Self { bridge }
    }

    fn payload(request: &HttpRequest) -> Value {
        let mut payload = json!({
            "url": request.url,
            "method": request.method,
            "headers": request.headers,
        });

        if request.sends_body() {
            match &request.body {
                RequestBody::Text(text) => {
                    payload["data"] = Value::String(text.clone());
                }
                RequestBody::Json(value) => {
                    payload["data"] = Value::String(value.to_string());
                    payload["json"] = Value::Bool(true);
                }
                RequestBody::None => {}
            }
        }

        payload
    }
}

impl HttpTransport for BridgeTransport {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn execute(&self, request: &HttpRequest) -> Result<String, HttpError> {
        let response = self.bridge.try_call("http", &Self::payload(request))?;
        Ok(match response.get("data") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }
}

/// Issues requests in-process.
pub struct DirectTransport {
    default_headers: BTreeMap<String, String>,
}

impl DirectTransport {
    pub fn new() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        Self { default_headers }
    }

    /// Default headers first, caller headers override case-insensitively.
    fn merged_headers(&self, request: &HttpRequest) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = self
            .default_headers
            .iter()
            .filter(|(k, _)| {
                !request
                    .headers
                    .keys()
                    .any(|h| h.eq_ignore_ascii_case(k.as_str()))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.extend(request.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn execute(&self, request: &HttpRequest) -> Result<String, HttpError> {
        let agent = ureq::AgentBuilder::new().timeout(request.timeout).build();
        let mut req = agent.request(&request.method, &request.url);

        for (key, value) in self.merged_headers(request) {
            req = req.set(&key, &value);
        }

        log::info!(
            "http {} {}",
            request.method,
            request.url.chars().take(100).collect::<String>()
        );

        let result = if request.sends_body() {
            match &request.body {
                RequestBody::Json(value) => {
                    let has_content_type = request
                        .headers
                        .keys()
                        .any(|k| k.eq_ignore_ascii_case("content-type"));
                    if !has_content_type {
                        req = req.set("Content-Type", "application/json");
                    }
                    req.send_string(&value.to_string())
                }
                RequestBody::Text(text) => req.send_string(text),
                RequestBody::None => req.call(),
            }
        } else {
            req.call()
        };

        let response = match result {
            Ok(response) => response,
            // Error statuses still carry a body the extension may want to read
            Err(ureq::Error::Status(code, response)) => {
                log::debug!("http status {} for {}", code, request.url);
                response
            }
            Err(e) => return Err(HttpError::Request(e.to_string())),
        };

        // pages in legacy encodings (GBK and friends) are decoded lossily
        let mut bytes = Vec::new();
        if let Err(e) = response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
        {
            log::warn!("response body of {} cut short: {}", request.url, e);
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(value: Value) -> HttpOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_options_defaults() {
        let req = HttpRequest::from_options(
            "http://a",
            HttpOptions::default(),
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
        );
        assert_eq!(req.method, "GET");
        assert_eq!(req.body, RequestBody::None);
        assert_eq!(req.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_options_body_kinds() {
        let req = HttpRequest::from_options(
            "http://a",
            options(json!({"method": "post", "data": {"a": 1}, "timeout": 500})),
            Duration::from_secs(30),
        );
        assert_eq!(req.method, "POST");
        assert_eq!(req.body, RequestBody::Json(json!({"a": 1})));
        assert_eq!(req.timeout, Duration::from_millis(500));

        let req = HttpRequest::from_options(
            "http://a",
            options(json!({"method": "POST", "body": "a=1&b=2", "headers": {"X-N": 3}})),
            Duration::from_secs(30),
        );
        assert_eq!(req.body, RequestBody::Text("a=1&b=2".to_string()));
        assert_eq!(req.headers["X-N"], "3");
    }

    #[test]
    fn test_bridge_payload_marks_json_bodies() {
        let mut req = HttpRequest::get("http://a/api");
        req.method = "POST".to_string();
        req.body = RequestBody::Json(json!({"k": "v"}));

        let payload = BridgeTransport::payload(&req);
        assert_eq!(payload["json"], true);
        assert_eq!(payload["data"], r#"{"k":"v"}"#);

        req.body = RequestBody::Text("x=1".to_string());
        let payload = BridgeTransport::payload(&req);
        assert_eq!(payload["data"], "x=1");
        assert!(payload.get("json").is_none());
    }

    #[test]
    fn test_get_never_sends_body() {
        let mut req = HttpRequest::get("http://a/api");
        req.body = RequestBody::Text("ignored".to_string());
        let payload = BridgeTransport::payload(&req);
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let transport = DirectTransport::new();
        let mut req = HttpRequest::get("http://a");
        req.headers.insert("user-agent".to_string(), "okhttp".to_string());
        req.headers.insert("Referer".to_string(), "http://a/".to_string());

        let merged = transport.merged_headers(&req);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|(k, v)| k == "user-agent" && v == "okhttp"));
        assert!(!merged.iter().any(|(k, _)| k == "User-Agent"));
    }
}

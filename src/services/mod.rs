// Primitive Façade
//
// Typed host primitives for extensions: cache, hashing, ciphers, locale
// conversion, proxy/URL helpers and outbound HTTP. Each one delegates to the
// bridge and resolves to a fixed fallback when the bridge cannot serve it,
// so extension code never sees an error from here.

pub mod http;

use crate::bridge::{BridgeClient, BridgeError};
use crate::config::RunnerConfig;
use http::{BridgeTransport, DirectTransport, HttpRequest, HttpTransport};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Host services shared by every script binding of one invocation.
pub struct Services {
    bridge: BridgeClient,
    transport: Box<dyn HttpTransport>,
    http_timeout: Duration,
}

impl Services {
    /// Pick the HTTP transport once: bridge when available, direct otherwise.
    pub fn new(bridge: BridgeClient, http_timeout: Duration) -> Self {
        let transport: Box<dyn HttpTransport> = if bridge.is_available() {
            Box::new(BridgeTransport::new(bridge.clone()))
        } else {
            Box::new(DirectTransport::new())
        };

        log::debug!("http transport: {}", transport.name());

        Self {
            bridge,
            transport,
            http_timeout,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(BridgeClient::new(config.bridge_port), config.http_timeout)
    }

    pub fn with_transport(mut self, transport: Box<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    fn string_field(&self, action: &str, data: Value, field: &str) -> Result<String, BridgeError> {
        let response = self.bridge.try_call(action, &data)?;
        match non_empty(&response, field) {
            Some(value) => Ok(value),
            None => Err(BridgeError::Decode(format!("{} response has no {}", action, field))),
        }
    }

    fn unavailable(action: &str, err: &BridgeError) {
        match err {
            BridgeError::NotStarted => log::debug!("{} unavailable: {}", action, err),
            _ => log::warn!("{} unavailable: {}", action, err),
        }
    }

    // ---- cache ----

    /// Cached value for `key`, or `default` when missing or unreachable.
    pub fn cache_get(&self, key: &str, default: &str) -> String {
        self.string_field("local.get", json!({ "key": key, "default": default }), "value")
            .unwrap_or_else(|e| {
                Self::unavailable("local.get", &e);
                default.to_string()
            })
    }

    pub fn cache_set(&self, key: &str, value: &str) {
        if let Err(e) = self.bridge.try_call("local.set", &json!({ "key": key, "value": value })) {
            Self::unavailable("local.set", &e);
        }
    }

    pub fn cache_delete(&self, key: &str) {
        if let Err(e) = self.bridge.try_call("local.delete", &json!({ "key": key })) {
            Self::unavailable("local.delete", &e);
        }
    }

    // ---- crypto ----

    /// Hex MD5 digest, or an empty string when unavailable.
    pub fn md5(&self, data: &str) -> String {
        self.string_field("md5", json!({ "data": data }), "result")
            .unwrap_or_else(|e| {
                Self::unavailable("md5", &e);
                String::new()
            })
    }

    /// AES through the bridge. An empty `iv` selects ECB on the bridge side.
    /// `mode` is accepted for signature compatibility only.
    pub fn aes(&self, mode: &str, encrypt: bool, data: &str, key: &str, iv: &str) -> String {
        let action = if encrypt { "aes.encrypt" } else { "aes.decrypt" };
        log::debug!("{} mode={}", action, mode);
        self.string_field(action, json!({ "data": data, "key": key, "iv": iv }), "result")
            .unwrap_or_else(|e| {
                Self::unavailable(action, &e);
                String::new()
            })
    }

    pub fn rsa(&self, mode: &str, encrypt: bool, data: &str, key: &str) -> String {
        let action = if encrypt { "rsa.encrypt" } else { "rsa.decrypt" };
        log::debug!("{} mode={}", action, mode);
        self.string_field(action, json!({ "data": data, "key": key }), "result")
            .unwrap_or_else(|e| {
                Self::unavailable(action, &e);
                String::new()
            })
    }

    // ---- locale ----

    /// Simplified to traditional. Returns the input unchanged on failure.
    pub fn s2t(&self, text: &str) -> String {
        self.convert("s2t", text)
    }

    /// Traditional to simplified. Returns the input unchanged on failure.
    pub fn t2s(&self, text: &str) -> String {
        self.convert("t2s", text)
    }

    fn convert(&self, action: &str, text: &str) -> String {
        self.string_field(action, json!({ "text": text }), "result")
            .unwrap_or_else(|e| {
                Self::unavailable(action, &e);
                text.to_string()
            })
    }

    // ---- network ----

    /// Local proxy port, 0 when unknown.
    pub fn proxy_port(&self) -> i64 {
        match self.bridge.try_call("getPort", &json!({})) {
            Ok(response) => response
                .get("port")
                .and_then(|p| p.as_i64().or_else(|| p.as_str().and_then(|s| s.parse().ok())))
                .unwrap_or(0),
            Err(e) => {
                Self::unavailable("getPort", &e);
                0
            }
        }
    }

    /// Local proxy URL, empty when unknown.
    pub fn proxy_url(&self) -> String {
        self.string_field("getProxy", json!({}), "url")
            .unwrap_or_else(|e| {
                Self::unavailable("getProxy", &e);
                String::new()
            })
    }

    /// Resolve `path` against `base`. Returns `base` when the bridge cannot.
    pub fn join_url(&self, base: &str, path: &str) -> String {
        self.string_field("joinUrl", json!({ "base": base, "path": path }), "url")
            .unwrap_or_else(|e| {
                Self::unavailable("joinUrl", &e);
                base.to_string()
            })
    }

    /// Raw response body, empty on any failure.
    pub fn request(&self, request: &HttpRequest) -> String {
        match self.transport.execute(request) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("http {} {} failed: {}", request.method, request.url, e);
                String::new()
            }
        }
    }
}

/// Non-empty string value of `field`; numbers are stringified.
fn non_empty(response: &Map<String, Value>, field: &str) -> Option<String> {
    match response.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Services {
        Services::new(BridgeClient::new(0), Duration::from_millis(1000))
    }

    #[test]
    fn test_offline_fallbacks() {
        let services = offline();
        assert_eq!(services.cache_get("k", "d"), "d");
        assert_eq!(services.s2t("測試"), "測試");
        assert_eq!(services.t2s("测试"), "测试");
        assert_eq!(services.join_url("http://a", "b"), "http://a");
        assert_eq!(services.md5("abc"), "");
        assert_eq!(services.aes("CBC", true, "data", "key", "iv"), "");
        assert_eq!(services.rsa("PKCS1", false, "data", "key"), "");
        assert_eq!(services.proxy_port(), 0);
        assert_eq!(services.proxy_url(), "");

        // no-ops must not panic
        services.cache_set("k", "v");
        services.cache_delete("k");
    }

    #[test]
    fn test_offline_uses_direct_transport() {
        assert_eq!(offline().transport_name(), "direct");
        let online = Services::new(BridgeClient::new(9978), Duration::from_millis(1000));
        assert_eq!(online.transport_name(), "bridge");
    }

    #[test]
    fn test_non_empty_field() {
        let map: Map<String, Value> =
            serde_json::from_str(r#"{"a":"x","b":"","c":5,"d":null}"#).unwrap();
        assert_eq!(non_empty(&map, "a").as_deref(), Some("x"));
        assert_eq!(non_empty(&map, "b"), None);
        assert_eq!(non_empty(&map, "c").as_deref(), Some("5"));
        assert_eq!(non_empty(&map, "d"), None);
        assert_eq!(non_empty(&map, "e"), None);
    }
}

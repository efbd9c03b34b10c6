//! Per-method decoding of raw CLI strings.
//!
//! Arguments are positional, left to right. Missing positions never fail:
//! strings default to `""`, flags to `false`, pages to `"1"`, and structured
//! arguments to an empty object or array. A flag is `true` only for the exact
//! literal `"true"`.

use super::DispatchError;
use crate::extensions::types::Method;
use serde_json::{Map, Value};

/// Typed parameters of one lifecycle call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallParams {
    Init {
        extend: String,
    },
    HomeContent {
        filter: bool,
    },
    HomeVideoContent,
    CategoryContent {
        tid: String,
        pg: String,
        filter: bool,
        extend: Map<String, Value>,
    },
    DetailContent {
        ids: Vec<Value>,
    },
    SearchContent {
        key: String,
        quick: bool,
        pg: String,
    },
    PlayerContent {
        flag: String,
        id: String,
        vip_flags: Vec<Value>,
    },
    LiveContent {
        url: String,
    },
    Proxy {
        params: Map<String, Value>,
    },
    Action {
        action: String,
    },
    Destroy,
}

struct RawArgs<'a> {
    method: Method,
    args: &'a [String],
}

impl<'a> RawArgs<'a> {
    fn raw(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).map(String::as_str)
    }

    fn string(&self, index: usize) -> String {
        self.raw(index).unwrap_or_default().to_string()
    }

    fn page(&self, index: usize) -> String {
        match self.raw(index) {
            Some(pg) if !pg.is_empty() => pg.to_string(),
            _ => "1".to_string(),
        }
    }

    fn flag(&self, index: usize) -> bool {
        self.raw(index) == Some("true")
    }

    fn json(&self, index: usize, param: &'static str) -> Result<Option<Value>, DispatchError> {
        match self.raw(index) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str::<Value>(raw)
                .map(|v| if v.is_null() { None } else { Some(v) })
                .map_err(|e| self.decode_error(param, e.to_string())),
        }
    }

    fn object(&self, index: usize, param: &'static str) -> Result<Map<String, Value>, DispatchError> {
        match self.json(index, param)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(self.decode_error(param, format!("expected a JSON object, got {}", other))),
        }
    }

    fn array(&self, index: usize, param: &'static str) -> Result<Vec<Value>, DispatchError> {
        match self.json(index, param)? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(self.decode_error(param, format!("expected a JSON array, got {}", other))),
        }
    }

    fn decode_error(&self, param: &'static str, reason: String) -> DispatchError {
        DispatchError::Decode {
            method: self.method,
            param,
            reason,
        }
    }
}

impl CallParams {
    pub fn decode(method: Method, args: &[String]) -> Result<Self, DispatchError> {
        let a = RawArgs { method, args };

        Ok(match method {
            Method::Init => CallParams::Init { extend: a.string(0) },
            Method::HomeContent => CallParams::HomeContent { filter: a.flag(0) },
            Method::HomeVideoContent => CallParams::HomeVideoContent,
            Method::CategoryContent => CallParams::CategoryContent {
                tid: a.string(0),
                pg: a.page(1),
                filter: a.flag(2),
                extend: a.object(3, "extend")?,
            },
            Method::DetailContent => CallParams::DetailContent {
                ids: a.array(0, "ids")?,
            },
            Method::SearchContent => CallParams::SearchContent {
                key: a.string(0),
                quick: a.flag(1),
                pg: a.page(2),
            },
            Method::PlayerContent => CallParams::PlayerContent {
                flag: a.string(0),
                id: a.string(1),
                vip_flags: a.array(2, "vipFlags")?,
            },
            Method::LiveContent => CallParams::LiveContent { url: a.string(0) },
            Method::Proxy => CallParams::Proxy {
                params: a.object(0, "params")?,
            },
            Method::Action => CallParams::Action { action: a.string(0) },
            Method::Destroy => CallParams::Destroy,
        })
    }

    pub fn method(&self) -> Method {
        match self {
            CallParams::Init { .. } => Method::Init,
            CallParams::HomeContent { .. } => Method::HomeContent,
            CallParams::HomeVideoContent => Method::HomeVideoContent,
            CallParams::CategoryContent { .. } => Method::CategoryContent,
            CallParams::DetailContent { .. } => Method::DetailContent,
            CallParams::SearchContent { .. } => Method::SearchContent,
            CallParams::PlayerContent { .. } => Method::PlayerContent,
            CallParams::LiveContent { .. } => Method::LiveContent,
            CallParams::Proxy { .. } => Method::Proxy,
            CallParams::Action { .. } => Method::Action,
            CallParams::Destroy => Method::Destroy,
        }
    }

    /// Positional arguments in call order.
    pub fn to_args(&self) -> Vec<Value> {
        match self {
            CallParams::Init { extend } => vec![Value::from(extend.as_str())],
            CallParams::HomeContent { filter } => vec![Value::Bool(*filter)],
            CallParams::HomeVideoContent | CallParams::Destroy => Vec::new(),
            CallParams::CategoryContent {
                tid,
                pg,
                filter,
                extend,
            } => vec![
                Value::from(tid.as_str()),
                Value::from(pg.as_str()),
                Value::Bool(*filter),
                Value::Object(extend.clone()),
            ],
            CallParams::DetailContent { ids } => vec![Value::Array(ids.clone())],
            CallParams::SearchContent { key, quick, pg } => vec![
                Value::from(key.as_str()),
                Value::Bool(*quick),
                Value::from(pg.as_str()),
            ],
            CallParams::PlayerContent { flag, id, vip_flags } => vec![
                Value::from(flag.as_str()),
                Value::from(id.as_str()),
                Value::Array(vip_flags.clone()),
            ],
            CallParams::LiveContent { url } => vec![Value::from(url.as_str())],
            CallParams::Proxy { params } => vec![Value::Object(params.clone())],
            CallParams::Action { action } => vec![Value::from(action.as_str())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(method: Method, raw: &[&str]) -> Result<CallParams, DispatchError> {
        let args: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        CallParams::decode(method, &args)
    }

    #[test]
    fn test_category_defaults() {
        let params = decode(Method::CategoryContent, &["1"]).unwrap();
        assert_eq!(
            params,
            CallParams::CategoryContent {
                tid: "1".to_string(),
                pg: "1".to_string(),
                filter: false,
                extend: Map::new(),
            }
        );
    }

    #[test]
    fn test_flag_requires_exact_literal() {
        for raw in ["TRUE", "True", "1", "", "yes", " true"] {
            assert_eq!(
                decode(Method::HomeContent, &[raw]).unwrap(),
                CallParams::HomeContent { filter: false },
                "{:?} must decode to false",
                raw
            );
        }
        assert_eq!(
            decode(Method::HomeContent, &["true"]).unwrap(),
            CallParams::HomeContent { filter: true }
        );
        assert_eq!(
            decode(Method::HomeContent, &[]).unwrap(),
            CallParams::HomeContent { filter: false }
        );
    }

    #[test]
    fn test_ids_decode_reproduces_the_encoded_array() {
        let ids = json!(["1", "2"]);
        let raw = ids.to_string();
        let params = decode(Method::DetailContent, &[&raw]).unwrap();
        assert_eq!(params.to_args(), vec![ids]);
    }

    #[test]
    fn test_search_and_player_defaults() {
        assert_eq!(
            decode(Method::SearchContent, &["海贼王"]).unwrap(),
            CallParams::SearchContent {
                key: "海贼王".to_string(),
                quick: false,
                pg: "1".to_string(),
            }
        );
        assert_eq!(
            decode(Method::PlayerContent, &["m3u8", "ep1"]).unwrap(),
            CallParams::PlayerContent {
                flag: "m3u8".to_string(),
                id: "ep1".to_string(),
                vip_flags: Vec::new(),
            }
        );
        assert_eq!(
            decode(Method::SearchContent, &["k", "true", ""]).unwrap(),
            CallParams::SearchContent {
                key: "k".to_string(),
                quick: true,
                pg: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_structured_arguments() {
        let params = decode(Method::CategoryContent, &["2", "3", "true", r#"{"area":"jp"}"#]).unwrap();
        assert_eq!(
            params.to_args(),
            vec![json!("2"), json!("3"), json!(true), json!({"area": "jp"})]
        );

        assert_eq!(
            decode(Method::Proxy, &["null"]).unwrap(),
            CallParams::Proxy { params: Map::new() }
        );
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let err = decode(Method::CategoryContent, &["1", "1", "false", "{oops"]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Decode { method: Method::CategoryContent, param: "extend", .. }
        ));

        let err = decode(Method::DetailContent, &[r#"{"id":1}"#]).unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }

    #[test]
    fn test_method_and_arity_agree() {
        for method in Method::ALL {
            let params = decode(method, &[]).unwrap();
            assert_eq!(params.method(), method);
            assert_eq!(params.to_args().len(), method.arity());
        }
    }
}

// Extension System Data Types
//
// The closed lifecycle method set, the extension descriptor, and the result
// shapes extensions conventionally produce.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle methods of the capability contract, in contract order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Init,
    HomeContent,
    HomeVideoContent,
    CategoryContent,
    DetailContent,
    SearchContent,
    PlayerContent,
    LiveContent,
    Proxy,
    Action,
    Destroy,
}

impl Method {
    pub const ALL: [Method; 11] = [
        Method::Init,
        Method::HomeContent,
        Method::HomeVideoContent,
        Method::CategoryContent,
        Method::DetailContent,
        Method::SearchContent,
        Method::PlayerContent,
        Method::LiveContent,
        Method::Proxy,
        Method::Action,
        Method::Destroy,
    ];

    /// Name as exposed on the extension object.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Init => "init",
            Method::HomeContent => "homeContent",
            Method::HomeVideoContent => "homeVideoContent",
            Method::CategoryContent => "categoryContent",
            Method::DetailContent => "detailContent",
            Method::SearchContent => "searchContent",
            Method::PlayerContent => "playerContent",
            Method::LiveContent => "liveContent",
            Method::Proxy => "proxy",
            Method::Action => "action",
            Method::Destroy => "destroy",
        }
    }

    /// Number of parameters the method is called with.
    pub fn arity(self) -> usize {
        match self {
            Method::HomeVideoContent | Method::Destroy => 0,
            Method::Init
            | Method::HomeContent
            | Method::DetailContent
            | Method::LiveContent
            | Method::Proxy
            | Method::Action => 1,
            Method::SearchContent | Method::PlayerContent => 3,
            Method::CategoryContent => 4,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Identity of a loaded extension. Lives for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    pub site_key: String,
    pub site_type: i64,
    pub path: PathBuf,
    /// Resolution strategy that produced the instance.
    pub resolved_by: &'static str,
}

// ==================== Result conventions ====================

/// `{class: [...], list: [...]}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifyResult {
    #[serde(rename = "class")]
    pub classes: Vec<Value>,
    pub list: Vec<Value>,
}

/// Paged list `{list, page, pagecount, limit, total}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageResult {
    pub list: Vec<Value>,
    pub page: Value,
    pub pagecount: Value,
    pub limit: Value,
    pub total: Value,
}

/// Detail `{list: [vod]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailResult {
    pub list: Vec<Value>,
}

/// Player `{parse: 0|1, url, header?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerResult {
    pub parse: u8,
    pub url: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Value>,
}

/// Error `{error: message}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResult {
    pub error: String,
}

impl ErrorResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":""}"#.to_string())
    }
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn or_default(value: Option<Value>, default: Value) -> Value {
    match value {
        Some(v) if is_truthy(&v) => v,
        _ => default,
    }
}

fn as_list(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

impl ClassifyResult {
    pub fn build(classes: Option<Value>, list: Option<Value>) -> Self {
        Self {
            classes: as_list(classes),
            list: as_list(list),
        }
    }
}

impl PageResult {
    pub fn build(
        list: Option<Value>,
        page: Option<Value>,
        pagecount: Option<Value>,
        limit: Option<Value>,
        total: Option<Value>,
    ) -> Self {
        Self {
            list: as_list(list),
            page: or_default(page, Value::from(1)),
            pagecount: or_default(pagecount, Value::from(1)),
            limit: or_default(limit, Value::from(20)),
            total: or_default(total, Value::from(0)),
        }
    }
}

impl DetailResult {
    pub fn build(vod: Option<Value>) -> Self {
        Self {
            list: vec![vod.unwrap_or(Value::Null)],
        }
    }
}

impl PlayerResult {
    pub fn build(url: Option<Value>, parse: Option<Value>, header: Option<Value>) -> Self {
        Self {
            parse: if parse.as_ref().map_or(false, is_truthy) { 1 } else { 0 },
            url: url.unwrap_or(Value::Null),
            header: header.filter(is_truthy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
        assert_eq!("bogus".parse::<Method>(), Err(UnknownMethod("bogus".to_string())));
        assert!("HomeContent".parse::<Method>().is_err());
    }

    #[test]
    fn test_page_result_defaults() {
        let page = PageResult::build(None, None, Some(json!(0)), None, Some(json!(42)));
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"list": [], "page": 1, "pagecount": 1, "limit": 20, "total": 42})
        );
    }

    #[test]
    fn test_classify_result_uses_class_key() {
        let result = ClassifyResult::build(Some(json!([{"type_id": "1"}])), None);
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"class":[{"type_id":"1"}],"list":[]}"#
        );
    }

    #[test]
    fn test_player_result_header_is_optional() {
        let plain = PlayerResult::build(Some(json!("http://v/1.m3u8")), Some(json!(false)), None);
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"parse":0,"url":"http://v/1.m3u8"}"#
        );

        let parsed = PlayerResult::build(
            Some(json!("http://v/1")),
            Some(json!(true)),
            Some(json!({"Referer": "http://v/"})),
        );
        assert_eq!(parsed.parse, 1);
        assert!(parsed.header.is_some());
    }

    #[test]
    fn test_error_result_json() {
        assert_eq!(ErrorResult::new("boom").to_json(), r#"{"error":"boom"}"#);
    }
}

// Host services object
//
// Builds the `host` object handed to extensions: every primitive of the
// service façade plus a handful of string helpers, all backed by Rust.
// The object carries no mutable state of its own; the prelude freezes it.

use super::types::{ClassifyResult, DetailResult, ErrorResult, PageResult, PlayerResult};
use crate::services::http::{HttpOptions, HttpRequest};
use crate::services::Services;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::{Captures, Regex};
use rquickjs::convert::Coerced;
use rquickjs::function::Opt;
use rquickjs::{Ctx, Function, Object, Value};
use std::sync::Arc;
use std::time::Duration;

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

lazy_static::lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").expect("valid tag regex");
    static ref ENTITY_RE: Regex = Regex::new(r"&[^;\s]+;").expect("valid entity regex");
}

fn text(value: Coerced<String>) -> String {
    value.0
}

fn opt_text(value: Opt<Coerced<String>>) -> String {
    value.0.map(|v| v.0).unwrap_or_default()
}

/// JS value to JSON; `undefined` and unserializable values become `None`.
fn to_json(value: Opt<Value<'_>>) -> rquickjs::Result<Option<serde_json::Value>> {
    let value = match value.0 {
        Some(v) if !v.is_undefined() => v,
        _ => return Ok(None),
    };
    let ctx = value.ctx().clone();
    let encoded = match ctx.json_stringify(value)? {
        Some(s) => s.to_string()?,
        None => return Ok(None),
    };
    Ok(serde_json::from_str(&encoded).ok())
}

fn encode<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub fn base64_encode(input: &str) -> String {
    BASE64.encode(input.as_bytes())
}

/// Lossy decode; invalid input yields an empty string.
pub fn base64_decode(input: &str) -> String {
    match BASE64.decode(input.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::debug!("base64Decode failed: {}", e);
            String::new()
        }
    }
}

pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, "").into_owned()
}

pub fn html_decode(input: &str) -> String {
    ENTITY_RE
        .replace_all(input, |caps: &Captures| {
            let entity = &caps[0];
            match entity {
                "&amp;" => "&".to_string(),
                "&lt;" => "<".to_string(),
                "&gt;" => ">".to_string(),
                "&quot;" => "\"".to_string(),
                "&#39;" | "&apos;" => "'".to_string(),
                "&nbsp;" => " ".to_string(),
                _ => decode_numeric_entity(entity).unwrap_or_else(|| entity.to_string()),
            }
        })
        .into_owned()
}

fn decode_numeric_entity(entity: &str) -> Option<String> {
    let body = entity.strip_prefix("&#")?.strip_suffix(';')?;
    let code = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(String::from)
}

pub fn random_str(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn log_level(level: &str) -> log::Level {
    match level {
        "error" => log::Level::Error,
        "warn" => log::Level::Warn,
        "debug" => log::Level::Debug,
        "trace" => log::Level::Trace,
        _ => log::Level::Info,
    }
}

/// Build the `host` object for one context.
pub fn build<'js>(ctx: &Ctx<'js>, services: &Arc<Services>) -> rquickjs::Result<Object<'js>> {
    let host = Object::new(ctx.clone())?;

    // ---- cache ----
    let local = Object::new(ctx.clone())?;
    let s = services.clone();
    local.set(
        "get",
        Function::new(ctx.clone(), move |key: Coerced<String>, default: Opt<Coerced<String>>| {
            s.cache_get(&key.0, &opt_text(default))
        })?,
    )?;
    let s = services.clone();
    local.set(
        "set",
        Function::new(ctx.clone(), move |key: Coerced<String>, value: Coerced<String>| {
            s.cache_set(&key.0, &value.0)
        })?,
    )?;
    let s = services.clone();
    local.set(
        "delete",
        Function::new(ctx.clone(), move |key: Coerced<String>| s.cache_delete(&key.0))?,
    )?;
    host.set("local", local)?;

    // ---- crypto ----
    let s = services.clone();
    host.set(
        "md5",
        Function::new(ctx.clone(), move |data: Coerced<String>| s.md5(&data.0))?,
    )?;
    let s = services.clone();
    host.set(
        "aes",
        Function::new(
            ctx.clone(),
            move |mode: Coerced<String>,
                  encrypt: Coerced<bool>,
                  data: Coerced<String>,
                  key: Coerced<String>,
                  iv: Opt<Coerced<String>>| {
                s.aes(&mode.0, encrypt.0, &data.0, &key.0, &opt_text(iv))
            },
        )?,
    )?;
    let s = services.clone();
    host.set(
        "rsa",
        Function::new(
            ctx.clone(),
            move |mode: Coerced<String>,
                  encrypt: Coerced<bool>,
                  data: Coerced<String>,
                  key: Coerced<String>| { s.rsa(&mode.0, encrypt.0, &data.0, &key.0) },
        )?,
    )?;

    // ---- locale ----
    let s = services.clone();
    host.set(
        "s2t",
        Function::new(ctx.clone(), move |value: Coerced<String>| s.s2t(&text(value)))?,
    )?;
    let s = services.clone();
    host.set(
        "t2s",
        Function::new(ctx.clone(), move |value: Coerced<String>| s.t2s(&text(value)))?,
    )?;

    // ---- network ----
    let s = services.clone();
    host.set(
        "getPort",
        Function::new(ctx.clone(), move || i32::try_from(s.proxy_port()).unwrap_or(0))?,
    )?;
    let s = services.clone();
    host.set(
        "getProxy",
        Function::new(ctx.clone(), move || s.proxy_url())?,
    )?;
    let s = services.clone();
    host.set(
        "joinUrl",
        Function::new(ctx.clone(), move |base: Coerced<String>, path: Coerced<String>| {
            s.join_url(&base.0, &path.0)
        })?,
    )?;
    let s = services.clone();
    host.set(
        "http",
        Function::new(
            ctx.clone(),
            move |url: Coerced<String>, options: Opt<Value<'_>>| -> rquickjs::Result<String> {
                let options = match to_json(options)? {
                    Some(raw @ serde_json::Value::Object(_)) => serde_json::from_value::<HttpOptions>(raw)
                        .unwrap_or_else(|e| {
                            log::warn!("ignoring malformed http options: {}", e);
                            HttpOptions::default()
                        }),
                    _ => HttpOptions::default(),
                };
                let request = HttpRequest::from_options(&url.0, options, s.http_timeout());
                Ok(s.request(&request))
            },
        )?,
    )?;

    // ---- runtime helpers ----
    host.set(
        "log",
        Function::new(ctx.clone(), |level: Coerced<String>, message: Opt<Coerced<String>>| {
            log::log!(target: "extension", log_level(&level.0), "{}", opt_text(message));
        })?,
    )?;
    host.set(
        "sleep",
        Function::new(ctx.clone(), |ms: Opt<Coerced<f64>>| {
            let ms = ms.0.map(|v| v.0).unwrap_or(0.0);
            if ms.is_finite() && ms > 0.0 {
                std::thread::sleep(Duration::from_millis(ms as u64));
            }
        })?,
    )?;
    host.set(
        "base64Encode",
        Function::new(ctx.clone(), |value: Coerced<String>| base64_encode(&value.0))?,
    )?;
    host.set(
        "base64Decode",
        Function::new(ctx.clone(), |value: Coerced<String>| base64_decode(&value.0))?,
    )?;
    host.set(
        "randomStr",
        Function::new(ctx.clone(), |len: Opt<Coerced<i32>>| {
            random_str(len.0.map(|v| v.0.max(0) as usize).unwrap_or(0))
        })?,
    )?;
    host.set(
        "htmlDecode",
        Function::new(ctx.clone(), |value: Coerced<String>| html_decode(&value.0))?,
    )?;
    host.set(
        "stripTags",
        Function::new(ctx.clone(), |value: Coerced<String>| strip_tags(&value.0))?,
    )?;

    host.set("result", result_builders(ctx)?)?;

    Ok(host)
}

/// `host.result.*`: encoded result payloads in the conventional shapes.
fn result_builders<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let result = Object::new(ctx.clone())?;

    result.set(
        "classes",
        Function::new(
            ctx.clone(),
            |classes: Opt<Value<'_>>, list: Opt<Value<'_>>| -> rquickjs::Result<String> {
                Ok(encode(&ClassifyResult::build(to_json(classes)?, to_json(list)?)))
            },
        )?,
    )?;
    result.set(
        "list",
        Function::new(
            ctx.clone(),
            |list: Opt<Value<'_>>,
             page: Opt<Value<'_>>,
             pagecount: Opt<Value<'_>>,
             limit: Opt<Value<'_>>,
             total: Opt<Value<'_>>|
             -> rquickjs::Result<String> {
                Ok(encode(&PageResult::build(
                    to_json(list)?,
                    to_json(page)?,
                    to_json(pagecount)?,
                    to_json(limit)?,
                    to_json(total)?,
                )))
            },
        )?,
    )?;
    result.set(
        "detail",
        Function::new(
            ctx.clone(),
            |vod: Opt<Value<'_>>| -> rquickjs::Result<String> {
                Ok(encode(&DetailResult::build(to_json(vod)?)))
            },
        )?,
    )?;
    result.set(
        "player",
        Function::new(
            ctx.clone(),
            |url: Opt<Value<'_>>, parse: Opt<Value<'_>>, header: Opt<Value<'_>>| -> rquickjs::Result<String> {
                Ok(encode(&PlayerResult::build(
                    to_json(url)?,
                    to_json(parse)?,
                    to_json(header)?,
                )))
            },
        )?,
    )?;
    result.set(
        "error",
        Function::new(ctx.clone(), |message: Opt<Coerced<String>>| {
            ErrorResult::new(opt_text(message)).to_json()
        })?,
    )?;

    Ok(result)
}

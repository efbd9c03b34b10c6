// Runner configuration
//
// Resolved once at process start from CLI options and environment, then
// treated as immutable for the rest of the invocation.

use crate::cli::{Cli, ResolveMode};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

/// Support libraries evaluated after the built-in prelude, in this order.
pub const SUPPORT_LIBRARIES: &[&str] = &["crypto-js.js", "cheerio.min.js"];

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bridge port; <= 0 means the bridge is unavailable.
    pub bridge_port: i64,
    pub lib_path: Vec<PathBuf>,
    pub http_timeout: Duration,
    pub resolve: ResolveMode,
    pub site_key: Option<String>,
    pub site_type: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            bridge_port: 0,
            lib_path: vec![PathBuf::from(".")],
            http_timeout: Duration::from_millis(crate::services::http::DEFAULT_TIMEOUT_MS),
            resolve: ResolveMode::Auto,
            site_key: None,
            site_type: 0,
        }
    }
}

impl RunnerConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let lib_path = match cli.lib_path.as_deref() {
            Some(raw) if !raw.is_empty() => parse_lib_path(raw),
            _ => vec![PathBuf::from(".")],
        };

        Self {
            bridge_port: cli.bridge_port.as_deref().map(parse_port).unwrap_or(0),
            lib_path,
            http_timeout: Duration::from_millis(cli.http_timeout_ms.max(1)),
            resolve: cli.resolve,
            site_key: cli.site_key.clone().filter(|k| !k.is_empty()),
            site_type: cli.site_type,
        }
    }
}

/// Lenient port parsing: anything that is not an integer disables the bridge.
pub fn parse_port(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

fn parse_lib_path(raw: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(raw)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

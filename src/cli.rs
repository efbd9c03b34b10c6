//! Command-line arguments for the `runner` binary.
//!
//! `runner [OPTIONS] <EXTENSION_PATH> <METHOD> [ARGS]...`
//!
//! Options must come before the extension path. Everything after the method
//! name is passed to the extension untouched, including values that start
//! with a dash.

use clap::{CommandFactory, Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

/// How the loader finds the extension instance after evaluating the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveMode {
    /// Try global binding, then export object, then class instantiation
    Auto,
    /// Global `spider` / `__spider__` binding
    Global,
    /// CommonJS `module.exports` / `exports`
    Exports,
    /// Instantiate an exported or global `Spider` class
    Class,
}

/// Run one lifecycle method of a content-extension script
#[derive(Debug, Parser)]
#[command(name = "runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bridge service port on 127.0.0.1 (0 or negative disables the bridge)
    #[arg(long, env = "BINRUNNER_BRIDGE_PORT")]
    pub bridge_port: Option<String>,

    /// Search path for preloaded support libraries
    #[arg(long, env = "BINRUNNER_LIB_PATH")]
    pub lib_path: Option<OsString>,

    /// Timeout for direct HTTP requests, in milliseconds
    #[arg(long, env = "BINRUNNER_HTTP_TIMEOUT_MS", default_value_t = crate::services::http::DEFAULT_TIMEOUT_MS)]
    pub http_timeout_ms: u64,

    /// Extension instance resolution strategy
    #[arg(long, value_enum, default_value_t = ResolveMode::Auto)]
    pub resolve: ResolveMode,

    /// Site key reported to the extension (defaults to the script's own or its file name)
    #[arg(long, env = "BINRUNNER_SITE_KEY")]
    pub site_key: Option<String>,

    /// Site type tag reported to the extension
    #[arg(long, env = "BINRUNNER_SITE_TYPE", default_value_t = 0)]
    pub site_type: i64,

    /// Log filter for the diagnostic channel (RUST_LOG takes precedence)
    #[arg(long, env = "BINRUNNER_LOG", default_value = "warn")]
    pub log_level: String,

    /// Path to the extension script
    pub extension_path: PathBuf,

    /// Lifecycle method to invoke
    pub method: String,

    /// Positional method arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse `args` with everything after `<METHOD>` kept away from clap, so
    /// method arguments such as `--help` or `-V` reach the extension as-is.
    pub fn try_parse_split<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let (head, tail) = split_method_args(args.into_iter().map(Into::into).collect());
        let mut cli = Self::try_parse_from(head)?;
        cli.args = tail
            .into_iter()
            .map(|arg| arg.into_string().unwrap_or_else(|raw| raw.to_string_lossy().into_owned()))
            .collect();
        Ok(cli)
    }
}

/// Option spellings that consume the following argument.
fn value_options() -> Vec<String> {
    Cli::command()
        .get_arguments()
        .filter(|arg| !arg.is_positional() && arg.get_action().takes_values())
        .flat_map(|arg| {
            let long = arg.get_long().map(|l| format!("--{}", l));
            let short = arg.get_short().map(|s| format!("-{}", s));
            long.into_iter().chain(short)
        })
        .collect()
}

/// Split argv (program name included) right after the method name.
pub fn split_method_args(mut args: Vec<OsString>) -> (Vec<OsString>, Vec<OsString>) {
    let value_options = value_options();
    let mut positionals = 0;
    let mut options_done = false;
    let mut index = 1;

    while index < args.len() && positionals < 2 {
        let arg = args[index].to_string_lossy().into_owned();
        index += 1;

        if !options_done {
            if arg == "--" {
                options_done = true;
                continue;
            }
            if arg.len() > 1 && arg.starts_with('-') {
                if !arg.contains('=') && value_options.contains(&arg) {
                    index += 1;
                }
                continue;
            }
        }
        positionals += 1;
    }

    let tail = args.split_off(index.min(args.len()));
    (args, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_args_are_captured_verbatim() {
        let cli = Cli::try_parse_from([
            "runner",
            "--bridge-port",
            "9978",
            "site.js",
            "categoryContent",
            "1",
            "-2",
            "--weird",
            "",
        ])
        .unwrap();

        assert_eq!(cli.extension_path, PathBuf::from("site.js"));
        assert_eq!(cli.method, "categoryContent");
        assert_eq!(cli.args, vec!["1", "-2", "--weird", ""]);
        assert_eq!(cli.bridge_port.as_deref(), Some("9978"));
        assert_eq!(cli.resolve, ResolveMode::Auto);
    }

    #[test]
    fn test_missing_method_is_rejected() {
        assert!(Cli::try_parse_from(["runner", "site.js"]).is_err());
    }

    #[test]
    fn test_resolve_mode_values() {
        let cli = Cli::try_parse_from(["runner", "--resolve", "class", "a.js", "init"]).unwrap();
        assert_eq!(cli.resolve, ResolveMode::Class);
        assert!(cli.args.is_empty());
    }

    fn split(raw: &[&str]) -> (Vec<String>, Vec<String>) {
        let args = raw.iter().map(OsString::from).collect();
        let (head, tail) = split_method_args(args);
        let text = |v: Vec<OsString>| -> Vec<String> { v.into_iter().map(|a| a.into_string().unwrap()).collect() };
        (text(head), text(tail))
    }

    #[test]
    fn test_split_after_method() {
        let (head, tail) = split(&["runner", "--site-key", "k", "--resolve=class", "s.js", "action", "--help", "-V"]);
        assert_eq!(head, vec!["runner", "--site-key", "k", "--resolve=class", "s.js", "action"]);
        assert_eq!(tail, vec!["--help", "-V"]);

        let (head, tail) = split(&["runner", "--", "s.js", "init", "-h"]);
        assert_eq!(head, vec!["runner", "--", "s.js", "init"]);
        assert_eq!(tail, vec!["-h"]);

        let (head, tail) = split(&["runner", "--help"]);
        assert_eq!(head, vec!["runner", "--help"]);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_method_args_that_look_like_options() {
        let cli = Cli::try_parse_split(["runner", "s.js", "action", "--help"]).unwrap();
        assert_eq!(cli.method, "action");
        assert_eq!(cli.args, vec!["--help"]);

        let cli = Cli::try_parse_split(["runner", "s.js", "searchContent", "-h", "--site-key"]).unwrap();
        assert_eq!(cli.args, vec!["-h", "--site-key"]);
        assert_eq!(cli.site_key, None);

        let cli = Cli::try_parse_split(["runner", "--site-key", "own", "s.js", "init", "-V"]).unwrap();
        assert_eq!(cli.site_key.as_deref(), Some("own"));
        assert_eq!(cli.args, vec!["-V"]);
    }

    #[test]
    fn test_help_before_path_still_works() {
        let err = Cli::try_parse_split(["runner", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}

//! runner - run one lifecycle method of a content-extension script
//!
//! Prints the method's result to stdout and diagnostics to stderr.

use anyhow::{anyhow, Context};
use std::process::ExitCode;

use binrunner::cli::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse_split(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            // help and version land on stdout and are not failures
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let _logger = match binrunner::logging::init_logging(&cli.log_level)
        .map_err(|e| anyhow!(e))
        .context("logging setup failed")
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("{:#}", e);
            None
        }
    };

    binrunner::run(&cli)
}

// Module declarations
pub mod bridge;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod extensions;
pub mod logging;
pub mod output;
pub mod services;

use cli::Cli;
use config::RunnerConfig;
use extensions::ExtensionRuntime;
use services::Services;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

/// One invocation: load the extension, run one method, emit one envelope.
///
/// Exit status is non-zero only when the extension cannot be loaded.
pub fn run(cli: &Cli) -> ExitCode {
    let config = RunnerConfig::from_cli(cli);
    log::debug!("runner config: {:?}", config);

    let services = Arc::new(Services::from_config(&config));

    let extension = match ExtensionRuntime::load(&cli.extension_path, &config, services) {
        Ok(extension) => extension,
        Err(err) => {
            log::debug!("load failed: {:?}", err);
            let stderr = io::stderr();
            let _ = output::report_load_failure(&mut stderr.lock(), &err);
            return ExitCode::FAILURE;
        }
    };

    let envelope = dispatch::dispatch(&cli.method, &cli.args, &extension);

    let stdout = io::stdout();
    let stderr = io::stderr();
    if let Err(e) = output::emit(&envelope, &cli.method, &mut stdout.lock(), &mut stderr.lock()) {
        // stdout closed early; nothing more to report to the caller
        let _ = writeln!(stderr.lock(), "failed to write result: {}", e);
    }

    ExitCode::SUCCESS
}

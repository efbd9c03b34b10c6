// Extension Runtime - QuickJS execution
//
// One runtime and context per invocation:
// - host services object + prelude
// - optional support libraries from the library search path
// - the extension script itself
// - instance resolution, then lifecycle calls through `Capability`

use super::extension::ExtensionSource;
use super::host;
use super::loader::{strategies, LoadError};
use super::types::{ExtensionDescriptor, Method};
use crate::config::{RunnerConfig, SUPPORT_LIBRARIES};
use crate::dispatch::{Capability, DispatchError};
use crate::output::Envelope;
use crate::services::Services;
use rquickjs::context::EvalOptions;
use rquickjs::function::{Rest, This};
use rquickjs::{CaughtError, Context, Ctx, Function, Object, Persistent, Runtime, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PRELUDE: &str = include_str!("prelude.js");

/// Message of a JS failure, without engine-specific decoration.
pub(crate) fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    match CaughtError::from_error(ctx, err) {
        CaughtError::Exception(exception) => exception
            .message()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "uncaught exception".to_string()),
        CaughtError::Value(value) => {
            if let Some(s) = value.as_string().and_then(|s| s.to_string().ok()) {
                return s;
            }
            ctx.json_stringify(value)
                .ok()
                .flatten()
                .and_then(|s| s.to_string().ok())
                .unwrap_or_else(|| "uncaught exception".to_string())
        }
        CaughtError::Error(error) => error.to_string(),
    }
}

fn script_options() -> EvalOptions {
    let mut options = EvalOptions::default();
    options.global = true;
    options.strict = false;
    options.backtrace_barrier = true;
    options
}

/// A loaded extension ready for dispatch.
pub struct ExtensionRuntime {
    descriptor: ExtensionDescriptor,
    // declared before the context so it is released first
    instance: Persistent<Object<'static>>,
    context: Context,
    _runtime: Runtime,
}

impl ExtensionRuntime {
    /// Read, evaluate and resolve the extension at `path`.
    pub fn load(path: &Path, config: &RunnerConfig, services: Arc<Services>) -> Result<Self, LoadError> {
        let source = ExtensionSource::read(path)?;
        Self::from_source(source, config, services)
    }

    pub fn from_source(
        source: ExtensionSource,
        config: &RunnerConfig,
        services: Arc<Services>,
    ) -> Result<Self, LoadError> {
        let engine_error = |message: String| LoadError::Engine {
            path: source.path.clone(),
            message,
        };

        let runtime = Runtime::new().map_err(|e| engine_error(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| engine_error(e.to_string()))?;

        let (instance, descriptor) = context.with(|ctx| -> Result<_, LoadError> {
            let host = host::build(&ctx, &services)
                .and_then(|host| {
                    let install: Function = ctx.eval(PRELUDE)?;
                    install.call::<_, ()>((host.clone(),))?;
                    Ok(host)
                })
                .map_err(|e| engine_error(describe_error(&ctx, e)))?;

            load_support_libraries(&ctx, &config.lib_path);

            ctx.eval_with_options::<(), _>(source.code.as_str(), script_options())
                .map_err(|e| LoadError::Evaluation {
                    path: source.path.clone(),
                    message: describe_error(&ctx, e),
                })?;

            let mut tried = Vec::new();
            for strategy in strategies(config.resolve) {
                tried.push(strategy.name());
                let found = strategy.resolve(&ctx, &host).map_err(|e| LoadError::Evaluation {
                    path: source.path.clone(),
                    message: describe_error(&ctx, e),
                })?;

                if let Some(instance) = found {
                    let descriptor = identify(&ctx, &instance, &source, config, strategy.name());
                    log::info!(
                        "loaded extension {} ({}) via {} strategy",
                        descriptor.site_key,
                        source.path.display(),
                        strategy.name()
                    );
                    return Ok((Persistent::save(&ctx, instance), descriptor));
                }
            }

            Err(LoadError::ContractNotSatisfied {
                path: source.path.clone(),
                tried: tried.join(", "),
            })
        })?;

        Ok(Self {
            descriptor,
            instance,
            context,
            _runtime: runtime,
        })
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }
}

/// Settle identity: explicit config, then the instance's own `siteKey`, then
/// the file name. The result is written back onto the instance when the
/// instance accepts it; a frozen object or a getter-only `siteKey` keeps its
/// own values and the descriptor stays authoritative.
fn identify<'js>(
    ctx: &Ctx<'js>,
    instance: &Object<'js>,
    source: &ExtensionSource,
    config: &RunnerConfig,
    resolved_by: &'static str,
) -> ExtensionDescriptor {
    let own_key = match instance.get::<_, Value>("siteKey") {
        Ok(value) => value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .filter(|s| !s.is_empty()),
        Err(e) => {
            log::debug!("cannot read siteKey: {}", describe_error(ctx, e));
            None
        }
    };

    let site_key = config
        .site_key
        .clone()
        .or(own_key)
        .unwrap_or_else(|| source.default_site_key());

    if let Err(e) = instance.set("siteKey", site_key.as_str()) {
        log::debug!("siteKey not written back: {}", describe_error(ctx, e));
    }
    if let Err(e) = instance.set("siteType", config.site_type as f64) {
        log::debug!("siteType not written back: {}", describe_error(ctx, e));
    }

    ExtensionDescriptor {
        site_key,
        site_type: config.site_type,
        path: source.path.clone(),
        resolved_by,
    }
}

/// Evaluate the fixed support libraries found on the search path. Missing
/// libraries are skipped and failing ones are reported, never fatal.
fn load_support_libraries(ctx: &Ctx<'_>, lib_path: &[PathBuf]) {
    for name in SUPPORT_LIBRARIES {
        let Some(file) = lib_path.iter().map(|dir| dir.join(name)).find(|f| f.is_file()) else {
            log::debug!("support library {} not found", name);
            continue;
        };

        let code = match std::fs::read_to_string(&file) {
            Ok(code) => code,
            Err(e) => {
                log::warn!("failed to read support library {}: {}", file.display(), e);
                continue;
            }
        };

        match ctx.eval_with_options::<(), _>(code, script_options()) {
            Ok(()) => log::debug!("loaded support library {}", file.display()),
            Err(e) => log::warn!(
                "failed to load support library {} - {}",
                name,
                describe_error(ctx, e)
            ),
        }
    }
}

impl Capability for ExtensionRuntime {
    fn implements(&self, method: Method) -> Result<bool, DispatchError> {
        self.context.with(|ctx| {
            let instance = self
                .instance
                .clone()
                .restore(&ctx)
                .map_err(|e| DispatchError::Engine(e.to_string()))?;
            let member: Value = instance
                .get(method.as_str())
                .map_err(|e| DispatchError::Engine(describe_error(&ctx, e)))?;
            Ok(member.is_function())
        })
    }

    fn call(&self, method: Method, args: &[serde_json::Value]) -> Result<Envelope, DispatchError> {
        self.context.with(|ctx| {
            let instance = self
                .instance
                .clone()
                .restore(&ctx)
                .map_err(|e| DispatchError::Engine(e.to_string()))?;

            let func: Function = instance
                .get(method.as_str())
                .map_err(|e| DispatchError::Engine(describe_error(&ctx, e)))?;

            let js_args = args
                .iter()
                .map(|arg| ctx.json_parse(arg.to_string()))
                .collect::<rquickjs::Result<Vec<Value>>>()
                .map_err(|e| DispatchError::Engine(describe_error(&ctx, e)))?;

            let returned: Value = func
                .call((This(instance.clone()), Rest(js_args)))
                .map_err(|e| DispatchError::Extension(describe_error(&ctx, e)))?;

            // async methods: drive the job queue until the promise settles
            let value = match returned.as_promise() {
                Some(promise) => promise
                    .finish::<Value>()
                    .map_err(|e| DispatchError::Extension(describe_error(&ctx, e)))?,
                None => returned,
            };

            to_envelope(&ctx, value)
        })
    }
}

fn to_envelope<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Envelope, DispatchError> {
    if value.is_undefined() || value.is_null() {
        return Ok(Envelope::Empty);
    }

    if let Some(s) = value.as_string() {
        return s
            .to_string()
            .map(Envelope::Text)
            .map_err(|e| DispatchError::Engine(e.to_string()));
    }

    match ctx.json_stringify(value) {
        Ok(Some(encoded)) => encoded
            .to_string()
            .map(Envelope::Json)
            .map_err(|e| DispatchError::Engine(e.to_string())),
        Ok(None) => Ok(Envelope::Empty),
        Err(e) => Err(DispatchError::Extension(describe_error(ctx, e))),
    }
}

// Extension Loader
//
// After the extension script has been evaluated, find the one object that
// implements the lifecycle contract. Where to look depends on how the script
// was written:
// - GlobalBinding: a global `spider` / `__spider__` value
// - ExportObject:  CommonJS `module.exports` / `exports`
// - ClassInstance: a `Spider` class (or an exported constructor), instantiated
//                  with the host services object
//
// `ResolveMode::Auto` tries them in that order.

use super::types::Method;
use crate::cli::ResolveMode;
use rquickjs::{Ctx, Function, Object, Type, Value};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read extension script {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("script engine failure while loading {path}: {message}")]
    Engine { path: PathBuf, message: String },
    #[error("extension script {path} failed to evaluate: {message}")]
    Evaluation { path: PathBuf, message: String },
    #[error("extension script {path} does not expose a spider object ({tried})")]
    ContractNotSatisfied { path: PathBuf, tried: String },
}

/// One way of locating the extension instance in an evaluated context.
pub trait ResolveStrategy {
    fn name(&self) -> &'static str;

    /// The conformant instance, if this strategy finds one.
    fn resolve<'js>(&self, ctx: &Ctx<'js>, host: &Object<'js>) -> rquickjs::Result<Option<Object<'js>>>;
}

/// Strategies to try for a mode, in order.
pub fn strategies(mode: ResolveMode) -> Vec<Box<dyn ResolveStrategy>> {
    match mode {
        ResolveMode::Auto => vec![
            Box::new(GlobalBinding),
            Box::new(ExportObject),
            Box::new(ClassInstance),
        ],
        ResolveMode::Global => vec![Box::new(GlobalBinding)],
        ResolveMode::Exports => vec![Box::new(ExportObject)],
        ResolveMode::Class => vec![Box::new(ClassInstance)],
    }
}

/// True when at least one lifecycle method is callable on `obj`.
pub fn is_conformant(obj: &Object<'_>) -> rquickjs::Result<bool> {
    for method in Method::ALL {
        let member: Value = obj.get(method.as_str())?;
        if member.is_function() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluate a lookup expression. Lexical bindings of earlier scripts are only
/// reachable this way, not through `globalThis`.
fn lookup<'js>(ctx: &Ctx<'js>, expr: &str) -> rquickjs::Result<Value<'js>> {
    ctx.eval(format!(
        "(function () {{ try {{ return {}; }} catch (e) {{ return undefined; }} }})()",
        expr
    ))
}

fn conformant_object<'js>(value: Value<'js>) -> rquickjs::Result<Option<Object<'js>>> {
    if value.type_of() != Type::Object {
        return Ok(None);
    }
    match value.into_object() {
        Some(obj) if is_conformant(&obj)? => Ok(Some(obj)),
        _ => Ok(None),
    }
}

/// Hand the services object to instances that did not receive one. Objects
/// that refuse the property (frozen, sealed, accessor without setter) are
/// still usable and are left as they are.
fn inject_host<'js>(ctx: &Ctx<'js>, obj: &Object<'js>, host: &Object<'js>) {
    let missing = match obj.get::<_, Value>("host") {
        Ok(current) => current.is_undefined() || current.is_null(),
        Err(_) => {
            let _ = ctx.catch();
            false
        }
    };
    if missing && obj.set("host", host.clone()).is_err() {
        let _ = ctx.catch();
        log::debug!("extension instance does not accept a host property");
    }
}

pub struct GlobalBinding;

impl ResolveStrategy for GlobalBinding {
    fn name(&self) -> &'static str {
        "global"
    }

    fn resolve<'js>(&self, ctx: &Ctx<'js>, host: &Object<'js>) -> rquickjs::Result<Option<Object<'js>>> {
        for expr in ["spider", "__spider__"] {
            let value = lookup(ctx, expr)?;
            if let Some(obj) = conformant_object(value)? {
                inject_host(ctx, &obj, host);
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }
}

pub struct ExportObject;

impl ResolveStrategy for ExportObject {
    fn name(&self) -> &'static str {
        "exports"
    }

    fn resolve<'js>(&self, ctx: &Ctx<'js>, host: &Object<'js>) -> rquickjs::Result<Option<Object<'js>>> {
        for expr in [
            "module.exports.spider",
            "module.exports",
            "module.exports.default",
            "exports",
        ] {
            let value = lookup(ctx, expr)?;
            if let Some(obj) = conformant_object(value)? {
                inject_host(ctx, &obj, host);
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }
}

pub struct ClassInstance;

impl ResolveStrategy for ClassInstance {
    fn name(&self) -> &'static str {
        "class"
    }

    fn resolve<'js>(&self, ctx: &Ctx<'js>, host: &Object<'js>) -> rquickjs::Result<Option<Object<'js>>> {
        let construct: Function = ctx.eval("(function (C, host) { return new C(host); })")?;

        for expr in [
            "(Spider !== globalThis.BaseSpider ? Spider : undefined)",
            "module.exports",
            "module.exports.default",
            "module.exports.Spider",
        ] {
            let candidate = lookup(ctx, expr)?;
            if candidate.type_of() != Type::Constructor {
                continue;
            }

            let instance: Value = construct.call((candidate, host.clone()))?;
            if let Some(obj) = conformant_object(instance)? {
                inject_host(ctx, &obj, host);
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }
}

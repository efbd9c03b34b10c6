// CLI Argument Marshaler & Dispatcher
//
// Turns `<method> [args...]` into a typed call, invokes it on the loaded
// extension and folds every failure into an error envelope.

pub mod params;

use crate::extensions::types::{Method, UnknownMethod};
use crate::output::Envelope;
pub use params::CallParams;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid {param} argument for {method}: {reason}")]
    Decode {
        method: Method,
        param: &'static str,
        reason: String,
    },
    #[error("extension does not implement {0}")]
    NotImplemented(Method),
    /// Thrown or rejected inside the extension.
    #[error("{0}")]
    Extension(String),
    #[error("script engine failure: {0}")]
    Engine(String),
}

impl From<UnknownMethod> for DispatchError {
    fn from(err: UnknownMethod) -> Self {
        DispatchError::UnknownMethod(err.0)
    }
}

/// The seam between the dispatcher and a loaded extension.
pub trait Capability {
    /// Whether the extension supplies a callable for `method`.
    fn implements(&self, method: Method) -> Result<bool, DispatchError>;

    /// Call `method` with positional arguments and normalize its result.
    fn call(&self, method: Method, args: &[Value]) -> Result<Envelope, DispatchError>;
}

/// Decode, invoke, and return the single envelope of this invocation.
pub fn dispatch<C: Capability + ?Sized>(method_name: &str, raw_args: &[String], ext: &C) -> Envelope {
    match try_dispatch(method_name, raw_args, ext) {
        Ok(envelope) => envelope,
        Err(err) => {
            log::debug!("dispatch of {} failed: {:?}", method_name, err);
            Envelope::Error(err.to_string())
        }
    }
}

fn try_dispatch<C: Capability + ?Sized>(
    method_name: &str,
    raw_args: &[String],
    ext: &C,
) -> Result<Envelope, DispatchError> {
    let method: Method = method_name.parse()?;
    let params = CallParams::decode(method, raw_args)?;

    if !ext.implements(method)? {
        return match method {
            Method::Destroy => Ok(Envelope::Text(String::new())),
            other => Err(DispatchError::NotImplemented(other)),
        };
    }

    log::info!("invoking {}", method);
    let envelope = ext.call(method, &params.to_args())?;

    // destroy always answers with an empty string
    if method == Method::Destroy {
        return Ok(Envelope::Text(String::new()));
    }

    Ok(envelope)
}

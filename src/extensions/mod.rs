// Extension System Module
//
// Handles:
// - Reading extension scripts
// - QuickJS context setup with the host services object and prelude
// - Resolving the spider instance behind the lifecycle contract
// - Invoking lifecycle methods and normalizing their results

// Submodules
pub mod extension;
pub mod host;
pub mod loader;
pub mod runtime;
pub mod types;

// Re-exports
pub use extension::ExtensionSource;
pub use loader::{LoadError, ResolveStrategy};
pub use runtime::ExtensionRuntime;
pub use types::{ExtensionDescriptor, Method};

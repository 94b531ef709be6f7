//! Plugin host for self-declaring native modules
//!
//! This module discovers shared libraries in a plugin folder, binds the
//! interfaces they declare to implementations, describes their interface
//! surface and invokes methods on them by name. It supports:
//!
//! - Dynamic library loading (.so, .dll, .dylib)
//! - Load generations replaced atomically on every scan
//! - Interface introspection as serializable descriptor trees
//! - Name-based invocation with lenient argument binding
//! - Rescans driven by a directory watcher

pub mod api;
pub mod config;
pub mod introspect;
pub mod invoker;
pub mod loader;
pub mod manager;
pub mod registry;
#[cfg(feature = "watch")]
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod manager_test;

pub use api::{
    InvocationError, MethodSignature, ModuleDeclaration, ObjectFactory, ParameterSignature,
    PluginObject, TypeDeclaration, TypeKind, argument,
};
pub use config::HostSettings;
pub use introspect::describe_interfaces;
pub use loader::{LoadedModule, ModuleOpener, NativeOpener};
pub use manager::{PluginHost, ScanReport};
pub use registry::{Binding, ServiceRegistry};
pub use crate::protocol::ParamType;
#[cfg(feature = "watch")]
pub use watcher::PluginWatcher;

// Re-export the macro
pub use crate::declare_module;

use crate::core::error::HostError;
use std::path::PathBuf;

/// Plugin system errors
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Module load failed: {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Invalid module {}: {reason}", path.display())]
    InvalidPlugin { path: PathBuf, reason: String },

    #[error("Watcher error: {0}")]
    Watch(String),
}

impl From<PluginError> for HostError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::LoadFailed { path, reason }
            | PluginError::InvalidPlugin { path, reason } => HostError::ModuleLoad {
                path: path.display().to_string(),
                reason,
            },
            PluginError::Watch(message) => HostError::Internal(message),
        }
    }
}

/// Host lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The previous load generation was dropped ahead of a rescan
    GenerationReleased { generation: u64 },

    /// A module was loaded into the generation being built
    ModuleLoaded { name: String, path: PathBuf },

    /// A module file was skipped because it failed to load
    ModuleFailed { path: PathBuf, reason: String },

    /// An interface was bound to an implementation
    InterfaceBound {
        interface: String,
        implementation: String,
    },

    /// A scan finished and its generation became current
    Configured { generation: u64, modules: usize },
}

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

// ! Error types for the plugin host
// !
// ! Module defines the errors surfaced by the host operations, each one
// ! identifying the stage (loading, resolution, binding, invocation) that failed.

use thiserror::Error;

/// The main error type for the plugin host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// A module file could not be loaded or did not declare itself correctly
    #[error("Module load failed: {path}: {reason}")]
    ModuleLoad { path: String, reason: String },

    /// No module with the given name is part of the current generation
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// The requested type is not declared by the target module
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// The requested method is not declared on the resolved type
    #[error("Method not found: {method} on type {type_name}")]
    MethodNotFound { type_name: String, method: String },

    /// The current generation has no binding able to produce an instance
    #[error("Instance unavailable: {0}")]
    InstanceUnavailable(String),

    /// Fewer arguments were bound than the method declares (strict arity only)
    #[error("Arity mismatch: {method} expects {expected} arguments, {bound} bound")]
    ArityMismatch {
        method: String,
        expected: usize,
        bound: usize,
    },

    /// Argument coercion failed or the invoked method raised an error
    #[error("Invocation failed: {0}")]
    Invocation(String),

    /// A module declaration carries unresolvable identifiers
    #[error("Malformed declaration: {0}")]
    MalformedDeclaration(String),

    /// Invalid host settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON / YAML serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// The invoked method did not return in time
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for HostError {
    fn from(err: serde_yaml::Error) -> Self {
        HostError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Io(err.to_string())
    }
}

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Create a new invocation error
    pub fn invocation<S: Into<String>>(message: S) -> Self {
        Self::Invocation(message.into())
    }

    /// Create a new malformed declaration error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedDeclaration(message.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Name of the stage that failed, for logging and for structured responses
    pub fn stage(&self) -> &'static str {
        match self {
            HostError::ModuleLoad { .. } => "loading",
            HostError::ModuleNotFound(_) => "module_resolution",
            HostError::TypeNotFound(_) => "type_resolution",
            HostError::MethodNotFound { .. } => "method_resolution",
            HostError::InstanceUnavailable(_) => "instance_resolution",
            HostError::ArityMismatch { .. } => "binding",
            HostError::Invocation(_) => "invocation",
            HostError::Timeout(_) => "invocation",
            HostError::MalformedDeclaration(_) => "introspection",
            HostError::Configuration(_) => "configuration",
            HostError::Serialization(_) => "serialization",
            HostError::Io(_) => "io",
            HostError::Internal(_) => "internal",
        }
    }

    /// Whether the caller asked for something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HostError::ModuleNotFound(_)
                | HostError::TypeNotFound(_)
                | HostError::MethodNotFound { .. }
                | HostError::InstanceUnavailable(_)
        )
    }
}

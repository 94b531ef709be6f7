// ! Structured logging for the plugin host
// !
// ! Module provides structured error logging with stage categorization
// ! and context preservation, plus subscriber setup for binaries and tests.

use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{Level, error, info, span, warn};

use crate::core::error::HostError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLogLevel {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but the host can continue
    Error,
    /// Warnings about potential issues
    Warning,
    /// Caller mistakes (unknown names, bad arguments)
    Info,
}

impl From<&HostError> for ErrorLogLevel {
    fn from(error: &HostError) -> Self {
        match error {
            HostError::Internal(_) => ErrorLogLevel::Critical,

            HostError::ModuleLoad { .. }
            | HostError::MalformedDeclaration(_)
            | HostError::Invocation(_)
            | HostError::Serialization(_) => ErrorLogLevel::Error,

            HostError::Timeout(_) | HostError::Io(_) | HostError::Configuration(_) => {
                ErrorLogLevel::Warning
            }

            HostError::ModuleNotFound(_)
            | HostError::TypeNotFound(_)
            | HostError::MethodNotFound { .. }
            | HostError::InstanceUnavailable(_)
            | HostError::ArityMismatch { .. } => ErrorLogLevel::Info,
        }
    }
}

/// Extended error context for logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Host operation being performed when the error occurred
    pub operation: String,
    /// Module path or name
    pub module: Option<String>,
    pub type_name: Option<String>,
    pub method: Option<String>,
    /// Additional context data
    pub extra: HashMap<String, Value>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            operation: "unknown".to_string(),
            module: None,
            type_name: None,
            method: None,
            extra: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add extra context data
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Structured error logger
pub struct ErrorLogger;

impl ErrorLogger {
    /// Log an error with its stage and context
    pub fn log_error(error: &HostError, context: &ErrorContext) {
        let stage = error.stage();
        let log_data = json!({
            "stage": stage,
            "error_message": error.to_string(),
            "operation": context.operation,
            "module": context.module,
            "type_name": context.type_name,
            "method": context.method,
            "extra_context": context.extra,
        });
        let details = serde_json::to_string(&log_data).unwrap_or_default();

        match ErrorLogLevel::from(error) {
            ErrorLogLevel::Critical => {
                error!(
                    target: "operator_host_errors",
                    stage = stage,
                    operation = context.operation.as_str(),
                    "CRITICAL host error: {} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Error => {
                error!(
                    target: "operator_host_errors",
                    stage = stage,
                    operation = context.operation.as_str(),
                    "Host error: {} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Warning => {
                warn!(
                    target: "operator_host_errors",
                    stage = stage,
                    operation = context.operation.as_str(),
                    "Host warning: {} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Info => {
                info!(
                    target: "operator_host_errors",
                    stage = stage,
                    operation = context.operation.as_str(),
                    "Host request rejected: {} - {}",
                    error,
                    details
                );
            }
        }
    }

    /// Create a logging span for a host operation
    pub fn create_operation_span(operation: &str, context: &ErrorContext) -> tracing::Span {
        span!(
            Level::INFO,
            "host_operation",
            operation = operation,
            module = context.module.as_deref(),
            type_name = context.type_name.as_deref(),
            method = context.method.as_deref(),
        )
    }
}

impl HostError {
    /// Log this error with structured context
    pub fn log_with_context(&self, context: &ErrorContext) {
        ErrorLogger::log_error(self, context);
    }
}

/// Install a fmt subscriber driven by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already set.
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

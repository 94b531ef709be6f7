//! Core building blocks for the plugin host
//!
//! This module contains error handling, structured logging and the argument
//! coercion used when binding named arguments to declared parameters.

pub mod error;
pub mod logging;
pub mod validation;

// Re-export commonly used items
pub use error::{HostError, HostResult};
pub use logging::{ErrorContext, ErrorLogLevel, ErrorLogger};
pub use validation::coerce;

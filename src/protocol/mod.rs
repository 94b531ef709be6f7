//! Data contracts of the plugin host
//!
//! This module contains the declared parameter types, the serializable
//! descriptor tree returned by introspection and the request shape accepted
//! by invocation.

pub mod param_type;
pub mod types;

pub use param_type::ParamType;
pub use types::*;

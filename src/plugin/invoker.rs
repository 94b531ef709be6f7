//! Dynamic invoker
//!
//! Resolves a type and a method on a loaded module, binds named arguments to
//! the method's formal parameters and calls the bound implementation.
//!
//! Binding is lenient, matching how callers have always used it:
//!
//! - arguments are matched to parameters by name, ignoring case;
//! - an argument naming no parameter is dropped;
//! - an argument whose parameter type has no default value (`Option<T>`,
//!   custom types) is dropped;
//! - only the arguments that survived are passed, positionally, in formal
//!   parameter order. A method can therefore receive fewer arguments than it
//!   declares unless strict arity is requested.

use crate::core::error::{HostError, HostResult};
use crate::core::validation::coerce;
use crate::plugin::api::MethodSignature;
use crate::plugin::loader::LoadedModule;
use crate::plugin::registry::{ServiceFactory, ServiceRegistry};
use crate::protocol::types::ParameterDescriptor;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A method call ready to run: resolved instance source, method and arguments
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub type_name: String,
    pub method: MethodSignature,
    pub arguments: Vec<Value>,
    service: ServiceFactory,
}

impl PreparedCall {
    /// Create an instance and run the method on it
    pub fn run(self) -> HostResult<Option<Value>> {
        let mut instance = self.service.create();
        instance
            .invoke(&self.method.name, self.arguments)
            .map_err(|e| HostError::invocation(e.message))
    }
}

/// Resolve and bind a call.
///
/// `module` is where the type and method are resolved; `registry` supplies the
/// instance. Resolution order (type, method, instance) decides which error a
/// caller sees first.
pub fn prepare(
    module: &LoadedModule,
    registry: &ServiceRegistry,
    type_name: &str,
    method_name: &str,
    arguments: Option<&[ParameterDescriptor]>,
    strict_arity: bool,
) -> HostResult<PreparedCall> {
    module
        .find_type(type_name)
        .ok_or_else(|| HostError::TypeNotFound(type_name.to_string()))?;

    let method = module
        .find_method(type_name, method_name)
        .ok_or_else(|| HostError::MethodNotFound {
            type_name: type_name.to_string(),
            method: method_name.to_string(),
        })?
        .clone();

    let service = registry
        .resolve(type_name)
        .ok_or_else(|| HostError::InstanceUnavailable(type_name.to_string()))?;

    let arguments = match arguments {
        Some(arguments) if !arguments.is_empty() => bind_arguments(&method, arguments)?,
        _ => Vec::new(),
    };

    if strict_arity && arguments.len() != method.parameters.len() {
        return Err(HostError::ArityMismatch {
            method: method.name.clone(),
            expected: method.parameters.len(),
            bound: arguments.len(),
        });
    }

    Ok(PreparedCall {
        type_name: type_name.to_string(),
        method,
        arguments,
        service,
    })
}

/// Bind named arguments to `method`'s parameters, in formal order
pub fn bind_arguments(
    method: &MethodSignature,
    arguments: &[ParameterDescriptor],
) -> HostResult<Vec<Value>> {
    let mut bound = BTreeMap::new();

    for argument in arguments {
        let Some((position, parameter)) = method.parameter(&argument.name) else {
            debug!(
                "Skipping argument {}: {} has no such parameter",
                argument.name, method.name
            );
            continue;
        };

        let Some(default) = parameter.ty.default_value() else {
            debug!(
                "Skipping argument {}: {} has no default value",
                argument.name, parameter.ty
            );
            continue;
        };

        let value = match &argument.value {
            Some(value) if !value.is_null() => coerce(value, &parameter.ty, &parameter.name)?,
            _ => default,
        };
        bound.insert(position, value);
    }

    Ok(bound.into_values().collect())
}

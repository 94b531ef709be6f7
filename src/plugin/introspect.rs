//! Interface introspection
//!
//! Builds the descriptor tree of a loaded module's interface surface for
//! discovery. Only interface types are described; concrete types stay an
//! implementation detail of the module.

use crate::core::error::{HostError, HostResult};
use crate::plugin::loader::LoadedModule;
use crate::protocol::types::{
    MethodDescriptor, ModuleDescriptor, ParameterDescriptor, TypeDescriptor,
};

/// Describe every interface of `module`.
///
/// Returns a single, complete descriptor, or nothing when the module declares
/// no interfaces. Callers treating the last element as the complete tree keep
/// working.
pub fn describe_interfaces(module: &LoadedModule) -> HostResult<Vec<ModuleDescriptor>> {
    let declaration = module.declaration();
    let mut types = Vec::new();

    for interface in declaration.interfaces() {
        if interface.name.trim().is_empty() {
            return Err(HostError::malformed(format!(
                "module {} declares an interface without a name",
                module.name()
            )));
        }

        let mut methods = Vec::with_capacity(interface.methods.len());
        for method in &interface.methods {
            if method.name.trim().is_empty() {
                return Err(HostError::malformed(format!(
                    "{} declares a method without a name",
                    interface.name
                )));
            }

            let mut parameters = Vec::with_capacity(method.parameters.len());
            for parameter in &method.parameters {
                if parameter.name.trim().is_empty() {
                    return Err(HostError::malformed(format!(
                        "{}::{} declares a parameter without a name",
                        interface.name, method.name
                    )));
                }
                parameters.push(ParameterDescriptor::declared(&parameter.name, &parameter.ty));
            }

            methods.push(MethodDescriptor {
                name: method.name.clone(),
                parameters,
            });
        }

        types.push(TypeDescriptor {
            name: interface.name.clone(),
            methods,
        });
    }

    if types.is_empty() {
        return Ok(Vec::new());
    }

    let mut descriptor = module.descriptor();
    descriptor.types = types;
    Ok(vec![descriptor])
}

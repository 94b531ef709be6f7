// ! Service registry for interface bindings
// !
// ! Module maps each discovered interface to the one implementation type
// ! that serves it during a load generation.

use crate::plugin::api::{ObjectFactory, PluginObject};
use crate::plugin::loader::LoadedModule;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Interface -> implementation binding
#[derive(Debug, Clone)]
pub struct Binding {
    /// Interface type name
    pub interface: String,

    /// Implementation type name
    pub implementation: String,

    /// Module declaring the implementation
    pub module: Arc<LoadedModule>,
}

/// Registry of interface bindings for one load generation
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    /// Bindings in registration order
    bindings: Vec<Binding>,

    /// Interface name -> index into `bindings`
    by_interface: HashMap<String, usize>,
}

impl ServiceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every interface of `module` to its first implementation.
    ///
    /// Interfaces already bound (by this or an earlier module) are skipped,
    /// as are interfaces nothing implements. Returns the new bindings.
    pub fn register_module(&mut self, module: &Arc<LoadedModule>) -> Vec<Binding> {
        let declaration = module.declaration();
        let mut added = Vec::new();

        for interface in declaration.interfaces() {
            for implementation in declaration.implementations_of(&interface.name) {
                if self.is_bound(&interface.name) {
                    debug!(
                        "Interface {} already bound, ignoring {}",
                        interface.name, implementation.name
                    );
                    continue;
                }

                let binding = Binding {
                    interface: interface.name.clone(),
                    implementation: implementation.name.clone(),
                    module: module.clone(),
                };
                debug!("Bound {} -> {}", binding.interface, binding.implementation);

                self.by_interface
                    .insert(binding.interface.clone(), self.bindings.len());
                self.bindings.push(binding.clone());
                added.push(binding);
            }
        }

        added
    }

    /// Check whether an interface is bound
    pub fn is_bound(&self, interface: &str) -> bool {
        self.by_interface.contains_key(interface)
    }

    /// Binding for an interface
    pub fn binding_for(&self, interface: &str) -> Option<&Binding> {
        self.by_interface
            .get(interface)
            .map(|&index| &self.bindings[index])
    }

    /// All bindings in registration order
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve an instance source for `type_name`.
    ///
    /// `type_name` is either a bound interface or the implementation type of
    /// a binding; anything else has no registered instance.
    pub fn resolve(&self, type_name: &str) -> Option<ServiceFactory> {
        let binding = self.binding_for(type_name).or_else(|| {
            self.bindings
                .iter()
                .find(|b| b.implementation == type_name)
        })?;

        let factory = binding
            .module
            .find_type(&binding.implementation)?
            .factory()?
            .clone();

        Some(ServiceFactory {
            implementation: binding.implementation.clone(),
            factory,
            module: binding.module.clone(),
        })
    }
}

/// Creates instances of one bound implementation
#[derive(Clone)]
pub struct ServiceFactory {
    /// Implementation type name
    pub implementation: String,
    factory: ObjectFactory,
    // Keeps the implementing library loaded; declared after `factory`.
    module: Arc<LoadedModule>,
}

impl ServiceFactory {
    /// Create a fresh instance
    pub fn create(&self) -> ServiceInstance {
        ServiceInstance {
            object: (self.factory)(),
            _module: self.module.clone(),
        }
    }
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("implementation", &self.implementation)
            .field("module", &self.module.name())
            .finish()
    }
}

/// A live instance, keeping its module loaded while it exists
pub struct ServiceInstance {
    object: Box<dyn PluginObject>,
    _module: Arc<LoadedModule>,
}

impl ServiceInstance {
    /// Invoke a method on the instance
    pub fn invoke(
        &mut self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, crate::plugin::api::InvocationError> {
        self.object.invoke(method, args)
    }
}

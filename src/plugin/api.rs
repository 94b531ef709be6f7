// ! Module-side API
// !
// ! A loadable module cannot be reflected upon, so it describes itself: it
// ! exports one entry symbol returning a `ModuleDeclaration` that lists its
// ! interfaces, its concrete types, their method signatures and a factory
// ! for each concrete type. Instances are driven through `PluginObject`.

use crate::protocol::param_type::ParamType;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Name of the symbol every module exports (see [`declare_module!`](crate::declare_module))
pub const MODULE_ENTRY_SYMBOL: &[u8] = b"_operator_module_declare\0";

/// Signature of the module entry point
#[allow(improper_ctypes_definitions)]
pub type ModuleEntry = unsafe extern "C" fn() -> *mut ModuleDeclaration;

/// A live instance of a concrete module type
pub trait PluginObject: Send {
    /// Invoke `method` with positional arguments.
    ///
    /// `args` holds only the arguments the host managed to bind, in formal
    /// parameter order, so it may be shorter than the declared parameter list.
    /// Returns `None` for methods that produce nothing.
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Option<Value>, InvocationError>;
}

/// Error raised by a module method
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InvocationError {
    pub message: String,
}

impl InvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error for a method name the object does not implement
    pub fn unknown_method(method: &str) -> Self {
        Self::new(format!("Unknown method: {method}"))
    }
}

impl From<String> for InvocationError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for InvocationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Deserialize positional argument `index` (named `name` in error messages)
pub fn argument<T: DeserializeOwned>(
    args: &[Value],
    index: usize,
    name: &str,
) -> Result<T, InvocationError> {
    let value = args
        .get(index)
        .ok_or_else(|| InvocationError::new(format!("Missing argument: {name}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| InvocationError::new(format!("Invalid argument {name}: {e}")))
}

/// Factory producing a fresh instance of a concrete type
pub type ObjectFactory = Arc<dyn Fn() -> Box<dyn PluginObject> + Send + Sync>;

/// Whether a declared type is a contract or an implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Interface,
    Concrete,
}

/// A formal parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSignature {
    pub name: String,
    pub ty: ParamType,
}

/// A method signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub parameters: Vec<ParameterSignature>,
    pub returns: ParamType,
}

impl MethodSignature {
    /// Method with no parameters returning nothing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: ParamType::Unit,
        }
    }

    /// Append a formal parameter
    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.parameters.push(ParameterSignature {
            name: name.into(),
            ty,
        });
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: ParamType) -> Self {
        self.returns = ty;
        self
    }

    /// Position and signature of the parameter named `name`, ignoring case
    pub fn parameter(&self, name: &str) -> Option<(usize, &ParameterSignature)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
    }
}

/// A type exported by a module
#[derive(Clone)]
pub struct TypeDeclaration {
    /// Fully qualified type name
    pub name: String,
    pub kind: TypeKind,
    pub methods: Vec<MethodSignature>,
    /// Interfaces this type implements (concrete types only)
    pub implements: Vec<String>,
    factory: Option<ObjectFactory>,
}

impl TypeDeclaration {
    /// Declare an interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Interface,
            methods: Vec::new(),
            implements: Vec::new(),
            factory: None,
        }
    }

    /// Declare a concrete type constructed by `factory`
    pub fn concrete<F, O>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> O + Send + Sync + 'static,
        O: PluginObject + 'static,
    {
        Self {
            name: name.into(),
            kind: TypeKind::Concrete,
            methods: Vec::new(),
            implements: Vec::new(),
            factory: Some(Arc::new(move || Box::new(factory()) as Box<dyn PluginObject>)),
        }
    }

    /// Add a method signature
    pub fn method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    /// Mark this type as implementing `interface`
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Whether an instance of this type can stand in for `interface`
    pub fn is_assignable_to(&self, interface: &str) -> bool {
        self.kind == TypeKind::Concrete && self.implements.iter().any(|i| i == interface)
    }

    pub fn factory(&self) -> Option<&ObjectFactory> {
        self.factory.as_ref()
    }
}

impl fmt::Debug for TypeDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDeclaration")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("methods", &self.methods)
            .field("implements", &self.implements)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

/// Everything a module exports
#[derive(Debug, Clone)]
pub struct ModuleDeclaration {
    /// Module identity
    pub name: String,
    pub version: String,
    /// Types in declaration order
    pub types: Vec<TypeDeclaration>,
}

impl ModuleDeclaration {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            types: Vec::new(),
        }
    }

    /// Add a type declaration
    pub fn with_type(mut self, ty: TypeDeclaration) -> Self {
        self.types.push(ty);
        self
    }

    /// Interface types in declaration order
    pub fn interfaces(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.types.iter().filter(|t| t.is_interface())
    }

    /// Concrete types assignable to `interface`, in declaration order
    pub fn implementations_of<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a TypeDeclaration> + 'a {
        self.types.iter().filter(move |t| t.is_assignable_to(interface))
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDeclaration> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Methods visible on `ty`: its own first, then those of the
    /// interfaces it implements. Duplicated names are kept, in that order.
    pub fn visible_methods<'a>(&'a self, ty: &'a TypeDeclaration) -> Vec<&'a MethodSignature> {
        let mut methods: Vec<&MethodSignature> = ty.methods.iter().collect();
        for interface in &ty.implements {
            if let Some(decl) = self.find_type(interface) {
                methods.extend(decl.methods.iter());
            }
        }
        methods
    }
}

/// Export a module declaration from a `cdylib`.
///
/// ```rust,ignore
/// fn declare() -> ModuleDeclaration { /* ... */ }
/// operator_host::declare_module!(declare);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($declare:path) => {
        /// Module entry point resolved by the host
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn _operator_module_declare()
        -> *mut $crate::plugin::api::ModuleDeclaration {
            let declaration: $crate::plugin::api::ModuleDeclaration = $declare();
            Box::into_raw(Box::new(declaration))
        }
    };
}

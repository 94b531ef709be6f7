// ! Descriptor model exchanged with callers
// !
// ! Passive records describing a module, its types, their methods and the
// ! methods' parameters, plus the invocation request contract.

use super::param_type::ParamType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// A loaded module: where it was loaded from and what it declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    /// Path used to load the module
    #[serde(alias = "assemblyPath")]
    pub location: PathBuf,

    /// Module identity as declared by the module itself
    pub name: String,

    /// Interface types, empty when only listing modules
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

/// A type and its methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// Fully qualified type name
    pub name: String,

    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

/// A method and its formal parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub name: String,

    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

/// A parameter: name and declared type, plus a value on the request path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,

    /// Declared type name
    #[serde(rename = "type")]
    pub type_name: String,

    /// Supplied value; omitted on the discovery path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ModuleDescriptor {
    /// Descriptor of a loaded module without type details
    pub fn new(location: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
            types: Vec::new(),
        }
    }

    /// Find a type by name
    pub fn find_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }
}

impl TypeDescriptor {
    /// Find the first method with the given name
    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl ParameterDescriptor {
    /// Discovery-side descriptor: name and type only
    pub fn declared(name: impl Into<String>, ty: &ParamType) -> Self {
        Self {
            name: name.into(),
            type_name: ty.to_string(),
            value: None,
        }
    }

    /// Request-side argument carrying a value
    pub fn argument(name: impl Into<String>, type_name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: Some(value),
        }
    }

    /// Parse the declared type name
    pub fn param_type(&self) -> crate::core::error::HostResult<ParamType> {
        self.type_name.parse()
    }
}

/// Request to invoke a method on a module's type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    /// Module path, or the name of a module in the current generation
    #[serde(alias = "assemblyName")]
    pub module: String,

    /// Fully qualified type name
    pub type_name: String,

    pub method_name: String,

    /// Named arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterDescriptor>>,
}

// ! In-memory modules shared by the unit tests

use crate::plugin::api::{
    InvocationError, MethodSignature, ModuleDeclaration, PluginObject, TypeDeclaration, argument,
};
use crate::plugin::loader::{LoadedModule, ModuleOpener};
use crate::protocol::param_type::ParamType;
use crate::plugin::{PluginError, PluginResult};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct Counter {
    count: i64,
}

impl PluginObject for Counter {
    fn invoke(
        &mut self,
        method: &str,
        _args: Vec<Value>,
    ) -> Result<Option<Value>, InvocationError> {
        match method {
            "Increment" => {
                self.count += 1;
                Ok(Some(json!(self.count)))
            }
            _ => Err(InvocationError::unknown_method(method)),
        }
    }
}

pub fn counter_module(name: &str, interface: &str, implementations: &[&str]) -> ModuleDeclaration {
    let mut module = ModuleDeclaration::new(name, "1.0.0").with_type(
        TypeDeclaration::interface(interface)
            .method(MethodSignature::new("Increment").returns(ParamType::I64)),
    );
    for implementation in implementations {
        module = module.with_type(
            TypeDeclaration::concrete(*implementation, Counter::default).implements(interface),
        );
    }
    module
}

pub struct Greeter;

impl PluginObject for Greeter {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Option<Value>, InvocationError> {
        match method {
            "Greet" => {
                let name: String = argument(&args, 0, "name")?;
                Ok(Some(json!(greet(&name))))
            }
            "Pair" => Ok(Some(Value::Array(args))),
            "Wave" => Ok(None),
            "Fail" => Err(InvocationError::new("greeter is out of words")),
            _ => Err(InvocationError::unknown_method(method)),
        }
    }
}

pub fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

pub fn greeter_module() -> ModuleDeclaration {
    ModuleDeclaration::new("Greeter", "1.0.0")
        .with_type(
            TypeDeclaration::interface("greeter::IGreeter")
                .method(
                    MethodSignature::new("Greet")
                        .param("name", ParamType::String)
                        .returns(ParamType::String),
                )
                .method(
                    MethodSignature::new("Pair")
                        .param("first", ParamType::String)
                        .param("second", ParamType::I32)
                        .returns(ParamType::Json),
                )
                .method(MethodSignature::new("Wave"))
                .method(MethodSignature::new("Fail")),
        )
        .with_type(
            TypeDeclaration::concrete("greeter::Greeter", || Greeter)
                .implements("greeter::IGreeter"),
        )
        .with_type(
            TypeDeclaration::concrete("greeter::Unbound", || Greeter)
                .method(MethodSignature::new("Greet").param("name", ParamType::String)),
        )
}

/// Serves declarations for files by file stem; any other file fails to load
#[derive(Default)]
pub struct MemoryOpener {
    modules: HashMap<String, fn() -> ModuleDeclaration>,
    opened: AtomicUsize,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, stem: &str, declare: fn() -> ModuleDeclaration) -> Self {
        self.modules.insert(stem.to_string(), declare);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ModuleOpener for MemoryOpener {
    fn open(&self, path: &Path) -> PluginResult<LoadedModule> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let declare = self.modules.get(&stem).ok_or_else(|| PluginError::InvalidPlugin {
            path: path.to_path_buf(),
            reason: "not a module".to_string(),
        })?;
        Ok(LoadedModule::from_declaration(path, declare()))
    }
}

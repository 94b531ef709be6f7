//! Greeter module used by the native loading tests

use operator_host::declare_module;
use operator_host::plugin::{
    InvocationError, MethodSignature, ModuleDeclaration, ParamType, PluginObject, TypeDeclaration,
    argument,
};
use serde_json::{Value, json};

#[derive(Default)]
pub struct Greeter {
    greeted: u32,
}

impl Greeter {
    pub fn greet(&mut self, name: &str) -> String {
        self.greeted += 1;
        format!("Hello, {name}!")
    }
}

impl PluginObject for Greeter {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Option<Value>, InvocationError> {
        match method {
            "Greet" => {
                let name: String = argument(&args, 0, "name")?;
                Ok(Some(json!(self.greet(&name))))
            }
            "Repeat" => {
                let text: String = argument(&args, 0, "text")?;
                let times: u32 = argument(&args, 1, "times")?;
                Ok(Some(json!(text.repeat(times as usize))))
            }
            "Count" => Ok(Some(json!(self.greeted))),
            _ => Err(InvocationError::unknown_method(method)),
        }
    }
}

fn declare() -> ModuleDeclaration {
    ModuleDeclaration::new("Greeter", env!("CARGO_PKG_VERSION"))
        .with_type(
            TypeDeclaration::interface("greeter::IGreeter")
                .method(
                    MethodSignature::new("Greet")
                        .param("name", ParamType::String)
                        .returns(ParamType::String),
                )
                .method(
                    MethodSignature::new("Repeat")
                        .param("text", ParamType::String)
                        .param("times", ParamType::U32)
                        .returns(ParamType::String),
                )
                .method(MethodSignature::new("Count").returns(ParamType::U32)),
        )
        .with_type(
            TypeDeclaration::concrete("greeter::Greeter", Greeter::default)
                .implements("greeter::IGreeter"),
        )
}

declare_module!(declare);

// Copyright (c) 2025 Operator Contributors
// SPDX-License-Identifier: MIT

//! # Operator Host
//!
//! A plugin host that discovers native modules in a plugin folder, describes
//! the interfaces they declare and invokes their methods by name with named,
//! loosely typed arguments.
// !
//! ## Features
//!
//! - **Discovery**: every shared library in the plugin folder is loaded on configure
//! - **Interface binding**: each declared interface is bound to its first implementation
//! - **Introspection**: serializable descriptor trees of a module's interface surface
//! - **Dynamic invocation**: type, method and argument resolution by name
//! - **Hot rescans**: optional directory watcher (feature `watch`)
// !
//! ## Quick Start
//!
//! The easiest way to get started is with the prelude module:
//!
//! ```rust
//! use operator_host::prelude::*;
//! ```
//!
//! ### Writing a module
//!
//! A module is a `cdylib` that declares its types through [`declare_module!`]:
//!
//! ```rust
//! use operator_host::prelude::*;
//!
//! struct Greeter;
//!
//! impl PluginObject for Greeter {
//!     fn invoke(
//!         &mut self,
//!         method: &str,
//!         args: Vec<Value>,
//!     ) -> Result<Option<Value>, InvocationError> {
//!         match method {
//!             "Greet" => {
//!                 let name: String = argument(&args, 0, "name")?;
//!                 Ok(Some(json!(format!("Hello, {name}!"))))
//!             }
//!             _ => Err(InvocationError::unknown_method(method)),
//!         }
//!     }
//! }
//!
//! fn declare() -> ModuleDeclaration {
//!     ModuleDeclaration::new("Greeter", "1.0.0")
//!         .with_type(
//!             TypeDeclaration::interface("greeter::IGreeter").method(
//!                 MethodSignature::new("Greet")
//!                     .param("name", ParamType::String)
//!                     .returns(ParamType::String),
//!             ),
//!         )
//!         .with_type(
//!             TypeDeclaration::concrete("greeter::Greeter", || Greeter)
//!                 .implements("greeter::IGreeter"),
//!         )
//! }
//!
//! declare_module!(declare);
//! ```
//!
//! ### Hosting modules
//!
//! ```rust,no_run
//! use operator_host::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> HostResult<()> {
//!     let host = PluginHost::new(HostSettings::default().with_env_overrides());
//!     host.configure().await?;
//!
//!     for name in host.list_modules().await {
//!         let descriptors = host.list_methods(&name).await?;
//!         println!("{}", serde_json::to_string_pretty(&descriptors)?);
//!     }
//!
//!     let args = [ParameterDescriptor::argument("name", "String", json!("Ada"))];
//!     let greeting = host
//!         .invoke("Greeter", "greeter::IGreeter", "Greet", Some(&args[..]))
//!         .await?;
//!     println!("{greeting:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: Errors, structured logging and argument coercion
//! - [`plugin`]: Loader, registry, introspection, invoker and the host itself
//! - [`protocol`]: Serializable descriptors and invoke requests

pub mod core;
pub mod plugin;
pub mod protocol;

// Re-export commonly used types for convenience
pub use core::error::{HostError, HostResult};
pub use plugin::{HostEvent, HostSettings, PluginHost, ScanReport};
pub use protocol::ParamType;
pub use protocol::types::*;

/// Prelude module for convenient imports
///
/// Module re-exports the most commonly used types and traits for easy access.
/// Use `use operator_host::prelude::*;` to import everything you need.
pub mod prelude {
    // Core types
    pub use crate::core::error::{HostError, HostResult};

    // Host side
    pub use crate::plugin::{
        HostEvent, HostSettings, LoadedModule, ModuleOpener, NativeOpener, PluginHost, ScanReport,
    };

    // Module side
    pub use crate::declare_module;
    pub use crate::plugin::{
        InvocationError, MethodSignature, ModuleDeclaration, PluginObject, TypeDeclaration,
        argument,
    };

    // Declared types, descriptors and requests
    pub use crate::protocol::ParamType;
    pub use crate::protocol::types::*;

    // Essential external types
    pub use serde_json::{Value, json};
}

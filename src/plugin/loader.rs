//! Module loader
//!
//! Turns files on disk into [`LoadedModule`]s. The production opener resolves
//! the module entry symbol through `libloading`; other openers (in-memory
//! ones in tests, for instance) plug in through [`ModuleOpener`].

use crate::plugin::api::{
    MODULE_ENTRY_SYMBOL, MethodSignature, ModuleDeclaration, ModuleEntry, TypeDeclaration,
};
use crate::plugin::{PluginError, PluginResult};
use crate::protocol::types::ModuleDescriptor;
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Opens a module file and returns its declaration
pub trait ModuleOpener: Send + Sync {
    fn open(&self, path: &Path) -> PluginResult<LoadedModule>;
}

/// Opener for native shared libraries
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> PluginResult<LoadedModule> {
        info!("Loading module from: {:?}", path);

        let library = unsafe {
            Library::new(path).map_err(|e| {
                error!("Failed to load library: {}", e);
                PluginError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?
        };

        let declaration = unsafe {
            let entry: Symbol<ModuleEntry> = library.get(MODULE_ENTRY_SYMBOL).map_err(|e| {
                error!("Module missing entry symbol: {}", e);
                PluginError::InvalidPlugin {
                    path: path.to_path_buf(),
                    reason: "missing _operator_module_declare export".to_string(),
                }
            })?;

            let raw = entry();
            if raw.is_null() {
                return Err(PluginError::InvalidPlugin {
                    path: path.to_path_buf(),
                    reason: "module declaration was null".to_string(),
                });
            }
            *Box::from_raw(raw)
        };

        Ok(LoadedModule::with_library(path, declaration, library))
    }
}

/// A module that has been loaded into the process
pub struct LoadedModule {
    location: PathBuf,
    declaration: ModuleDeclaration,
    /// type name -> method name -> first visible signature with that name
    methods: HashMap<String, HashMap<String, MethodSignature>>,
    // Declared last: factories and vtables above live in the library and
    // must be dropped before it is unloaded.
    library: Option<Library>,
}

impl LoadedModule {
    /// Wrap a declaration that does not come from a shared library
    pub fn from_declaration(location: impl Into<PathBuf>, declaration: ModuleDeclaration) -> Self {
        let methods = build_method_table(&declaration);
        Self {
            location: location.into(),
            declaration,
            methods,
            library: None,
        }
    }

    fn with_library(location: &Path, declaration: ModuleDeclaration, library: Library) -> Self {
        let mut module = Self::from_declaration(location, declaration);
        module.library = Some(library);
        module
    }

    /// Path the module was loaded from
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Declared module identity
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub fn version(&self) -> &str {
        &self.declaration.version
    }

    pub fn declaration(&self) -> &ModuleDeclaration {
        &self.declaration
    }

    /// Whether a native library backs this module
    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDeclaration> {
        self.declaration.find_type(name)
    }

    /// First method named `method` visible on `type_name`
    pub fn find_method(&self, type_name: &str, method: &str) -> Option<&MethodSignature> {
        self.methods.get(type_name)?.get(method)
    }

    /// Listing descriptor (no type details)
    pub fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(self.location.clone(), self.declaration.name.clone())
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("location", &self.location)
            .field("name", &self.declaration.name)
            .field("version", &self.declaration.version)
            .field("native", &self.library.is_some())
            .finish()
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        if self.library.is_some() {
            debug!("Unloading module {} ({:?})", self.declaration.name, self.location);
        }
    }
}

fn build_method_table(
    declaration: &ModuleDeclaration,
) -> HashMap<String, HashMap<String, MethodSignature>> {
    let mut table: HashMap<String, HashMap<String, MethodSignature>> = HashMap::new();
    for ty in &declaration.types {
        let methods = table.entry(ty.name.clone()).or_default();
        for method in declaration.visible_methods(ty) {
            methods
                .entry(method.name.clone())
                .or_insert_with(|| method.clone());
        }
    }
    table
}

/// Shared-library extensions of the current platform
pub fn default_extensions() -> Vec<String> {
    let ext = if cfg!(windows) {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    };
    vec![ext.to_string()]
}

/// Whether `path` carries one of `extensions` (case-insensitive)
pub fn is_module_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}

/// Module files directly inside `dir`, sorted by path
pub fn discover_modules(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut modules = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_module_file(&path, extensions) {
            modules.push(path);
        }
    }
    modules.sort();
    Ok(modules)
}

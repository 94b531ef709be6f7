// ! Plugin host
// !
// ! Module owns the current load generation and exposes the host operations:
// ! configure, list modules, list methods, invoke.

use crate::core::error::{HostError, HostResult};
use crate::core::logging::{ErrorContext, ErrorLogger};
use crate::plugin::config::HostSettings;
use crate::plugin::introspect::describe_interfaces;
use crate::plugin::invoker;
use crate::plugin::loader::{LoadedModule, ModuleOpener, NativeOpener, discover_modules};
use crate::plugin::registry::ServiceRegistry;
use crate::plugin::HostEvent;
use crate::protocol::types::{InvokeRequest, ModuleDescriptor, ParameterDescriptor};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{Instrument, debug, info, warn};

/// Type alias for event handlers to reduce complexity
type EventHandlers = Vec<Box<dyn Fn(HostEvent) + Send + Sync>>;

/// Modules and bindings produced by one scan
#[derive(Debug, Default)]
struct Generation {
    id: u64,
    modules: Vec<Arc<LoadedModule>>,
    registry: ServiceRegistry,
    descriptors: Vec<ModuleDescriptor>,
}

impl Generation {
    fn find_module(&self, name: &str) -> Option<&Arc<LoadedModule>> {
        self.modules
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    fn module_at(&self, path: &Path) -> Option<&Arc<LoadedModule>> {
        let canonical = std::fs::canonicalize(path).ok();
        self.modules.iter().find(|m| {
            m.location() == path
                || canonical.is_some()
                    && std::fs::canonicalize(m.location()).ok() == canonical
        })
    }
}

/// Outcome of a configure call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Directory that was (or would have been) scanned
    pub directory: PathBuf,

    /// False when the directory did not exist and nothing changed
    pub scanned: bool,

    /// Current generation after the call
    pub generation: u64,

    /// Names of the modules loaded, in scan order
    pub loaded: Vec<String>,

    /// Files that failed to load, with the reason
    pub failures: Vec<(PathBuf, String)>,

    /// Number of interface bindings in the new generation
    pub bindings: usize,
}

/// Host for self-declaring plugin modules
pub struct PluginHost {
    settings: HostSettings,

    /// Turns module files into loaded modules
    opener: Arc<dyn ModuleOpener>,

    /// Current load generation
    generation: RwLock<Arc<Generation>>,

    generation_counter: AtomicU64,

    /// Event handlers
    event_handlers: Arc<RwLock<EventHandlers>>,
}

impl PluginHost {
    /// Create a host loading native shared libraries
    pub fn new(settings: HostSettings) -> Self {
        Self::with_opener(settings, Arc::new(NativeOpener))
    }

    /// Create a host with a custom module opener
    pub fn with_opener(settings: HostSettings, opener: Arc<dyn ModuleOpener>) -> Self {
        Self {
            settings,
            opener,
            generation: RwLock::new(Arc::new(Generation::default())),
            generation_counter: AtomicU64::new(0),
            event_handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Id of the current generation (0 before the first successful scan)
    pub async fn generation(&self) -> u64 {
        self.generation.read().await.id
    }

    /// Scan the configured plugin folder
    pub async fn configure(&self) -> HostResult<ScanReport> {
        self.configure_from(self.settings.plugin_dir()).await
    }

    /// Scan `dir` and make its modules the current generation.
    ///
    /// A missing directory leaves the current generation untouched. Files that
    /// fail to load are skipped and reported. When the scan itself fails the
    /// previous generation is still released and an empty one becomes current.
    pub async fn configure_from(&self, dir: impl AsRef<Path>) -> HostResult<ScanReport> {
        let directory = dir.as_ref().to_path_buf();

        let is_dir = tokio::fs::metadata(&directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            info!("Plugin folder {:?} does not exist, keeping current modules", directory);
            return Ok(ScanReport {
                directory,
                scanned: false,
                generation: self.generation().await,
                ..Default::default()
            });
        }

        let mut events = Vec::new();
        let mut current = self.generation.write().await;

        // Release the previous generation before loading anything new
        let released = std::mem::take(&mut *current);
        if released.id != 0 {
            info!(
                "Releasing generation {} ({} modules)",
                released.id,
                released.modules.len()
            );
            events.push(HostEvent::GenerationReleased {
                generation: released.id,
            });
        }
        drop(released);

        let opener = self.opener.clone();
        let extensions = self.settings.extensions.clone();
        let scan_dir = directory.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            scan_directory(opener.as_ref(), &scan_dir, &extensions)
        })
        .await
        .map_err(|e| HostError::internal(format!("scan task failed: {e}")))
        .and_then(|result| result);

        let id = self.generation_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut generation = Generation {
            id,
            ..Default::default()
        };

        let outcome = match scanned {
            Ok(outcome) => outcome,
            Err(e) => {
                e.log_with_context(
                    &ErrorContext::new("configure")
                        .with_extra("directory", directory.display().to_string()),
                );
                // The previous generation is gone; leave an empty one in its place
                warn!("Scan of {:?} failed, generation {} is empty", directory, id);
                *current = Arc::new(generation);
                drop(current);
                for event in events {
                    self.emit_event(event).await;
                }
                return Err(e);
            }
        };

        let mut report = ScanReport {
            directory: directory.clone(),
            scanned: true,
            generation: id,
            ..Default::default()
        };

        for (path, reason) in outcome.failures {
            events.push(HostEvent::ModuleFailed {
                path: path.clone(),
                reason: reason.clone(),
            });
            report.failures.push((path, reason));
        }

        for module in outcome.modules {
            let module = Arc::new(module);
            info!(
                "Loaded module {} v{} from {:?}",
                module.name(),
                module.version(),
                module.location()
            );
            events.push(HostEvent::ModuleLoaded {
                name: module.name().to_string(),
                path: module.location().to_path_buf(),
            });

            for binding in generation.registry.register_module(&module) {
                events.push(HostEvent::InterfaceBound {
                    interface: binding.interface,
                    implementation: binding.implementation,
                });
            }

            report.loaded.push(module.name().to_string());
            generation.descriptors.push(module.descriptor());
            generation.modules.push(module);
        }

        report.bindings = generation.registry.len();
        info!(
            "Generation {} ready: {} modules, {} bindings, {} failures",
            id,
            report.loaded.len(),
            report.bindings,
            report.failures.len()
        );
        events.push(HostEvent::Configured {
            generation: id,
            modules: report.loaded.len(),
        });

        *current = Arc::new(generation);
        drop(current);

        for event in events {
            self.emit_event(event).await;
        }

        Ok(report)
    }

    /// Names of the modules recorded by the most recent scan
    pub async fn list_modules(&self) -> Vec<String> {
        self.generation
            .read()
            .await
            .descriptors
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    /// Listing descriptors (location and name) of the current generation
    pub async fn loaded_modules(&self) -> Vec<ModuleDescriptor> {
        self.generation.read().await.descriptors.clone()
    }

    /// Describe the interface surface of the module named `name`
    pub async fn list_methods(&self, name: &str) -> HostResult<Vec<ModuleDescriptor>> {
        let generation = self.generation.read().await;
        generation
            .find_module(name)
            .ok_or_else(|| HostError::ModuleNotFound(name.to_string()))
            .and_then(|module| describe_interfaces(module))
            .inspect_err(|e| {
                e.log_with_context(&ErrorContext::new("list_methods").with_module(name))
            })
    }

    /// Invoke `method_name` on `type_name` of `module` with named arguments.
    ///
    /// `module` is a path to a module file or the name of a module in the
    /// current generation. Returns `None` for methods returning nothing.
    pub async fn invoke(
        &self,
        module: &str,
        type_name: &str,
        method_name: &str,
        arguments: Option<&[ParameterDescriptor]>,
    ) -> HostResult<Option<Value>> {
        let context = ErrorContext::new("invoke")
            .with_module(module)
            .with_type(type_name)
            .with_method(method_name);
        let span = ErrorLogger::create_operation_span("invoke", &context);

        self.invoke_inner(module, type_name, method_name, arguments)
            .instrument(span)
            .await
            .inspect_err(|e| e.log_with_context(&context))
    }

    async fn invoke_inner(
        &self,
        module: &str,
        type_name: &str,
        method_name: &str,
        arguments: Option<&[ParameterDescriptor]>,
    ) -> HostResult<Option<Value>> {
        let generation = self.generation.read().await.clone();
        let target = self.resolve_module(&generation, module).await?;

        let call = invoker::prepare(
            &target,
            &generation.registry,
            type_name,
            method_name,
            arguments,
            self.settings.strict_arity,
        )?;
        debug!(
            "Invoking {}.{} with {} arguments",
            call.type_name,
            call.method.name,
            call.arguments.len()
        );

        let task = tokio::task::spawn_blocking(move || {
            let result = call.run();
            drop(target);
            drop(generation);
            result
        });

        let joined = match self.settings.invoke_timeout() {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                HostError::timeout(format!(
                    "{type_name}.{method_name} did not return within {limit:?}"
                ))
            })?,
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(HostError::invocation(format!(
                "{type_name}.{method_name} panicked"
            ))),
            Err(e) => Err(HostError::internal(format!("invocation task failed: {e}"))),
        }
    }

    /// Rescan the plugin folder, then invoke
    pub async fn execute(&self, request: &InvokeRequest) -> HostResult<Option<Value>> {
        self.configure().await?;
        self.invoke(
            &request.module,
            &request.type_name,
            &request.method_name,
            request.parameters.as_deref(),
        )
        .await
    }

    /// Add an event handler
    pub async fn on_event<F>(&self, handler: F)
    where
        F: Fn(HostEvent) + Send + Sync + 'static,
    {
        self.event_handlers.write().await.push(Box::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: HostEvent) {
        let handlers = self.event_handlers.read().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    async fn resolve_module(
        &self,
        generation: &Generation,
        module: &str,
    ) -> HostResult<Arc<LoadedModule>> {
        let path = Path::new(module);
        if path.is_file() {
            if let Some(loaded) = generation.module_at(path) {
                return Ok(loaded.clone());
            }
            return self.open_fresh(path.to_path_buf()).await;
        }

        if let Some(loaded) = generation.find_module(module) {
            return Ok(loaded.clone());
        }

        if path.components().count() > 1 || path.extension().is_some() {
            // Looks like a path; let the opener report why it cannot be loaded
            return self.open_fresh(path.to_path_buf()).await;
        }

        Err(HostError::ModuleNotFound(module.to_string()))
    }

    async fn open_fresh(&self, path: PathBuf) -> HostResult<Arc<LoadedModule>> {
        debug!("Opening {:?} outside the current generation", path);
        let opener = self.opener.clone();
        let module = tokio::task::spawn_blocking(move || opener.open(&path))
            .await
            .map_err(|e| HostError::internal(format!("load task failed: {e}")))??;
        Ok(Arc::new(module))
    }
}

/// Modules opened by a directory scan
struct ScanOutcome {
    modules: Vec<LoadedModule>,
    failures: Vec<(PathBuf, String)>,
}

fn scan_directory(
    opener: &dyn ModuleOpener,
    dir: &Path,
    extensions: &[String],
) -> HostResult<ScanOutcome> {
    let mut outcome = ScanOutcome {
        modules: Vec::new(),
        failures: Vec::new(),
    };

    for path in discover_modules(dir, extensions)? {
        match opener.open(&path) {
            Ok(module) => outcome.modules.push(module),
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                outcome.failures.push((path, e.to_string()));
            }
        }
    }

    Ok(outcome)
}

// ! File system watcher for the plugin folder
// !
// ! Module watches the plugin folder and rescans it when module files appear,
// ! change or disappear.

use crate::plugin::loader::is_module_file;
use crate::plugin::{PluginError, PluginHost, PluginResult};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Rescans the plugin folder on changes
pub struct PluginWatcher {
    /// File system watcher
    watcher: Option<notify::RecommendedWatcher>,

    /// Host to reconfigure
    host: Arc<PluginHost>,

    /// Watched directory
    directory: PathBuf,

    /// Quiet period before a rescan
    debounce: Duration,

    /// Rescan task
    task: Option<JoinHandle<()>>,
}

impl PluginWatcher {
    /// Create a watcher for the host's plugin folder
    pub fn new(host: Arc<PluginHost>) -> Self {
        let directory = host.settings().plugin_dir();
        let debounce = host.settings().watch_debounce();
        Self {
            watcher: None,
            host,
            directory,
            debounce,
            task: None,
        }
    }

    /// Watch `directory` instead of the configured plugin folder
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set debounce time in milliseconds
    pub fn set_debounce(&mut self, ms: u64) {
        self.debounce = Duration::from_millis(ms);
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> PluginResult<()> {
        if self.is_watching() {
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let extensions = self.host.settings().extensions.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if is_relevant(&event, &extensions) => {
                    if tx.send(event).is_err() {
                        debug!("Rescan task gone, dropping watch event");
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Watch error: {}", e),
            }
        })
        .map_err(|e| PluginError::Watch(format!("Failed to create watcher: {e}")))?;

        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| {
                PluginError::Watch(format!(
                    "Failed to watch directory {}: {e}",
                    self.directory.display()
                ))
            })?;

        self.task = Some(tokio::spawn(rescan_loop(
            rx,
            self.host.clone(),
            self.directory.clone(),
            self.debounce,
        )));
        self.watcher = Some(watcher);

        info!("Watching plugin directory: {:?}", self.directory);
        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!("Plugin watcher stopped");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PluginWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn rescan_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    host: Arc<PluginHost>,
    directory: PathBuf,
    debounce: Duration,
) {
    while let Some(event) = rx.recv().await {
        debug!("Plugin folder changed: {:?}", event.paths);

        // Collapse a burst of events into one rescan
        tokio::time::sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        info!("Rescanning plugin directory {:?}", directory);
        if let Err(e) = host.configure_from(&directory).await {
            error!("Rescan of {:?} failed: {}", directory, e);
        }
    }
}

/// Whether `event` adds, changes or removes a module file
fn is_relevant(event: &Event, extensions: &[String]) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| is_module_file(p, extensions))
}

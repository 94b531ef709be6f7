// ! Host configuration
// !
// ! Module handles the host settings file and its defaults.

use crate::core::error::{HostError, HostResult};
use crate::plugin::loader::default_extensions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the plugin folder
pub const PLUGIN_FOLDER_ENV: &str = "OPERATOR_PLUGIN_FOLDER";

/// Directory name used when no plugin folder is configured
pub const DEFAULT_PLUGIN_DIR: &str = "Plugins";

/// Host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Plugin directory (defaults to `Plugins` next to the executable)
    #[serde(default, alias = "PluginFolder", alias = "pluginFolder")]
    pub plugin_folder: Option<PathBuf>,

    /// File extensions treated as loadable modules
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Upper bound for a single method invocation (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke_timeout_ms: Option<u64>,

    /// Fail calls that bind fewer arguments than the method declares
    #[serde(default)]
    pub strict_arity: bool,

    /// Debounce for the directory watcher (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub watch_debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            plugin_folder: None,
            extensions: default_extensions(),
            invoke_timeout_ms: None,
            strict_arity: false,
            watch_debounce_ms: default_debounce_ms(),
        }
    }
}

impl HostSettings {
    /// Set the plugin folder
    pub fn with_plugin_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_folder = Some(path.into());
        self
    }

    /// Set the module file extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Bound every invocation, at millisecond precision
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Enable strict arity checking
    pub fn with_strict_arity(mut self) -> Self {
        self.strict_arity = true;
        self
    }

    /// Effective plugin directory
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin_folder
            .clone()
            .unwrap_or_else(default_plugin_dir)
    }

    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_ms.map(Duration::from_millis)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (environment-style key lookup)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(folder) = lookup(PLUGIN_FOLDER_ENV).filter(|v| !v.trim().is_empty()) {
            self.plugin_folder = Some(PathBuf::from(folder));
        }
        self
    }

    /// Check the settings for values the host cannot work with
    pub fn validate(&self) -> HostResult<()> {
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(HostError::configuration(
                "at least one module file extension is required",
            ));
        }
        if self.invoke_timeout_ms == Some(0) {
            return Err(HostError::configuration(
                "invoke_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Load settings from a YAML file
    pub async fn from_file(path: impl AsRef<Path>) -> HostResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let settings: Self = serde_yaml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub async fn to_file(&self, path: impl AsRef<Path>) -> HostResult<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn default_plugin_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PLUGIN_DIR)
}

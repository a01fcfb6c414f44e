//! TOML-file implementation of the configuration seam.
//!
//! The whole configuration lives in one file, read on open and rewritten
//! after every mutation. Mutations go through [`FileConfig`] so the
//! in-memory copy, the file on disk, and the model's change watcher stay
//! in step.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use jobmirror_model::{ConfigSource, ServerEntry};
use jobmirror_protocol::KindOverrides;

/// Configuration handling failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no configuration directory on this platform")]
    NoConfigDir,
    #[error("server already configured: {0}")]
    DuplicateServer(Url),
    #[error("no such server: {0}")]
    UnknownServer(Url),
}

/// The on-disk layout. The override sets flatten to top-level keys and
/// serialize before the server tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(flatten)]
    overrides: KindOverrides,
    #[serde(default)]
    servers: Vec<ServerEntry>,
}

/// [`ConfigSource`] backed by a TOML file.
pub struct FileConfig {
    path: PathBuf,
    state: Mutex<ConfigFile>,
    tx: watch::Sender<()>,
}

impl FileConfig {
    /// Open the configuration at `path`, starting empty when the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(file),
            tx: watch::channel(()).0,
        })
    }

    /// Open the configuration at the platform's default location.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(Self::default_path()?)
    }

    /// The platform's default configuration path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("jobmirror").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// The file this configuration persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a server. The URL must not already be configured.
    pub fn add_server(&self, url: Url, label: String) -> Result<(), ConfigError> {
        self.mutate(|file| {
            if file.servers.iter().any(|s| s.url == url) {
                return Err(ConfigError::DuplicateServer(url.clone()));
            }
            file.servers.push(ServerEntry { url: url.clone(), label: label.clone() });
            Ok(())
        })
    }

    /// Remove the server configured at `url`.
    pub fn remove_server(&self, url: &Url) -> Result<(), ConfigError> {
        self.mutate(|file| {
            let before = file.servers.len();
            file.servers.retain(|s| &s.url != url);
            if file.servers.len() == before {
                return Err(ConfigError::UnknownServer(url.clone()));
            }
            Ok(())
        })
    }

    /// Change the label of the server configured at `url`.
    pub fn rename_server(&self, url: &Url, label: String) -> Result<(), ConfigError> {
        self.mutate(|file| {
            let entry = file
                .servers
                .iter_mut()
                .find(|s| &s.url == url)
                .ok_or_else(|| ConfigError::UnknownServer(url.clone()))?;
            entry.label = label.clone();
            Ok(())
        })
    }

    /// Force a class name to classify as a job.
    pub fn force_job_class(&self, class_name: &str) -> Result<(), ConfigError> {
        self.mutate(|file| {
            file.overrides.force_job(class_name);
            Ok(())
        })
    }

    /// Force a class name to classify as a job container.
    pub fn force_container_class(&self, class_name: &str) -> Result<(), ConfigError> {
        self.mutate(|file| {
            file.overrides.force_container(class_name);
            Ok(())
        })
    }

    /// Remove a class name from both override sets.
    pub fn clear_class(&self, class_name: &str) -> Result<(), ConfigError> {
        self.mutate(|file| {
            file.overrides.clear(class_name);
            Ok(())
        })
    }

    /// Apply one mutation, persist the result, and signal watchers. The
    /// in-memory state commits only after the file write succeeds, so a
    /// failed mutation leaves memory and disk untouched and stays silent.
    fn mutate(
        &self,
        op: impl FnOnce(&mut ConfigFile) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        {
            let mut state = self.state.lock();
            let mut next = state.clone();
            op(&mut next)?;
            self.persist(&next)?;
            *state = next;
        }
        let _ = self.tx.send(());
        Ok(())
    }

    fn persist(&self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(file)?;
        std::fs::write(&self.path, text)?;
        tracing::debug!(path = %self.path.display(), "configuration written");
        Ok(())
    }
}

impl ConfigSource for FileConfig {
    fn servers(&self) -> Vec<ServerEntry> {
        self.state.lock().servers.clone()
    }

    fn overrides(&self) -> KindOverrides {
        self.state.lock().overrides.clone()
    }

    fn watch(&self) -> watch::Receiver<()> {
        self.tx.subscribe()
    }
}

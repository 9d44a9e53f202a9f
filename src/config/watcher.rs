//! Security settings hot reload.
//!
//! Only the filter thresholds and pattern policy change at runtime. A reloaded
//! file is still loaded and validated in full, so a file the server could not
//! start with is never half-applied.
//!
//! The parent directory is watched rather than the file itself: editors and
//! deploy tools usually replace the file through a rename, which would detach
//! a watch held on the old inode.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::loader::{load_config_str, ConfigError};
use crate::security::SecuritySettings;

/// Why a changed file was not applied.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid security pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Load `path` and derive the security settings it describes.
///
/// Returns `Ok(None)` for an empty file, which is what a reader sees in the
/// middle of a truncate-then-write.
pub fn reload_security_settings(path: &Path) -> Result<Option<SecuritySettings>, ReloadError> {
    let content = fs::read_to_string(path).map_err(ConfigError::from)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let config = load_config_str(&content)?;
    Ok(Some(SecuritySettings::from_config(&config.security)?))
}

/// Watches one config file and emits the security settings of each valid
/// revision.
pub struct ConfigWatcher {
    path: PathBuf,
    settings_tx: mpsc::UnboundedSender<SecuritySettings>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for new settings.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<SecuritySettings>) {
        let (settings_tx, settings_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                settings_tx,
            },
            settings_rx,
        )
    }

    /// Start watching. Notifications stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watched_dir(&self.path).to_path_buf();
        let file_name = self.path.file_name().map(OsString::from);
        let path = self.path.clone();
        let tx = self.settings_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, file_name.as_deref()) => apply(&path, &tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Watching config for security settings changes");
        Ok(watcher)
    }
}

fn apply(path: &Path, tx: &mpsc::UnboundedSender<SecuritySettings>) {
    match reload_security_settings(path) {
        Ok(Some(settings)) => {
            if tx.send(settings).is_err() {
                tracing::warn!(path = ?path, "Config changed but the server is no longer listening");
            }
        }
        Ok(None) => tracing::debug!(path = ?path, "Config file empty, waiting for the write to finish"),
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Rejected config change, keeping current security settings")
        }
    }
}

fn watched_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == file_name)
}

//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so a file
//! replaced by rename (editor save, mounted ConfigMap) keeps reloading.
//! Events are filtered down to the configured file name and a reload is
//! only pushed when the file content actually changed.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ProxyConfig;

/// Errors raised while setting up the watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("config path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("failed to watch config directory: {0}")]
    Notify(#[from] notify::Error),
}

/// Running watch on one configuration file. Dropping it stops reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching `path`. Every valid new version of the file is sent
    /// down the returned channel; invalid versions are logged and skipped.
    pub fn start(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<ProxyConfig>), WatchError> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| WatchError::NoFileName(path.to_path_buf()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let (updates, updates_rx) = mpsc::unbounded_channel();
        let mut reloader = Reloader {
            path: path.to_path_buf(),
            last_seen: fs::read_to_string(path).ok(),
            updates,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_file(&event, &file_name) => reloader.reload(),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), dir = %dir.display(), "Watching config file");
        Ok((
            Self {
                path: path.to_path_buf(),
                _watcher: watcher,
            },
            updates_rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Reloader {
    path: PathBuf,
    last_seen: Option<String>,
    updates: mpsc::UnboundedSender<ProxyConfig>,
}

impl Reloader {
    fn reload(&mut self) {
        // Gone between a remove and the following create; wait for the create.
        let Ok(content) = fs::read_to_string(&self.path) else {
            return;
        };
        // Truncated by an in-place write that has not landed yet.
        if content.trim().is_empty() {
            return;
        }
        if self.last_seen.as_deref() == Some(content.as_str()) {
            return;
        }

        match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "Config file changed, reloading");
                self.last_seen = Some(content);
                if self.updates.send(config).is_err() {
                    tracing::debug!("Config receiver dropped");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Invalid config file, keeping current configuration");
            }
        }
    }
}

/// Whether `event` creates, rewrites or renames onto the watched file.
fn touches_file(event: &Event, file_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

//! Workspace discovery.
//!
//! Descriptors come from three merged sources: the on-disk registry file,
//! ad hoc in-process registrations, and directory scanning. On a path
//! collision the registry file wins, then ad hoc registrations, then scan
//! results. A debounced file watch re-parses the registry whenever it
//! changes on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Effect, Transience};

/// Quiet period before a registry change is reported.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// One discoverable workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDescriptor {
    pub path: PathBuf,
    pub database: String,
    pub pid: u32,
    pub version: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    workspaces: Vec<WorkspaceDescriptor>,
}

/// Per-directory manifest picked up by scanning; the path is the directory
/// it was found in.
#[derive(Debug, Deserialize)]
struct ScannedManifest {
    database: String,
    #[serde(default)]
    pid: u32,
    #[serde(default)]
    version: String,
}

const SCAN_MANIFEST: &str = "workspace.json";

/// Workspace discovery errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkspaceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("registry watch failed: {0}")]
    Watch(String),
}

impl WorkspaceError {
    pub fn transience(&self) -> Transience {
        match self {
            WorkspaceError::Parse { .. } => Transience::Permanent,
            WorkspaceError::Read { .. } | WorkspaceError::Watch(_) => Transience::Unknown,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Merged workspace catalog.
pub struct WorkspaceCatalog {
    registry_path: PathBuf,
    scan_roots: Vec<PathBuf>,
    adhoc: Mutex<BTreeMap<PathBuf, WorkspaceDescriptor>>,
}

impl WorkspaceCatalog {
    pub fn new(registry_path: PathBuf, scan_roots: Vec<PathBuf>) -> Self {
        Self {
            registry_path,
            scan_roots,
            adhoc: Mutex::new(BTreeMap::new()),
        }
    }

    /// Catalog on the default registry path, without scan roots.
    pub fn with_default_paths() -> Self {
        Self::new(crate::paths::workspace_registry_path(), Vec::new())
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Register a workspace known to this process only.
    pub fn register_adhoc(&self, descriptor: WorkspaceDescriptor) {
        if let Ok(mut adhoc) = self.adhoc.lock() {
            adhoc.insert(descriptor.path.clone(), descriptor);
        }
    }

    /// All known workspaces, deduplicated by path.
    ///
    /// A corrupt registry file degrades to the other two sources with a
    /// warning rather than hiding every workspace.
    pub fn merged(&self) -> Vec<WorkspaceDescriptor> {
        let mut by_path: BTreeMap<PathBuf, WorkspaceDescriptor> = BTreeMap::new();

        for descriptor in self.scan() {
            by_path.insert(descriptor.path.clone(), descriptor);
        }

        if let Ok(adhoc) = self.adhoc.lock() {
            for descriptor in adhoc.values() {
                by_path.insert(descriptor.path.clone(), descriptor.clone());
            }
        }

        match parse_registry(&self.registry_path) {
            Ok(from_file) => {
                for descriptor in from_file {
                    by_path.insert(descriptor.path.clone(), descriptor);
                }
            }
            Err(WorkspaceError::Read { .. }) => {}
            Err(e) => warn!(error = %e, "workspace registry unreadable, using other sources"),
        }

        by_path.into_values().collect()
    }

    /// The registry file's contents alone. Absent file reads as empty.
    pub fn read_registry(&self) -> Result<Vec<WorkspaceDescriptor>, WorkspaceError> {
        if !self.registry_path.exists() {
            return Ok(Vec::new());
        }
        parse_registry(&self.registry_path)
    }

    /// Watch the registry file and invoke `on_change` with the freshly
    /// parsed registry after each debounced change.
    pub fn watch_registry<F>(
        &self,
        quiet: Duration,
        on_change: F,
    ) -> Result<RegistryWatch, WorkspaceError>
    where
        F: Fn(Vec<WorkspaceDescriptor>) + Send + 'static,
    {
        let registry_path = self.registry_path.clone();
        let watch_dir = registry_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&watch_dir).map_err(|e| WorkspaceError::Read {
            path: watch_dir.clone(),
            source: e,
        })?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer =
            new_debouncer(quiet, tx).map_err(|e| WorkspaceError::Watch(e.to_string()))?;
        // The file may not exist yet; watching its directory catches creation.
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| WorkspaceError::Watch(e.to_string()))?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        std::thread::spawn(move || {
            while thread_running.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(Ok(events)) => {
                        let touches_registry = events
                            .iter()
                            .any(|event| event.path == registry_path);
                        if !touches_registry {
                            continue;
                        }
                        match parse_registry(&registry_path) {
                            Ok(workspaces) => on_change(workspaces),
                            Err(e) => warn!(error = %e, "registry changed but did not parse"),
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "registry watcher error"),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            drop(debouncer);
        });

        Ok(RegistryWatch { running })
    }

    fn scan(&self) -> Vec<WorkspaceDescriptor> {
        let mut found = Vec::new();
        for root in &self.scan_roots {
            let Ok(entries) = fs::read_dir(root) else {
                debug!(root = %root.display(), "scan root unreadable");
                continue;
            };
            for entry in entries.flatten() {
                let dir = entry.path();
                let manifest = dir.join(SCAN_MANIFEST);
                let Ok(contents) = fs::read_to_string(&manifest) else {
                    continue;
                };
                match serde_json::from_str::<ScannedManifest>(&contents) {
                    Ok(parsed) => found.push(WorkspaceDescriptor {
                        path: dir,
                        database: parsed.database,
                        pid: parsed.pid,
                        version: parsed.version,
                    }),
                    Err(e) => {
                        debug!(manifest = %manifest.display(), error = %e, "skipping bad manifest")
                    }
                }
            }
        }
        found
    }
}

fn parse_registry(path: &Path) -> Result<Vec<WorkspaceDescriptor>, WorkspaceError> {
    let contents = fs::read_to_string(path).map_err(|e| WorkspaceError::Read {
        path: path.to_owned(),
        source: e,
    })?;
    let parsed: RegistryFile =
        serde_json::from_str(&contents).map_err(|e| WorkspaceError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
    Ok(parsed.workspaces)
}

/// Handle for a running registry watch.
pub struct RegistryWatch {
    running: Arc<AtomicBool>,
}

impl RegistryWatch {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for RegistryWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Preference persistence.
//!
//! View/filter/theme choices live in a small key-value store keyed by fixed
//! string names. Not part of the sync engine's contract; losing this file
//! costs nothing but a default view.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub const PREF_VIEW: &str = "view";
pub const PREF_FILTERS: &str = "filters";
pub const PREF_THEME: &str = "theme";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prefs {
    values: BTreeMap<String, String>,
}

impl Prefs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!("prefs parse failed, using defaults: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_vec_pretty(&self.values).map_err(|e| ConfigError::Write {
            path: path.to_owned(),
            reason: format!("failed to render prefs: {e}"),
        })?;
        crate::config::atomic_write(path, &contents)
    }
}

pub fn prefs_path() -> PathBuf {
    crate::paths::prefs_path()
}

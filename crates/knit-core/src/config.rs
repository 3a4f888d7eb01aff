//! Process-wide settings: which projects exist and which one is current.

use crate::atomic::write_atomic;
use crate::{KnitError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the settings document inside the state directory
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Directory name under the platform config dir
pub const APP_DIR: &str = "knit";

/// Settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Project acted on when none is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_project: Option<PathBuf>,

    /// Known projects, in creation order
    #[serde(default)]
    pub available_projects: Vec<PathBuf>,

    /// Cache of the current project's default counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_counter: Option<String>,

    /// Where new projects go when no directory is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_dir: Option<PathBuf>,
}

impl Config {
    pub fn is_registered(&self, identifier: &Path) -> bool {
        self.available_projects.iter().any(|p| p == identifier)
    }

    /// Append a project identifier; duplicates are refused.
    pub fn register(&mut self, identifier: &Path) -> Result<()> {
        if self.is_registered(identifier) {
            return Err(KnitError::ProjectAlreadyExists(identifier.to_path_buf()));
        }
        self.available_projects.push(identifier.to_path_buf());
        Ok(())
    }

    /// Find a registered project by exact identifier, or by short name when
    /// exactly one registered project has that file stem.
    pub fn find_project(&self, identifier: &str) -> Option<&Path> {
        let as_path = Path::new(identifier);
        if let Some(found) = self.available_projects.iter().find(|p| *p == as_path) {
            return Some(found.as_path());
        }

        let mut by_name = self
            .available_projects
            .iter()
            .filter(|p| p.file_stem().is_some_and(|stem| stem == identifier));
        match (by_name.next(), by_name.next()) {
            (Some(found), None) => Some(found.as_path()),
            _ => None,
        }
    }

    /// Directory for new projects, relative to the state directory when unset
    pub fn projects_dir(&self, state_dir: &Path) -> PathBuf {
        match &self.projects_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => state_dir.join(dir),
            None => state_dir.join("projects"),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for project in &self.available_projects {
            if !seen.insert(project) {
                return Err(format!(
                    "project {} is listed more than once",
                    project.display()
                ));
            }
        }
        Ok(())
    }
}

/// Reads and writes the settings document at a fixed location
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store for `<state_dir>/config.yaml`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(CONFIG_FILENAME))
    }

    /// Platform default state directory
    pub fn default_state_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".knit"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the settings, or the bootstrap default when none exist yet.
    /// The default is not written; callers persist it with [`save`].
    ///
    /// [`save`]: ConfigStore::save
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?self.path, "Config file not found, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };

        // An empty document is a valid, empty config for YAML
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| KnitError::ConfigCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?
        };

        config.validate().map_err(|message| KnitError::ConfigCorrupt {
            path: self.path.clone(),
            message,
        })?;

        debug!(
            path = ?self.path,
            projects = config.available_projects.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Atomically replace the settings document
    pub fn save(&self, config: &Config) -> Result<()> {
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| KnitError::InvalidValue(format!("cannot serialize config: {e}")))?;
        write_atomic(&self.path, yaml.as_bytes())?;

        debug!(path = ?self.path, "Saved config");
        Ok(())
    }
}

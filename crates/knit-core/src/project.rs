//! Project documents and their persistence.

use crate::atomic::{create_exclusive, write_atomic};
use crate::counter::{Counter, Counters};
use crate::{KnitError, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of project documents
pub const PROJECT_EXTENSION: &str = "json";

/// A knitting project as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Short name, fixed at creation
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Counter used when none is named. Empty while there are no counters.
    #[serde(default)]
    pub default: String,

    #[serde(default)]
    pub counters: Counters,
}

impl Project {
    /// An empty project with no counters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: String::new(),
            counters: Counters::new(),
        }
    }

    /// Look up a counter by name
    pub fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.get(name)
    }

    /// Check the document-level invariants: every count is inside its
    /// rollover range and a non-empty project's default names a counter.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, counter) in self.counters.iter() {
            if !counter.is_valid() {
                return Err(format!(
                    "counter '{}' has count {} outside its rollover {}",
                    name,
                    counter.count,
                    counter.rollover.map_or(0, |r| r.get())
                ));
            }
        }

        if !self.counters.is_empty() && !self.counters.contains(&self.default) {
            return Err(format!(
                "default counter '{}' is not one of the project's counters",
                self.default
            ));
        }

        Ok(())
    }

    fn to_json(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| KnitError::InvalidValue(format!("cannot serialize project: {e}")))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Anchor a relative path at the working directory. Identifiers are stored
/// in the config and must resolve the same from anywhere.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Reject names that would escape the projects directory or produce an
/// unusable file name.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(KnitError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A project bound to the file it was loaded from or created at.
///
/// The path and name are fixed for the lifetime of the value, so saving
/// always writes back to the same document.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    path: PathBuf,
    name: String,
    pub project: Project,
}

impl ProjectFile {
    /// Identifier of a project named `name` inside `directory`
    pub fn identifier_for(directory: &Path, name: &str) -> PathBuf {
        directory.join(format!("{name}.{PROJECT_EXTENSION}"))
    }

    /// Read and validate the document at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KnitError::ProjectNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let project: Project =
            serde_json::from_str(&content).map_err(|e| KnitError::ProjectCorrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        project
            .validate()
            .map_err(|message| KnitError::ProjectCorrupt {
                path: path.to_path_buf(),
                message,
            })?;

        debug!(path = ?path, counters = project.counters.len(), "Loaded project");

        Ok(Self {
            path: path.to_path_buf(),
            name: project.name.clone(),
            project,
        })
    }

    /// Write a brand new document at `path`. Never overwrites.
    pub fn create(path: &Path, project: Project) -> Result<Self> {
        project.validate().map_err(KnitError::InvalidValue)?;

        let bytes = project.to_json()?;
        create_exclusive(path, &bytes).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => KnitError::ProjectAlreadyExists(path.to_path_buf()),
            _ => KnitError::Io(e),
        })?;

        debug!(path = ?path, name = %project.name, "Created project");

        Ok(Self {
            path: path.to_path_buf(),
            name: project.name.clone(),
            project,
        })
    }

    /// Atomically rewrite the document
    pub fn save(&self) -> Result<()> {
        if self.project.name != self.name {
            return Err(KnitError::InvalidValue(format!(
                "project name is fixed at '{}', refusing to save as '{}'",
                self.name, self.project.name
            )));
        }
        self.project.validate().map_err(KnitError::InvalidValue)?;

        let bytes = self.project.to_json()?;
        write_atomic(&self.path, &bytes)?;

        debug!(path = ?self.path, "Saved project");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

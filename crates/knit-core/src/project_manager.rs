//! Entry point for the command dispatcher.
//!
//! Each operation loads what it needs, mutates in memory, and writes every
//! touched document once at the end. Nothing is written when an operation
//! fails.

use crate::config::{Config, ConfigStore};
use crate::counter::{self, increment, resolve_default};
use crate::input::InputProvider;
use crate::lifecycle::{self, ProjectSetup};
use crate::lock::{NoLock, StateLock};
use crate::project::ProjectFile;
use crate::switch;
use crate::{KnitError, Result};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementOutcome {
    pub project: String,
    pub identifier: PathBuf,
    pub counter: String,
    pub previous: u64,
    pub count: u64,
    pub rollover: Option<NonZeroU64>,
    /// The count passed its rollover in either direction
    pub wrapped: bool,
    /// An unbounded count would have gone negative and was held at zero
    pub clamped: bool,
}

/// State of one entry in `available_projects`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Ok { name: String, counters: usize },
    /// Listed but the document is gone
    Missing,
    Corrupt(String),
}

/// A registered project as seen by [`ProjectManager::list_projects`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
    pub identifier: PathBuf,
    pub current: bool,
    pub status: EntryStatus,
}

/// Manages projects and counters under one state directory
pub struct ProjectManager {
    state_dir: PathBuf,
    store: ConfigStore,
    lock: Box<dyn StateLock>,
}

impl ProjectManager {
    /// Manager for `state_dir`, without cross-process locking
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            store: ConfigStore::in_dir(&state_dir),
            state_dir,
            lock: Box::new(NoLock),
        }
    }

    /// Replace the locking strategy used by mutating operations
    pub fn with_lock(mut self, lock: impl StateLock + 'static) -> Self {
        self.lock = Box::new(lock);
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Whether the settings document has been written yet
    pub fn is_initialized(&self) -> bool {
        self.store.exists()
    }

    /// Write the default settings and projects directory on first run.
    pub fn bootstrap(&self) -> Result<Config> {
        let config = self.store.load()?;
        if !self.store.exists() {
            let _guard = self.lock.acquire()?;
            self.store.save(&config)?;
            std::fs::create_dir_all(config.projects_dir(&self.state_dir))?;
            info!(path = ?self.store.path(), "Initialized knit state directory");
        }
        Ok(config)
    }

    pub fn config(&self) -> Result<Config> {
        self.store.load()
    }

    /// The project named by `current_project`
    pub fn current_project(&self) -> Result<ProjectFile> {
        let config = self.store.load()?;
        let path = config
            .current_project
            .as_deref()
            .ok_or(KnitError::NoCurrentProject)?;
        ProjectFile::load(path)
    }

    /// Load a registered project by identifier or short name
    pub fn load_project(&self, identifier: &str) -> Result<ProjectFile> {
        let config = self.store.load()?;
        let path = config
            .find_project(identifier)
            .ok_or_else(|| KnitError::UnknownProject(identifier.to_string()))?;
        ProjectFile::load(path)
    }

    /// Every registered project with whether its document still loads
    pub fn list_projects(&self) -> Result<Vec<ProjectEntry>> {
        let config = self.store.load()?;
        let entries = config
            .available_projects
            .iter()
            .map(|identifier| {
                let status = match ProjectFile::load(identifier) {
                    Ok(file) => EntryStatus::Ok {
                        name: file.project.name,
                        counters: file.project.counters.len(),
                    },
                    Err(KnitError::ProjectNotFound(_)) => {
                        warn!(path = ?identifier, "Registered project is missing");
                        EntryStatus::Missing
                    }
                    Err(e) => EntryStatus::Corrupt(e.to_string()),
                };
                ProjectEntry {
                    identifier: identifier.clone(),
                    current: config.current_project.as_ref() == Some(identifier),
                    status,
                }
            })
            .collect();
        Ok(entries)
    }

    /// Create a project and record it in the config
    pub fn create_project(
        &self,
        setup: &ProjectSetup,
        input: &mut dyn InputProvider,
    ) -> Result<ProjectFile> {
        let _guard = self.lock.acquire()?;
        let mut config = self.store.load()?;

        let file = lifecycle::setup_project(setup, &mut config, &self.state_dir, input)?;
        self.store.save(&config)?;
        Ok(file)
    }

    /// Adopt an existing project document
    pub fn register_project(&self, identifier: &Path) -> Result<ProjectFile> {
        let _guard = self.lock.acquire()?;
        let mut config = self.store.load()?;

        let file = lifecycle::register_project(identifier, &mut config)?;
        self.store.save(&config)?;
        Ok(file)
    }

    /// Step a counter of the current project. `None` means its default.
    pub fn increment(&self, counter: Option<&str>, delta: i64) -> Result<IncrementOutcome> {
        let _guard = self.lock.acquire()?;
        let config = self.store.load()?;
        let path = config
            .current_project
            .as_deref()
            .ok_or(KnitError::NoCurrentProject)?;

        let outcome = increment_at(path, counter, delta)?;
        if counter.is_none() && config.default_counter.as_deref() != Some(outcome.counter.as_str()) {
            debug!(
                cached = ?config.default_counter,
                actual = %outcome.counter,
                "Cached default counter is stale"
            );
        }
        Ok(outcome)
    }

    /// Step a counter of a specific registered project
    pub fn increment_project(
        &self,
        identifier: &Path,
        counter: Option<&str>,
        delta: i64,
    ) -> Result<IncrementOutcome> {
        let _guard = self.lock.acquire()?;
        let config = self.store.load()?;
        if !config.is_registered(identifier) {
            return Err(KnitError::UnknownProject(identifier.display().to_string()));
        }
        increment_at(identifier, counter, delta)
    }

    /// Make another registered project current
    pub fn switch_project(&self, identifier: &str) -> Result<ProjectFile> {
        let _guard = self.lock.acquire()?;
        let mut config = self.store.load()?;

        let file = switch::switch_project(identifier, &mut config)?;
        self.store.save(&config)?;
        Ok(file)
    }

    /// Change the current project's default counter.
    ///
    /// The project document is saved first; the config cache is refreshed
    /// afterwards, so a failure in between leaves only a stale cache.
    pub fn switch_default_counter(&self, name: &str) -> Result<ProjectFile> {
        let _guard = self.lock.acquire()?;
        let mut config = self.store.load()?;
        let path = config
            .current_project
            .clone()
            .ok_or(KnitError::NoCurrentProject)?;

        let mut file = ProjectFile::load(&path)?;
        switch::switch_default_counter(name, &mut file.project)?;
        file.save()?;

        if switch::refresh_default_cache(&mut config, &file) {
            self.store.save(&config)?;
        }
        Ok(file)
    }
}

/// Load, step and save one counter of the project at `path`
fn increment_at(path: &Path, counter: Option<&str>, delta: i64) -> Result<IncrementOutcome> {
    let mut file = ProjectFile::load(path)?;
    let name = resolve_default(counter, &file.project)?.to_string();

    let slot = file
        .project
        .counters
        .get_mut(&name)
        .ok_or_else(|| KnitError::unknown_counter(&name, Vec::<&str>::new()))?;
    let before = *slot;
    let after = increment(&before, delta)?;
    *slot = after;

    file.save()?;

    let unwrapped = i128::from(before.count) + i128::from(delta);
    let outcome = IncrementOutcome {
        project: file.project.name.clone(),
        identifier: file.path().to_path_buf(),
        counter: name,
        previous: before.count,
        count: after.count,
        rollover: after.rollover,
        wrapped: after.rollover.is_some() && unwrapped != i128::from(after.count),
        clamped: after.rollover.is_none() && unwrapped < 0,
    };

    info!(
        project = %outcome.project,
        counter = %outcome.counter,
        delta,
        count = outcome.count,
        wrapped = outcome.wrapped,
        "Counter incremented"
    );
    Ok(outcome)
}

/// Parse an amount and step the current project's counter
pub fn increment_by_text(
    manager: &ProjectManager,
    counter: Option<&str>,
    amount: &str,
) -> Result<IncrementOutcome> {
    let delta = counter::parse_delta(amount)?;
    manager.increment(counter, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedInput;
    use tempfile::tempdir;

    fn scarf_setup() -> ProjectSetup {
        ProjectSetup::new("scarf")
            .counter("row", None)
            .counter("repeat", Some(4))
            .default_counter("row")
    }

    #[test]
    fn test_bootstrap_writes_default_once() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        assert!(!manager.is_initialized());

        let config = manager.bootstrap().unwrap();
        assert_eq!(config, Config::default());
        assert!(manager.is_initialized());
        assert!(temp_dir.path().join("projects").is_dir());

        // Second bootstrap keeps existing state
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();
        let config = manager.bootstrap().unwrap();
        assert_eq!(config.available_projects.len(), 1);
    }

    #[test]
    fn test_increment_default_and_named() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        let outcome = manager.increment(None, 1).unwrap();
        assert_eq!(outcome.counter, "row");
        assert_eq!((outcome.previous, outcome.count), (0, 1));

        let outcome = manager.increment(Some("repeat"), -1).unwrap();
        assert_eq!(outcome.count, 3);
        assert!(outcome.wrapped);
        assert!(!outcome.clamped);

        let outcome = manager.increment(Some("row"), -5).unwrap();
        assert_eq!(outcome.count, 0);
        assert!(outcome.clamped);

        let stored = manager.current_project().unwrap();
        assert_eq!(stored.project.counter("repeat").unwrap().count, 3);
        assert_eq!(stored.project.counter("row").unwrap().count, 0);
    }

    #[test]
    fn test_increment_without_project() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());

        let err = manager.increment(None, 1).unwrap_err();
        assert!(matches!(err, KnitError::NoCurrentProject));
    }

    #[test]
    fn test_increment_unknown_counter_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        let file = manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();
        let before = std::fs::read(file.path()).unwrap();

        let err = manager.increment(Some("stitch"), 1).unwrap_err();
        assert!(matches!(err, KnitError::UnknownCounter { .. }));
        assert_eq!(std::fs::read(file.path()).unwrap(), before);
    }

    #[test]
    fn test_increment_by_text_rejects_non_integer() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        assert!(matches!(
            increment_by_text(&manager, None, "1.5"),
            Err(KnitError::InvalidDelta(_))
        ));
        assert_eq!(increment_by_text(&manager, None, "3").unwrap().count, 3);
    }

    #[test]
    fn test_increment_project_requires_registration() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        let file = manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        let outcome = manager.increment_project(file.path(), Some("repeat"), 2).unwrap();
        assert_eq!(outcome.count, 2);

        let err = manager
            .increment_project(&temp_dir.path().join("hat.json"), None, 1)
            .unwrap_err();
        assert!(matches!(err, KnitError::UnknownProject(_)));
    }

    #[test]
    fn test_switch_default_counter_refreshes_cache() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        let file = manager.switch_default_counter("repeat").unwrap();
        assert_eq!(file.project.default, "repeat");
        assert_eq!(
            manager.config().unwrap().default_counter.as_deref(),
            Some("repeat")
        );

        let outcome = manager.increment(None, 1).unwrap();
        assert_eq!(outcome.counter, "repeat");
    }

    #[test]
    fn test_list_projects_marks_stale_entries() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(temp_dir.path());
        let scarf = manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();
        let hat = manager
            .create_project(
                &ProjectSetup::new("hat").counter("row", None).make_active(false),
                &mut ScriptedInput::silent(),
            )
            .unwrap();
        std::fs::remove_file(hat.path()).unwrap();

        let entries = manager.list_projects().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identifier, scarf.path());
        assert!(entries[0].current);
        assert_eq!(
            entries[0].status,
            EntryStatus::Ok {
                name: "scarf".to_string(),
                counters: 2
            }
        );
        assert!(!entries[1].current);
        assert_eq!(entries[1].status, EntryStatus::Missing);
    }

    #[test]
    fn test_locked_state_blocks_mutation() {
        use crate::lock::LockFile;

        let temp_dir = tempdir().unwrap();
        let manager =
            ProjectManager::new(temp_dir.path()).with_lock(LockFile::in_dir(temp_dir.path()));
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        let held = LockFile::in_dir(temp_dir.path()).acquire().unwrap();
        assert!(matches!(
            manager.increment(None, 1),
            Err(KnitError::Locked { .. })
        ));
        drop(held);

        assert_eq!(manager.increment(None, 1).unwrap().count, 1);
    }

    #[test]
    fn test_lock_left_by_killed_invocation_does_not_block() {
        use crate::lock::{LockFile, LOCK_FILENAME};

        let temp_dir = tempdir().unwrap();
        let manager =
            ProjectManager::new(temp_dir.path()).with_lock(LockFile::in_dir(temp_dir.path()));
        manager
            .create_project(&scarf_setup(), &mut ScriptedInput::silent())
            .unwrap();

        std::fs::write(temp_dir.path().join(LOCK_FILENAME), "999999").unwrap();

        for expected in 1..=3 {
            assert_eq!(manager.increment(None, 1).unwrap().count, expected);
        }
    }
}

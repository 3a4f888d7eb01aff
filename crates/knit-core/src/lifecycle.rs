//! Creating projects and registering them with the config.

use crate::config::Config;
use crate::counter::{choose_initial_default, Counter};
use crate::input::InputProvider;
use crate::project::{absolute_path, validate_name, Project, ProjectFile};
use crate::switch::activate;
use crate::{KnitError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// A counter to add to a new project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: String,
    pub rollover: Option<u64>,
}

impl CounterSpec {
    pub fn new(name: impl Into<String>, rollover: Option<u64>) -> Self {
        Self {
            name: name.into(),
            rollover,
        }
    }
}

/// `name` or `name:rollover`
impl FromStr for CounterSpec {
    type Err = KnitError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, rollover) = match s.rsplit_once(':') {
            Some((name, rollover)) => {
                let rollover = rollover.trim().parse::<u64>().map_err(|_| {
                    KnitError::InvalidValue(format!(
                        "rollover '{rollover}' for counter '{name}' is not a positive integer"
                    ))
                })?;
                (name.trim(), Some(rollover))
            }
            None => (s.trim(), None),
        };
        Ok(Self::new(name, rollover))
    }
}

impl fmt::Display for CounterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rollover {
            Some(rollover) => write!(f, "{}:{}", self.name, rollover),
            None => f.write_str(&self.name),
        }
    }
}

/// Everything needed to create a project
#[derive(Debug, Clone, Default)]
pub struct ProjectSetup {
    pub name: String,
    /// Defaults to the configured projects directory
    pub directory: Option<PathBuf>,
    pub description: String,
    pub counters: Vec<CounterSpec>,
    /// Preferred default counter; falls back to the first counter
    pub default_counter: Option<String>,
    /// Make current even when another project already is
    pub make_active: bool,
}

impl ProjectSetup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            make_active: true,
            ..Default::default()
        }
    }

    pub fn counter(mut self, name: impl Into<String>, rollover: Option<u64>) -> Self {
        self.counters.push(CounterSpec::new(name, rollover));
        self
    }

    pub fn default_counter(mut self, name: impl Into<String>) -> Self {
        self.default_counter = Some(name.into());
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn make_active(mut self, make_active: bool) -> Self {
        self.make_active = make_active;
        self
    }

    /// Build the in-memory project: counters in order, default settled.
    fn build(&self, input: &mut dyn InputProvider) -> Result<Project> {
        validate_name(&self.name)?;

        let mut project = Project::new(self.name.clone(), self.description.clone());
        for spec in &self.counters {
            validate_counter_name(&spec.name)?;
            project
                .counters
                .insert(spec.name.clone(), Counter::new(spec.rollover)?)?;
        }

        if let Some(choice) =
            choose_initial_default(self.default_counter.as_deref(), &project.counters)
        {
            if let Some(fallback) = &choice.fallback {
                warn!(
                    project = %project.name,
                    requested = ?fallback.requested,
                    chosen = %fallback.chosen,
                    "Default counter fell back to first counter"
                );
                input.notify(&fallback.to_string());
            }
            project.default = choice.name;
        }

        Ok(project)
    }
}

/// Counter names follow the project-name rules and must not read as a
/// number, which `knit inc <amount>` would take as the amount.
fn validate_counter_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name.parse::<i64>().is_ok() {
        return Err(KnitError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Create a project document, register it, and make it current when asked
/// to or when nothing is current yet.
///
/// Once the document is written it stays: a later failure returns an error
/// with the config untouched on disk, and the project can be adopted again
/// with [`register_project`].
pub fn setup_project(
    setup: &ProjectSetup,
    config: &mut Config,
    state_dir: &Path,
    input: &mut dyn InputProvider,
) -> Result<ProjectFile> {
    let project = setup.build(input)?;

    let directory = match &setup.directory {
        Some(directory) => absolute_path(directory)?,
        None => absolute_path(&config.projects_dir(state_dir))?,
    };
    let identifier = ProjectFile::identifier_for(&directory, &project.name);

    if config.is_registered(&identifier) {
        return Err(KnitError::ProjectAlreadyExists(identifier));
    }

    let file = ProjectFile::create(&identifier, project)?;
    config.register(file.path())?;

    if setup.make_active || config.current_project.is_none() {
        activate(config, &file);
    }

    info!(
        project = %file.project.name,
        path = ?file.path(),
        counters = file.project.counters.len(),
        "Project created"
    );

    Ok(file)
}

/// Adopt an existing project document into the list of available projects.
pub fn register_project(identifier: &Path, config: &mut Config) -> Result<ProjectFile> {
    let identifier = absolute_path(identifier)?;
    if config.is_registered(&identifier) {
        return Err(KnitError::ProjectAlreadyExists(identifier));
    }

    let file = ProjectFile::load(&identifier)?;
    config.register(file.path())?;

    if config.current_project.is_none() {
        activate(config, &file);
    }

    info!(project = %file.project.name, path = ?file.path(), "Project registered");
    Ok(file)
}

/// Fill in `setup`'s counters by asking: how many, then a name and an
/// optional rollover for each, then which one is the default.
pub fn prompt_counters(setup: &mut ProjectSetup, input: &mut dyn InputProvider) -> Result<()> {
    let count = input.ask_int("Enter the number of counters in the project")?;
    let count = usize::try_from(count).map_err(|_| {
        KnitError::InvalidValue(format!("number of counters must not be negative, got {count}"))
    })?;

    for _ in 0..count {
        let name = input.ask_text("Counter name")?.trim().to_string();
        let rollover = input.ask_text("Rollover for the counter (blank for none)")?;
        let rollover = match rollover.trim() {
            "" => None,
            value => Some(value.parse::<u64>().map_err(|_| {
                KnitError::InvalidValue(format!("rollover '{value}' is not a positive integer"))
            })?),
        };
        setup.counters.push(CounterSpec::new(name, rollover));
    }

    if !setup.counters.is_empty() {
        let default = input.ask_text("Default counter name")?;
        let default = default.trim();
        setup.default_counter = (!default.is_empty()).then(|| default.to_string());
    }

    Ok(())
}

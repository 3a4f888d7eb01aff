//! Changing the current project and a project's default counter.

use crate::config::Config;
use crate::project::{Project, ProjectFile};
use crate::{KnitError, Result};
use tracing::info;

/// Make a registered project current and refresh the cached default
/// counter from it.
///
/// The project is loaded before `config` is touched, so a stale entry whose
/// document has gone missing leaves the config as it was.
pub fn switch_project(identifier: &str, config: &mut Config) -> Result<ProjectFile> {
    let path = config
        .find_project(identifier)
        .ok_or_else(|| KnitError::UnknownProject(identifier.to_string()))?
        .to_path_buf();

    let file = ProjectFile::load(&path)?;
    activate(config, &file);
    Ok(file)
}

/// Point `config` at an already loaded project.
pub(crate) fn activate(config: &mut Config, file: &ProjectFile) {
    config.current_project = Some(file.path().to_path_buf());
    refresh_default_cache(config, file);

    info!(
        project = %file.project.name,
        path = ?file.path(),
        default_counter = ?config.default_counter,
        "Switched current project"
    );
}

/// Copy the project's default counter into the config cache when `file` is
/// the current project. Returns whether the cache changed.
pub fn refresh_default_cache(config: &mut Config, file: &ProjectFile) -> bool {
    if config.current_project.as_deref() != Some(file.path()) {
        return false;
    }

    let default = Some(file.project.default.clone()).filter(|name| !name.is_empty());
    if config.default_counter == default {
        return false;
    }
    config.default_counter = default;
    true
}

/// Change which counter a bare increment acts on. Config is not touched.
pub fn switch_default_counter(name: &str, project: &mut Project) -> Result<()> {
    if !project.counters.contains(name) {
        return Err(KnitError::unknown_counter(name, project.counters.names()));
    }

    project.default = name.to_string();
    info!(project = %project.name, counter = %name, "Switched default counter");
    Ok(())
}

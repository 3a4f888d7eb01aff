//! Integration tests for the knit project/counter flow.
//!
//! Each test drives `ProjectManager` the way separate `knit` invocations
//! would: a fresh manager per step, all state read back from disk.

use knit_core::{
    Config, ConfigStore, KnitError, ProjectManager, ProjectSetup, ScriptedInput,
};
use std::path::Path;
use tempfile::tempdir;

fn scarf_setup() -> ProjectSetup {
    ProjectSetup::new("scarf")
        .description("Striped winter scarf")
        .counter("row", None)
        .counter("repeat", Some(4))
        .default_counter("row")
}

/// A new manager per call, as a short-lived process would build
fn knit(state_dir: &Path) -> ProjectManager {
    ProjectManager::new(state_dir)
}

/// Rows count up, repeats wrap at their rollover
#[test]
fn test_scarf_scenario() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    knit(state).bootstrap().unwrap();
    knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();

    for _ in 0..5 {
        knit(state).increment(Some("row"), 1).unwrap();
    }
    let project = knit(state).current_project().unwrap().project;
    assert_eq!(project.counter("row").unwrap().count, 5);

    let repeats: Vec<u64> = (0..5)
        .map(|_| knit(state).increment(Some("repeat"), 1).unwrap().count)
        .collect();
    assert_eq!(repeats, vec![1, 2, 3, 0, 1]);
}

/// Switching to an unregistered project fails and leaves config untouched
#[test]
fn test_switch_to_unknown_project_keeps_config() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();
    knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();

    let config_path = ConfigStore::in_dir(state).path().to_path_buf();
    let before = std::fs::read(&config_path).unwrap();

    let err = knit(state).switch_project("hat").unwrap_err();
    assert!(matches!(err, KnitError::UnknownProject(ref name) if name == "hat"));
    assert_eq!(std::fs::read(&config_path).unwrap(), before);
}

/// Creating the same project twice fails and keeps the first document
#[test]
fn test_duplicate_setup_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    let first = knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();
    knit(state).increment(None, 3).unwrap();
    let document = std::fs::read(first.path()).unwrap();
    let config = std::fs::read(ConfigStore::in_dir(state).path()).unwrap();

    let err = knit(state)
        .create_project(
            &ProjectSetup::new("scarf").counter("other", None),
            &mut ScriptedInput::silent(),
        )
        .unwrap_err();
    assert!(matches!(err, KnitError::ProjectAlreadyExists(_)));
    assert_eq!(std::fs::read(first.path()).unwrap(), document);
    assert_eq!(std::fs::read(ConfigStore::in_dir(state).path()).unwrap(), config);
}

/// A document created outside the registry is also protected
#[test]
fn test_setup_refuses_unregistered_existing_document() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();
    let path = state.join("projects").join("scarf.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "hand written").unwrap();

    let err = knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap_err();
    assert!(matches!(err, KnitError::ProjectAlreadyExists(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hand written");
    assert_eq!(knit(state).config().unwrap(), Config::default());
}

/// Uninitialized -> HasConfig(no current) -> HasConfig(current)
#[test]
fn test_state_transitions() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    assert!(!knit(state).is_initialized());
    assert!(matches!(
        knit(state).increment(None, 1),
        Err(KnitError::NoCurrentProject)
    ));

    knit(state).bootstrap().unwrap();
    assert!(knit(state).is_initialized());
    assert!(knit(state).config().unwrap().current_project.is_none());

    let file = knit(state)
        .create_project(
            &scarf_setup().make_active(false),
            &mut ScriptedInput::silent(),
        )
        .unwrap();
    let config = knit(state).config().unwrap();
    assert_eq!(config.current_project.as_deref(), Some(file.path()));
    assert_eq!(config.default_counter.as_deref(), Some("row"));
}

/// Switching projects keeps the default-counter cache in step
#[test]
fn test_switch_between_projects() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();
    let hat = knit(state)
        .create_project(
            &ProjectSetup::new("hat")
                .counter("round", None)
                .counter("decrease", Some(8))
                .default_counter("decrease")
                .make_active(false),
            &mut ScriptedInput::silent(),
        )
        .unwrap();

    // Still on the scarf
    assert_eq!(knit(state).increment(None, 1).unwrap().project, "scarf");

    knit(state).switch_project("hat").unwrap();
    let config = knit(state).config().unwrap();
    assert_eq!(config.current_project.as_deref(), Some(hat.path()));
    assert_eq!(config.default_counter.as_deref(), Some("decrease"));

    let outcome = knit(state).increment(None, -1).unwrap();
    assert_eq!(outcome.project, "hat");
    assert_eq!(outcome.counter, "decrease");
    assert_eq!(outcome.count, 7);

    // Full identifier works as well as the short name
    knit(state)
        .switch_project(&state.join("projects").join("scarf.json").to_string_lossy())
        .unwrap();
    assert_eq!(knit(state).config().unwrap().default_counter.as_deref(), Some("row"));
}

/// A project written before its config update can be adopted afterwards
#[test]
fn test_register_recovers_orphaned_project() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    let file = knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();

    // Simulate a lost config write
    std::fs::remove_file(ConfigStore::in_dir(state).path()).unwrap();
    assert!(matches!(
        knit(state).increment(None, 1),
        Err(KnitError::NoCurrentProject)
    ));

    knit(state).register_project(file.path()).unwrap();
    assert_eq!(knit(state).increment(None, 1).unwrap().count, 1);
}

/// Corrupt documents surface as errors and are never rewritten
#[test]
fn test_corrupt_documents_surface() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    let file = knit(state)
        .create_project(&scarf_setup(), &mut ScriptedInput::silent())
        .unwrap();
    std::fs::write(file.path(), "{\"name\": \"scarf\", \"counters\": 12}").unwrap();

    assert!(matches!(
        knit(state).increment(None, 1),
        Err(KnitError::ProjectCorrupt { .. })
    ));
    assert_eq!(
        std::fs::read_to_string(file.path()).unwrap(),
        "{\"name\": \"scarf\", \"counters\": 12}"
    );

    std::fs::write(ConfigStore::in_dir(state).path(), "current_project: [").unwrap();
    assert!(matches!(
        knit(state).increment(None, 1),
        Err(KnitError::ConfigCorrupt { .. })
    ));
}

/// Interactive setup through a scripted input provider
#[test]
fn test_interactive_setup() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path();

    let mut input = ScriptedInput::new(["2", "row", "", "repeat", "6", "stitch"]);
    let mut setup = ProjectSetup::new("socks");
    knit_core::lifecycle::prompt_counters(&mut setup, &mut input).unwrap();

    let file = knit(state).create_project(&setup, &mut input).unwrap();
    assert_eq!(file.project.default, "row");
    assert_eq!(input.notices.len(), 1);
    assert_eq!(
        file.project.counter("repeat").unwrap().rollover.map(|r| r.get()),
        Some(6)
    );
}

//! Plain-text rendering of projects and increment results.

use knit_core::{EntryStatus, IncrementOutcome, Project, ProjectEntry};
use std::fmt::Write;

/// One line per counter, the default marked with `*`
pub fn render_project(project: &Project) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", project.name);
    if !project.description.is_empty() {
        let _ = writeln!(out, "  {}", project.description);
    }

    if project.counters.is_empty() {
        let _ = writeln!(out, "  (no counters)");
        return out;
    }

    let width = project.counters.names().map(str::len).max().unwrap_or(0);
    for (name, counter) in project.counters.iter() {
        let marker = if name == project.default { '*' } else { ' ' };
        let _ = match counter.rollover {
            Some(rollover) => writeln!(
                out,
                "{marker} {name:<width$}  {} / {}",
                counter.count, rollover
            ),
            None => writeln!(out, "{marker} {name:<width$}  {}", counter.count),
        };
    }
    out
}

pub fn render_outcome(outcome: &IncrementOutcome) -> String {
    let mut line = format!(
        "{}: {} {} -> {}",
        outcome.project, outcome.counter, outcome.previous, outcome.count
    );
    if let Some(rollover) = outcome.rollover {
        let _ = write!(line, " (of {rollover})");
    }
    if outcome.wrapped {
        line.push_str(", rolled over");
    }
    if outcome.clamped {
        line.push_str(", held at 0");
    }
    line
}

pub fn render_entries(entries: &[ProjectEntry]) -> String {
    if entries.is_empty() {
        return "No projects yet. Create one with `knit setup <name>`.\n".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let marker = if entry.current { '*' } else { ' ' };
        let detail = match &entry.status {
            EntryStatus::Ok { name, counters } => format!("{name} ({counters} counters)"),
            EntryStatus::Missing => "missing".to_string(),
            EntryStatus::Corrupt(message) => format!("unreadable: {message}"),
        };
        let _ = writeln!(out, "{marker} {}  {detail}", entry.identifier.display());
    }
    out
}

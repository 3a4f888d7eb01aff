//! Live counter view.
//!
//! Re-renders a project whenever its document changes on disk, and steps
//! the default counter from single keystrokes. The view only reads the
//! document; all writes go through `ProjectManager::increment_project`.

use crate::display::render_project;
use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use futures::StreamExt;
use knit_core::{ProjectFile, ProjectManager};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebouncedEvent};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Debounce window for file change events
const DEBOUNCE: Duration = Duration::from_millis(150);

const KEY_HELP: &str = "k/+/Up increment  j/-/Down decrement  r refresh  q quit";

/// What a keystroke asks the viewer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Step(i64),
    Refresh,
    Quit,
}

/// Map a key press to a command. Releases and unbound keys map to `None`.
pub fn map_key(key: &KeyEvent) -> Option<ViewerCommand> {
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ViewerCommand::Quit)
        }
        KeyCode::Char('k') | KeyCode::Char('+') | KeyCode::Up => Some(ViewerCommand::Step(1)),
        KeyCode::Char('j') | KeyCode::Char('-') | KeyCode::Down => Some(ViewerCommand::Step(-1)),
        KeyCode::Char('r') => Some(ViewerCommand::Refresh),
        KeyCode::Char('q') | KeyCode::Esc => Some(ViewerCommand::Quit),
        _ => None,
    }
}

/// Raw mode on the alternate screen, restored on drop
struct RawTerminal;

impl RawTerminal {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Run the view until `q`, Esc, or Ctrl+C.
pub async fn run(manager: &ProjectManager, identifier: Option<&str>) -> Result<()> {
    let file = match identifier {
        Some(identifier) => manager.load_project(identifier)?,
        None => manager.current_project()?,
    };
    let path = file.path().to_path_buf();

    let (tx, mut rx) = mpsc::channel::<()>(16);
    // Event paths are absolute while identifiers may not be
    let watched = path.file_name().map(|name| name.to_os_string());
    let mut debouncer = new_debouncer(
        DEBOUNCE,
        None,
        move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
            Ok(events) => {
                if events.iter().any(|event| {
                    event
                        .event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == watched.as_deref())
                }) {
                    // A full channel already has a refresh pending
                    let _ = tx.try_send(());
                }
            }
            Err(errors) => {
                for e in errors {
                    warn!(error = %e, "Watcher error");
                }
            }
        },
    )
    .context("Failed to start file watcher")?;

    // Saves replace the file, so watch its directory rather than the inode
    let dir = watch_dir(&path);
    debouncer
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    debug!(path = ?path, "Watching project");

    let _terminal = RawTerminal::enter().context("Failed to enter raw terminal mode")?;
    let mut keys = EventStream::new();
    let mut status: Option<String> = None;
    draw(&file, status.as_deref())?;

    loop {
        tokio::select! {
            Some(()) = rx.recv() => {
                redraw(&path, status.as_deref())?;
            }
            event = keys.next() => {
                let key = match event {
                    Some(Ok(Event::Key(key))) => key,
                    Some(Ok(Event::Resize(..))) => {
                        redraw(&path, status.as_deref())?;
                        continue;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                    None => break,
                };
                match map_key(&key) {
                    Some(ViewerCommand::Quit) => break,
                    Some(ViewerCommand::Refresh) => {
                        status = None;
                        redraw(&path, None)?;
                    }
                    Some(ViewerCommand::Step(delta)) => {
                        // On success the watcher picks up the save and redraws
                        match manager.increment_project(&path, None, delta) {
                            Ok(_) => status = None,
                            Err(e) => {
                                status = Some(e.to_string());
                                redraw(&path, status.as_deref())?;
                            }
                        }
                    }
                    None => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn redraw(path: &Path, status: Option<&str>) -> io::Result<()> {
    match ProjectFile::load(path) {
        Ok(file) => draw(&file, status),
        Err(e) => draw_text(&e.to_string(), status),
    }
}

fn draw(file: &ProjectFile, status: Option<&str>) -> io::Result<()> {
    draw_text(&render_project(&file.project), status)
}

fn draw_text(body: &str, status: Option<&str>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    queue!(out, terminal::Clear(terminal::ClearType::All), MoveTo(0, 0))?;
    // Raw mode does not turn \n into \r\n
    write!(out, "{}", to_raw_lines(body))?;
    write!(out, "\r\n{KEY_HELP}\r\n")?;
    if let Some(status) = status {
        write!(out, "{status}\r\n")?;
    }
    out.flush()
}

fn to_raw_lines(text: &str) -> String {
    text.replace('\n', "\r\n")
}

//! Knit Core Components
//!
//! Project and counter state for the `knit` command: the on-disk config and
//! project documents, the counter rules, and the operations the command
//! dispatcher calls (create a project, increment, switch project, switch
//! default counter).

mod atomic;
pub mod config;
pub mod counter;
mod error;
pub mod input;
pub mod lifecycle;
pub mod lock;
pub mod project;
mod project_manager;
pub mod switch;

pub use config::{Config, ConfigStore};
pub use counter::{Counter, Counters, DefaultChoice, DefaultFallback};
pub use error::{ErrorKind, KnitError, Result};
pub use input::{InputProvider, ScriptedInput};
pub use lifecycle::{CounterSpec, ProjectSetup};
pub use lock::{LockFile, NoLock, StateLock};
pub use project::{Project, ProjectFile};
pub use project_manager::{
    increment_by_text, EntryStatus, IncrementOutcome, ProjectEntry, ProjectManager,
};

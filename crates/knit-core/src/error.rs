//! Core error types for Knit.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`KnitError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required document is missing
    NotFound,
    /// A project or counter name is already taken
    AlreadyExists,
    /// A document exists but cannot be parsed or breaks the schema
    Corrupt,
    /// A referenced project or counter is not registered
    Unknown,
    /// A supplied value is out of range or not a number
    InvalidValue,
    /// Filesystem failure or lock contention
    Io,
}

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum KnitError {
    /// Project document missing
    #[error("Project not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    /// Project document (or registry entry) already present
    #[error("Project already exists: {}", .0.display())]
    ProjectAlreadyExists(PathBuf),

    /// Counter name repeated within one project
    #[error("Duplicate counter name: {0}")]
    DuplicateCounter(String),

    /// Config document present but unreadable
    #[error("Config file {} is corrupt: {message}", .path.display())]
    ConfigCorrupt { path: PathBuf, message: String },

    /// Project document present but unreadable or schema-invalid
    #[error("Project file {} is corrupt: {message}", .path.display())]
    ProjectCorrupt { path: PathBuf, message: String },

    /// Identifier not in the list of available projects
    #[error("Unknown project: {0}")]
    UnknownProject(String),

    /// Counter name not present in the project
    #[error("Unknown counter '{name}', expected one of: {available}")]
    UnknownCounter { name: String, available: String },

    /// Project has no counters to fall back on
    #[error("Project '{0}' has no counters")]
    NoDefaultCounter(String),

    /// No project has been set up or selected yet
    #[error("No current project; create one with `knit setup <name>`")]
    NoCurrentProject,

    /// Increment amount that is not an integer
    #[error("Invalid amount '{0}': expected an integer")]
    InvalidDelta(String),

    /// Numeric value out of range (non-positive rollover, overflow)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Project or counter name that cannot be used
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    /// Another invocation holds the state lock
    #[error("State directory is locked by process {pid} ({})", .path.display())]
    Locked { path: PathBuf, pid: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KnitError {
    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            KnitError::ProjectNotFound(_) => ErrorKind::NotFound,
            KnitError::ProjectAlreadyExists(_) | KnitError::DuplicateCounter(_) => {
                ErrorKind::AlreadyExists
            }
            KnitError::ConfigCorrupt { .. } | KnitError::ProjectCorrupt { .. } => {
                ErrorKind::Corrupt
            }
            KnitError::UnknownProject(_)
            | KnitError::UnknownCounter { .. }
            | KnitError::NoDefaultCounter(_)
            | KnitError::NoCurrentProject => ErrorKind::Unknown,
            KnitError::InvalidDelta(_) | KnitError::InvalidValue(_) | KnitError::InvalidName(_) => {
                ErrorKind::InvalidValue
            }
            KnitError::Locked { .. } | KnitError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn unknown_counter<'a>(
        name: &str,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let available: Vec<&str> = available.into_iter().collect();
        KnitError::UnknownCounter {
            name: name.to_string(),
            available: if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            },
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, KnitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KnitError::ProjectNotFound(PathBuf::from("/knit/projects/scarf.json"));
        assert!(err.to_string().contains("/knit/projects/scarf.json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: KnitError = io_err.into();
        assert!(matches!(err, KnitError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_unknown_counter_lists_available() {
        let err = KnitError::unknown_counter("rows", ["row", "repeat"]);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().contains("row, repeat"));

        let err = KnitError::unknown_counter("rows", Vec::<&str>::new());
        assert!(err.to_string().contains("(none)"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            KnitError::DuplicateCounter("row".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            KnitError::InvalidDelta("two".into()).kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            KnitError::ProjectCorrupt {
                path: PathBuf::from("x.json"),
                message: "eof".into()
            }
            .kind(),
            ErrorKind::Corrupt
        );
    }
}

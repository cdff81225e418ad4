use std::fmt;

use async_trait::async_trait;

use crate::file_format::join_row::JoinRow;
use crate::hierarchy::HierarchyError;

pub type Result<T> = std::result::Result<T, ServerError>;

// JSON parse errors are sticky data problems.
impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::DataLayer,
            message: err.to_string(),
        })
    }
}

/// Rows that can't be folded into a tree won't fold any better if we ask
/// again.
impl From<HierarchyError> for ServerError {
    fn from(err: HierarchyError) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::DataLayer,
            message: err.to_string(),
        })
    }
}

/// A blocking task panicking or being cancelled is our problem, not the data's.
impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::ServerLayer,
            message: err.to_string(),
        })
    }
}

/// Express whether the error seems to be happening in the server or the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLayer {
    /// The request itself has structural issues, like a file path that tries
    /// to escape the archive or a missing required parameter.
    BadInput,
    /// The error seems to involve server logic or its environment (a database
    /// we can't open, a task that panicked).
    ServerLayer,
    /// The error seems to be related to the stored data rather than the
    /// server, like rows that contradict each other.
    DataLayer,
}

/// ServerError payload to provide details about what went wrong for
/// investigation purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub layer: ErrorLayer,
    /// Stringified version of the lower level error.
    pub message: String,
}

/// Does a retry make sense or not?
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// An error that will persist until something changes on disk.
    StickyProblem(ErrorDetails),
    /// An error that might go away if retried later, like the archive being
    /// swapped out from under us or the database being locked.
    TransientProblem(ErrorDetails),
    /// The requested path isn't in the archive.  Kept distinct from the other
    /// problems because it's an entirely normal outcome for a client.
    NotFound(String),
}

impl ServerError {
    pub fn bad_input(message: impl Into<String>) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::BadInput,
            message: message.into(),
        })
    }

    /// Short machine-readable name for the kind of problem.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::StickyProblem(details) => match details.layer {
                ErrorLayer::BadInput => "bad_input",
                ErrorLayer::ServerLayer => "server",
                ErrorLayer::DataLayer => "data",
            },
            ServerError::TransientProblem(_) => "unavailable",
            ServerError::NotFound(_) => "not_found",
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::StickyProblem(details) => f.write_str(&details.message),
            ServerError::TransientProblem(details) => {
                write!(f, "temporarily unavailable: {}", details.message)
            }
            ServerError::NotFound(path) => write!(f, "not found: {}", path),
        }
    }
}

impl std::error::Error for ServerError {}

/// Source of the flattened customer/part/revision/trial/run/file join.
///
/// Implementations return every row of the join in a stable order; the order
/// they pick is the order the tree ends up in.  Blocking implementations are
/// expected to move their work onto tokio's blocking pool.
#[async_trait]
pub trait RowSource {
    async fn fetch_rows(&self) -> Result<Vec<JoinRow>>;
}

/// Read-only access to the archive of trial artifacts.
///
/// Paths are the `location` values from the tree, i.e. relative to the
/// archive's files directory.  An absent path is `ServerError::NotFound`, an
/// absent archive is a `TransientProblem`.
#[async_trait]
pub trait ArchiveStore {
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>>;

    /// All file paths in the archive, sorted, in the same form `fetch_file`
    /// accepts.
    async fn list_files(&self) -> Result<Vec<String>>;
}

/// Validate a client supplied archive path.  We refuse anything that could
/// be interpreted as leaving the files directory before we go looking.
pub fn checked_archive_path(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(ServerError::bad_input("empty file path"));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(ServerError::bad_input(format!(
            "file path must be relative: {}",
            path
        )));
    }
    if path.split(|c| c == '/' || c == '\\').any(|segment| segment == "..") {
        return Err(ServerError::bad_input(format!(
            "file path may not contain '..': {}",
            path
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Level;

    #[test]
    fn test_checked_archive_path() {
        assert_eq!(checked_archive_path("a/b/1.txt"), Ok("a/b/1.txt"));
        assert_eq!(checked_archive_path("a/..b/1.txt"), Ok("a/..b/1.txt"));

        for bad in ["", "/etc/passwd", "\\share\\x", "../secret", "a/../../b", "a\\..\\b"].iter() {
            match checked_archive_path(bad) {
                Err(err) => assert_eq!(err.kind(), "bad_input", "for {:?}", bad),
                Ok(_) => panic!("{:?} should have been rejected", bad),
            }
        }
    }

    #[test]
    fn test_hierarchy_errors_are_sticky_data_problems() {
        let err = ServerError::from(HierarchyError::KeyInconsistency {
            row: 3,
            missing: Level::Trial,
            orphan: "file_location",
        });
        assert_eq!(err.kind(), "data");
        assert_eq!(
            err.to_string(),
            "row 3 has file_location populated but no trial key"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = ServerError::NotFound("files/a/1.txt".to_string());
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "not found: files/a/1.txt");
    }
}

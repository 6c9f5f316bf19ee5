//! Error types for package rebuilding.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a package build.
#[derive(Error, Debug)]
pub enum PackError {
    /// Source directory does not exist
    #[error("the directory was not found at '{}'", .0.display())]
    NotFound(PathBuf),

    /// Source path exists but is not a directory
    #[error("the path '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Open, create, read or write failure on a specific path
    #[error("failed to {context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failure while walking the source tree
    #[error("error walking the path '{}': {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl PackError {
    pub(crate) fn io(context: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        PackError::Io {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, PackError>;

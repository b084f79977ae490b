use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot parse {}: {cause}", .path.display())]
    Parse { path: PathBuf, cause: String },
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid operation: {0}")]
    Invariant(String),
    #[error("{} changed on disk since it was loaded", .path.display())]
    StaleWrite { path: PathBuf },
}

impl CoreError {
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        CoreError::NotFound(path.as_ref().to_path_buf())
    }

    pub fn parse(path: impl AsRef<Path>, cause: impl Into<String>) -> Self {
        CoreError::Parse {
            path: path.as_ref().to_path_buf(),
            cause: cause.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        CoreError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CoreError::Invariant(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}

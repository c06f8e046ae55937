use kvfs_store::StoreError;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Outcome classes reported back to the request dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The key (and, where applicable, its directory marker) is absent.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A store call failed for any other reason.
    #[error("I/O failure: {0}")]
    Io(String),

    /// A read-back right after a write did not find the key.
    #[error("store inconsistent: {0}")]
    Inconsistent(String),

    /// The name cannot be mapped to a key (e.g. not valid UTF-8).
    #[error("invalid file name")]
    InvalidName,
}

impl FsError {
    /// Classify a store error raised while serving `path`.
    pub fn from_store(path: &str, err: &StoreError) -> Self {
        if err.is_not_found() {
            FsError::NotFound(path.to_string())
        } else {
            FsError::Io(err.to_string())
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    /// Io and Inconsistent both surface as a generic I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self, FsError::Io(_) | FsError::Inconsistent(_))
    }
}

#[cfg(unix)]
impl FsError {
    /// Convert to a libc errno.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Io(_) | FsError::Inconsistent(_) => libc::EIO,
            FsError::InvalidName => libc::EINVAL,
        }
    }
}

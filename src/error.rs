use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyloggerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    File(#[from] FileError),
    #[error("failed to write to {}: {}", .path.display(), .source)]
    Write { path: PathBuf, source: io::Error },
    #[error("no keyboard devices found")]
    NoDevicesFound,
    #[error("not a keyboard: {}", .0.display())]
    NotAKeyboard(PathBuf),
    #[error("invalid key event: {0}")]
    InvalidKeyEvent(String),
    #[error("unsuported event type: {0}")]
    UnsupportedEventType(u16),
    #[error("invalid timestamp: {0}s {1}us")]
    InvalidTimestamp(i64, i64),
    #[error("no log file passed validation")]
    NoUsableSinks,
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The reason a log file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// The file exists and overwriting it is not allowed.
    AlreadyExists,
    NotWritable,
    NotReadable,
    NotExecutable,
    /// The file could not be opened (locked, permission denied by the OS, disk error).
    InUse,
}

impl FileErrorKind {
    fn describe(self) -> &'static str {
        match self {
            FileErrorKind::AlreadyExists => "already exists",
            FileErrorKind::NotWritable => "not writable",
            FileErrorKind::NotReadable => "not readable",
            FileErrorKind::NotExecutable => "not executable",
            FileErrorKind::InUse => "in use",
        }
    }
}

/// An error raised while checking that a log file is usable.
#[derive(Error, Debug)]
#[error("{} ({}): {message}", .path.display(), .kind.describe())]
pub struct FileError {
    kind: FileErrorKind,
    path: PathBuf,
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl FileError {
    pub(crate) fn new(kind: FileErrorKind, path: &Path, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn with_source(
        kind: FileErrorKind,
        path: &Path,
        message: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self {
            source: Some(source),
            ..Self::new(kind, path, message)
        }
    }

    pub fn kind(&self) -> FileErrorKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying I/O error, if there was one.
    pub fn io_error(&self) -> Option<&io::Error> {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn file_error_names_path_and_reason() {
        let err = FileError::new(
            FileErrorKind::AlreadyExists,
            Path::new("/tmp/keys.txt"),
            "cannot overwrite",
        );

        assert_eq!(err.kind(), FileErrorKind::AlreadyExists);
        assert_eq!(
            err.to_string(),
            "/tmp/keys.txt (already exists): cannot overwrite"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn file_error_keeps_io_cause() {
        let cause = io::Error::new(io::ErrorKind::PermissionDenied, "locked");
        let err = FileError::with_source(
            FileErrorKind::InUse,
            Path::new("keys.txt"),
            "cannot open",
            cause,
        );

        assert_eq!(err.kind(), FileErrorKind::InUse);
        assert_eq!(
            err.io_error().map(io::Error::kind),
            Some(io::ErrorKind::PermissionDenied)
        );
        assert!(err.source().is_some());
    }
}

//! Error taxonomy shared by the copy engine and the transfer orchestrator

/// What went wrong with a transfer or with one entry of a directory walk.
///
/// The numeric codes are stable and shown in error messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Destination is a regular file where a directory copy was requested
    FileExistInsteadOfDirectory,
    /// Source is neither a regular file nor a directory
    UnsupportedType,
    /// Source path is missing when the transfer starts
    SourceDoesntExist,
    /// I/O error while copying one file's bytes or attributes
    CopyFileFailure,
    /// Cannot create or enumerate a directory
    CopyDirectoryFailure,
    /// Worker task died without producing a result
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            ErrorKind::FileExistInsteadOfDirectory => 1,
            ErrorKind::UnsupportedType => 2,
            ErrorKind::SourceDoesntExist => 3,
            ErrorKind::CopyFileFailure => 4,
            ErrorKind::CopyDirectoryFailure => 5,
            ErrorKind::Unknown => 6,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::FileExistInsteadOfDirectory => "there is a file with the destination name",
            ErrorKind::UnsupportedType => "unsupported source type",
            ErrorKind::SourceDoesntExist => "source doesn't exist",
            ErrorKind::CopyFileFailure => "cannot copy file",
            ErrorKind::CopyDirectoryFailure => "cannot copy directory",
            ErrorKind::Unknown => "undefined error",
        }
    }

    /// Failures of this kind on a single entry do not stop the walk of the enclosing directory.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::CopyFileFailure | ErrorKind::CopyDirectoryFailure
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} - {}", self.code(), self.description())
    }
}

/// Error raised by a transfer, carrying both ends of the failed copy.
///
/// # Logging Convention
/// The Display implementation includes the underlying cause chain, so logging the error with `{}`
/// is enough:
/// ```ignore
/// tracing::error!("{}", &error);
/// ```
#[derive(Debug, thiserror::Error)]
#[error("rsync error from {src:?} to destination {dst:?}: {kind}{}", cause_suffix(.source))]
pub struct Error {
    pub src: std::path::PathBuf,
    pub dst: std::path::PathBuf,
    pub kind: ErrorKind,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl Error {
    #[must_use]
    pub fn new(src: &std::path::Path, dst: &std::path::Path, kind: ErrorKind) -> Self {
        Self {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(
        src: &std::path::Path,
        dst: &std::path::Path,
        kind: ErrorKind,
        source: anyhow::Error,
    ) -> Self {
        Self {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            kind,
            source: Some(source),
        }
    }
}

fn cause_suffix(source: &Option<anyhow::Error>) -> String {
    match source {
        Some(source) => format!(": {source:#}"),
        None => String::new(),
    }
}

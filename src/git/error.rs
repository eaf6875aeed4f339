use std::num::ParseIntError;
use std::path::PathBuf;

/// Errors produced by the git layer.
///
/// Primitive failures (`Execution`, `EmptyOutput`) come straight from a
/// [`GitClient`](super::GitClient) backend. The remaining variants are raised
/// by the code that composes primitives into higher-level operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// The primitive could not run or exited with an error.
    #[error("`{command}` failed: {message}")]
    Execution {
        command: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The primitive ran fine but printed nothing.
    #[error("`{command}` produced no output")]
    EmptyOutput { command: String },

    #[error("not inside a git repository: {}", path.display())]
    NotARepository { path: PathBuf },

    #[error("no such remote: {name}")]
    NoSuchRemote { name: String },

    #[error("failed to parse `git describe` result: {line:?}")]
    MalformedDescription {
        line: String,
        #[source]
        source: Option<ParseIntError>,
    },

    /// Name resolution for the remote host failed.
    #[error("could not resolve the host of {remote}")]
    UnresolvedHost { remote: String },

    /// No usable local copy exists and none could be fetched.
    #[error("source directory not found: {}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: Option<Box<GitError>>,
    },

    #[error("source directory is required")]
    MissingSourceDir,

    #[error("could not resolve the working directory")]
    Resolution(#[source] std::io::Error),
}

impl GitError {
    /// Build an `Execution` error from a command line and its diagnostic.
    pub fn execution(command: impl Into<String>, message: impl Into<String>) -> Self {
        GitError::Execution {
            command: command.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn is_empty_output(&self) -> bool {
        matches!(self, GitError::EmptyOutput { .. })
    }

    pub(crate) fn from_git2(command: &str, e: git2::Error) -> Self {
        GitError::Execution {
            command: command.to_string(),
            message: e.message().to_string(),
            source: Some(Box::new(e)),
        }
    }
}

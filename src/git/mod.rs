//! Git integration layer.
//!
//! Everything above this module talks to git through the [`GitClient`]
//! trait, one method per primitive. Two backends implement it:
//! [`CommandGitClient`] drives the `git` executable and [`Git2Client`] uses
//! libgit2 through the `git2` crate. Which one runs is chosen by
//! [`GitBackend`] at startup.

pub mod classify;
mod command;
mod describe;
mod error;
mod git2_backend;
#[cfg(test)]
pub(crate) mod scripted;

use std::path::Path;
use std::str::FromStr;

pub use classify::{NetworkFailure, classify_network_failure};
pub use command::{CommandGitClient, CommandRunner};
pub use describe::Description;
pub use error::GitError;
pub use git2_backend::Git2Client;

/// The version-control primitives this tool relies on.
///
/// Query methods return the primitive's textual answer, trimmed. A query that
/// legitimately has nothing to say (clean status, detached branch) fails with
/// [`GitError::EmptyOutput`] so callers can tell it apart from a failure to
/// run. Every method operates on the directory it is given, never on the
/// process working directory.
pub trait GitClient {
    /// `true` when `dir` lies inside a working tree.
    fn is_inside_work_tree(&self, dir: &Path) -> Result<bool, GitError>;

    fn current_branch(&self, dir: &Path) -> Result<String, GitError>;

    /// Full id of `HEAD`.
    fn head_hash(&self, dir: &Path) -> Result<String, GitError>;

    fn head_short_hash(&self, dir: &Path) -> Result<String, GitError>;

    /// Author date of the latest commit as `YYYY-MM-DDTHH:MM:SS`.
    fn last_author_date(&self, dir: &Path) -> Result<String, GitError>;

    /// Porcelain status report; `EmptyOutput` when the tree is clean.
    fn status_porcelain(&self, dir: &Path) -> Result<String, GitError>;

    /// Long-format describe line, lightweight tags included.
    fn describe(&self, dir: &Path) -> Result<String, GitError>;

    /// Clone the default branch of `url` into `dest` with depth 1.
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// URL of the remote called `name`.
    ///
    /// Fails with [`GitError::NotARepository`] or [`GitError::NoSuchRemote`]
    /// when there is nothing to look up.
    fn remote_url(&self, dir: &Path, name: &str) -> Result<String, GitError>;

    /// Fetch `origin` of the repository rooted at `dir`.
    fn fetch(&self, dir: &Path) -> Result<(), GitError>;

    /// Fetch, then fast-forward the current branch, like `git pull --ff-only`.
    ///
    /// Fetches by itself, so a preceding [`fetch`](Self::fetch) is only
    /// needed to tell network failures apart before touching the tree.
    fn pull(&self, dir: &Path) -> Result<(), GitError>;
}

/// Selects the [`GitClient`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GitBackend {
    /// The `git` executable found on `PATH`.
    #[default]
    Cli,
    Libgit2,
}

impl FromStr for GitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "cli" | "git" => Ok(GitBackend::Cli),
            "libgit2" | "git2" => Ok(GitBackend::Libgit2),
            other => Err(format!(
                "unknown git backend {other:?} (expected `cli` or `libgit2`)"
            )),
        }
    }
}

impl GitBackend {
    pub fn client(self) -> Box<dyn GitClient> {
        match self {
            GitBackend::Cli => Box::new(CommandGitClient::new()),
            GitBackend::Libgit2 => Box::new(Git2Client::new()),
        }
    }
}

//! Error-text classification.
//!
//! Neither the git executable nor libgit2 report network failures with a
//! stable code, so the few decisions that depend on *why* a primitive failed
//! are made here by matching diagnostic text. Nothing else in the crate looks
//! at error messages.

use super::error::GitError;

/// Outcome of inspecting a failed network-facing primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The failure involved the network, but the host name resolved.
    Resolved,
    /// The remote host name could not be resolved.
    Unresolved,
    /// Not a network failure.
    Other,
}

const UNRESOLVED: &[&str] = &[
    "could not resolve hostname",
    "could not resolve host",
    "failed to resolve address",
    "name or service not known",
    "nodename nor servname",
    "temporary failure in name resolution",
];

const RESOLVED: &[&str] = &[
    "could not read from remote repository",
    "connection refused",
    "connection timed out",
    "unable to access",
];

/// Classify a primitive failure by its diagnostic text.
///
/// Only [`GitError::Execution`] carries transport diagnostics; every other
/// variant is [`NetworkFailure::Other`].
pub fn classify_network_failure(err: &GitError) -> NetworkFailure {
    let GitError::Execution { message, .. } = err else {
        return NetworkFailure::Other;
    };
    let text = message.to_lowercase();
    if UNRESOLVED.iter().any(|p| text.contains(p)) {
        NetworkFailure::Unresolved
    } else if RESOLVED.iter().any(|p| text.contains(p)) {
        NetworkFailure::Resolved
    } else {
        NetworkFailure::Other
    }
}

/// Map the diagnostic of a failed remote lookup to a typed error.
///
/// Returns `None` when the text is neither a "not a repository" nor a
/// "no such remote" report.
pub fn remote_lookup_failure(
    text: &str,
    dir: &std::path::Path,
    remote: &str,
) -> Option<GitError> {
    let text = text.to_lowercase();
    if text.contains("not a git repository") {
        Some(GitError::NotARepository {
            path: dir.to_path_buf(),
        })
    } else if text.contains("no such remote") {
        Some(GitError::NoSuchRemote {
            name: remote.to_string(),
        })
    } else {
        None
    }
}

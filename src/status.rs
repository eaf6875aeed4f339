//! Repository snapshot of the current directory.

use anyhow::Result;
use colored::Colorize;
use log::debug;
use serde::Serialize;
use std::path::Path;

use crate::config::Settings;
use crate::git::{Description, GitClient, GitError};

/// Point-in-time state of a working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Empty when `HEAD` is detached.
    pub branch: String,
    /// Empty when the repository has no tags.
    pub description: Description,
    pub hash: String,
    pub short_hash: String,
    /// Latest commit's author date, `YYYY-MM-DDTHH:MM:SS`.
    pub author_date: String,
    pub dirty: bool,
}

/// A failed probe.
///
/// When only the describe line was malformed, the snapshot gathered up to
/// that point is kept and available through [`StatusError::partial`].
#[derive(Debug, thiserror::Error)]
#[error("git status failed")]
pub struct StatusError {
    #[source]
    source: GitError,
    partial: Option<Box<Status>>,
}

impl StatusError {
    fn new(source: GitError) -> Self {
        Self {
            source,
            partial: None,
        }
    }

    pub fn cause(&self) -> &GitError {
        &self.source
    }

    pub fn partial(&self) -> Option<&Status> {
        self.partial.as_deref()
    }
}

impl From<GitError> for StatusError {
    fn from(source: GitError) -> Self {
        StatusError::new(source)
    }
}

/// `true` unless the porcelain report is empty once trailing line breaks
/// are removed.
pub fn is_dirty(report: &str) -> bool {
    !report.trim_end_matches(['\r', '\n']).is_empty()
}

/// Builds [`Status`] snapshots through a [`GitClient`].
pub struct StatusProbe<'a, C: GitClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: GitClient + ?Sized> StatusProbe<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Probe the repository containing the process working directory.
    pub fn probe(&self) -> Result<Status, StatusError> {
        let dir = std::env::current_dir().map_err(GitError::Resolution)?;
        self.probe_at(&dir)
    }

    /// Probe the repository containing `dir`.
    ///
    /// Branch lookup failures leave the branch empty and a failing describe
    /// leaves the description empty; every other primitive is mandatory.
    ///
    /// # Errors
    /// - `NotARepository` if `dir` is outside a working tree.
    /// - The primitive's error if the hash, short hash, author date or
    ///   status report cannot be read.
    /// - `MalformedDescription`, together with the partial snapshot, if the
    ///   describe line does not parse.
    pub fn probe_at(&self, dir: &Path) -> Result<Status, StatusError> {
        let dir = std::path::absolute(dir).map_err(GitError::Resolution)?;

        match self.client.is_inside_work_tree(&dir) {
            Ok(true) => {}
            Ok(false) => return Err(GitError::NotARepository { path: dir }.into()),
            Err(e) => {
                debug!("work tree check failed in {}: {}", dir.display(), e);
                return Err(GitError::NotARepository { path: dir }.into());
            }
        }

        let branch = self.client.current_branch(&dir).unwrap_or_else(|e| {
            debug!("no current branch: {}", e);
            String::new()
        });
        let hash = self.client.head_hash(&dir)?;
        let short_hash = self.client.head_short_hash(&dir)?;
        let author_date = self.client.last_author_date(&dir)?;

        let dirty = match self.client.status_porcelain(&dir) {
            Ok(report) => is_dirty(&report),
            Err(e) if e.is_empty_output() => false,
            Err(e) => return Err(e.into()),
        };

        let mut status = Status {
            branch,
            description: Description::default(),
            hash,
            short_hash,
            author_date,
            dirty,
        };

        let line = match self.client.describe(&dir) {
            Ok(line) => line,
            Err(e) => {
                debug!("no description: {}", e);
                return Ok(status);
            }
        };
        match Description::parse(&line) {
            Ok(d) => {
                status.description = d;
                Ok(status)
            }
            Err(e) => Err(StatusError {
                source: e,
                partial: Some(Box::new(status)),
            }),
        }
    }
}

fn print_status(s: &Status) {
    let branch = if s.branch.is_empty() {
        "(detached)".dimmed().to_string()
    } else {
        s.branch.clone()
    };
    let state = if s.dirty {
        "dirty".red().to_string()
    } else {
        "clean".green().to_string()
    };
    println!("branch:      {}", branch);
    println!("commit:      {} ({})", s.hash, s.short_hash);
    println!("author date: {}", s.author_date);
    println!("working tree: {}", state);
    if s.description.is_empty() {
        println!("description: {}", "(no tags)".dimmed());
    } else {
        println!("description: {}", s.description);
    }
}

/// CLI command: print the repository snapshot of the current directory.
///
/// With `json`, the [`Status`] is printed as a JSON object instead.
/// A partial snapshot is printed before a malformed-description error is
/// returned.
pub fn cmd_status(cfg: &Settings, json: bool) -> Result<()> {
    let client = cfg.git_backend.client();
    let probe = StatusProbe::new(client.as_ref());

    let (status, err) = match probe.probe() {
        Ok(s) => (s, None),
        Err(e) => match e.partial().cloned() {
            Some(partial) => (partial, Some(e)),
            None => return Err(e.into()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    match err {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::scripted::ScriptedClient;
    use crate::git::{CommandGitClient, Git2Client};
    use serial_test::serial;
    use std::error::Error;
    use tempfile::TempDir;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn healthy() -> ScriptedClient {
        ScriptedClient::new()
            .ok("is_inside_work_tree", "true")
            .ok("current_branch", "main")
            .ok("head_hash", HASH)
            .ok("head_short_hash", "0123456")
            .ok("last_author_date", "2024-05-01T10:11:12")
    }

    #[test]
    fn dirty_classification() {
        assert!(!is_dirty(""));
        assert!(!is_dirty("\n"));
        assert!(!is_dirty("\r\n"));
        assert!(is_dirty(" M src/main.rs"));
        assert!(is_dirty("?? new.txt\n"));
    }

    #[test]
    fn full_snapshot() {
        let client = healthy()
            .ok("status_porcelain", " M Cargo.toml")
            .ok("describe", "v1.2.0-rc-1-3-gabc123f");
        let s = StatusProbe::new(&client).probe_at(Path::new("/")).unwrap();
        assert_eq!(s.branch, "main");
        assert_eq!(s.hash, HASH);
        assert_eq!(s.short_hash, "0123456");
        assert_eq!(s.author_date, "2024-05-01T10:11:12");
        assert!(s.dirty);
        assert_eq!(s.description.tag, "v1.2.0-rc-1");
        assert_eq!(s.description.additional_commits, 3);
        assert_eq!(s.description.short_hash, "abc123f");
    }

    #[test]
    fn empty_status_means_clean_and_missing_tags_are_not_an_error() {
        let client = healthy().empty("status_porcelain").fail(
            "describe",
            "fatal: No names found, cannot describe anything.",
        );
        let s = StatusProbe::new(&client).probe_at(Path::new("/")).unwrap();
        assert!(!s.dirty);
        assert!(s.description.is_empty());
        assert_eq!(s.hash, HASH);
    }

    #[test]
    fn detached_head_gives_empty_branch() {
        let client = ScriptedClient::new()
            .ok("is_inside_work_tree", "true")
            .empty("current_branch")
            .ok("head_hash", HASH)
            .ok("head_short_hash", "0123456")
            .ok("last_author_date", "2024-05-01T10:11:12")
            .empty("status_porcelain")
            .ok("describe", "v1-0-g0123456");
        let s = StatusProbe::new(&client).probe_at(Path::new("/")).unwrap();
        assert_eq!(s.branch, "");
        assert_eq!(s.description.tag, "v1");
    }

    #[test]
    fn outside_a_repository_fails_before_other_queries() {
        let client = ScriptedClient::new().fail(
            "is_inside_work_tree",
            "fatal: not a git repository (or any of the parent directories): .git",
        );
        let err = StatusProbe::new(&client)
            .probe_at(Path::new("/"))
            .unwrap_err();
        assert!(matches!(err.cause(), GitError::NotARepository { .. }));
        assert!(err.partial().is_none());
        assert_eq!(client.calls(), vec!["is_inside_work_tree"]);
    }

    #[test]
    fn missing_hash_aborts() {
        let client = ScriptedClient::new()
            .ok("is_inside_work_tree", "true")
            .ok("current_branch", "main")
            .fail("head_hash", "fatal: ambiguous argument 'HEAD'");
        let err = StatusProbe::new(&client)
            .probe_at(Path::new("/"))
            .unwrap_err();
        assert!(matches!(err.cause(), GitError::Execution { .. }));
        assert!(err.partial().is_none());
        assert!(!client.called("status_porcelain"));
    }

    #[test]
    fn status_failure_other_than_empty_aborts() {
        let client = healthy().fail("status_porcelain", "fatal: index file corrupt");
        let err = StatusProbe::new(&client)
            .probe_at(Path::new("/"))
            .unwrap_err();
        assert!(matches!(err.cause(), GitError::Execution { .. }));
        assert!(!client.called("describe"));
    }

    #[test]
    fn malformed_description_surfaces_with_partial_status() {
        let client = healthy()
            .ok("status_porcelain", "?? x")
            .ok("describe", "not-a-description");
        let err = StatusProbe::new(&client)
            .probe_at(Path::new("/"))
            .unwrap_err();
        assert!(matches!(err.cause(), GitError::MalformedDescription { .. }));
        let partial = err.partial().unwrap();
        assert_eq!(partial.hash, HASH);
        assert!(partial.dirty);
        assert!(partial.description.is_empty());
    }

    #[test]
    fn errors_carry_a_stable_prefix_and_cause() {
        let client = ScriptedClient::new().ok("is_inside_work_tree", "false");
        let err = StatusProbe::new(&client)
            .probe_at(Path::new("/somewhere"))
            .unwrap_err();
        assert_eq!(err.to_string(), "git status failed");
        let cause = err.source().unwrap().to_string();
        assert!(cause.starts_with("not inside a git repository"), "{cause}");
    }

    #[test]
    #[serial]
    fn probe_uses_the_process_directory() {
        let tmp = TempDir::new().unwrap();
        crate::git::scripted::init_repo_with_commit(tmp.path());
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();

        let cli = StatusProbe::new(&CommandGitClient::new()).probe();
        let lib = StatusProbe::new(&Git2Client::new()).probe();
        std::env::set_current_dir(prev).unwrap();

        let cli = cli.unwrap();
        let lib = lib.unwrap();
        assert_eq!(cli.branch, "main");
        assert_eq!(cli.hash.len(), 40);
        assert!(!cli.dirty);
        assert!(cli.description.is_empty());
        assert_eq!(cli.hash, lib.hash);
        assert_eq!(cli.branch, lib.branch);
        assert_eq!(cli.author_date, lib.author_date);
    }

    #[test]
    #[serial]
    fn probe_outside_a_repository() {
        let tmp = TempDir::new().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        let res = StatusProbe::new(&CommandGitClient::new()).probe();
        std::env::set_current_dir(prev).unwrap();

        let err = res.unwrap_err();
        assert!(matches!(err.cause(), GitError::NotARepository { .. }));
    }

    #[test]
    fn tagged_repository_with_real_git() {
        let tmp = TempDir::new().unwrap();
        crate::git::scripted::init_repo_with_commit(tmp.path());
        crate::git::scripted::git(tmp.path(), &["tag", "v0.2.0-beta-1"]);
        std::fs::write(tmp.path().join("README.md"), "changed\n").unwrap();

        let s = StatusProbe::new(&CommandGitClient::new())
            .probe_at(tmp.path())
            .unwrap();
        assert!(s.dirty);
        assert_eq!(s.description.tag, "v0.2.0-beta-1");
        assert_eq!(s.description.additional_commits, 0);
        assert!(s.hash.starts_with(&s.description.short_hash));
    }
}

mod progress;

use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Settings;
use crate::git::{GitClient, GitError, NetworkFailure, classify_network_failure};

use progress::{SpinnerWriter, err_style, ok_style, spinner_style, warn_style};

/// Printed whenever the remote host cannot be resolved.
pub const OFFLINE_WARNING: &str = "🚨 Could not connect to remote repository.";

/// Where the archetype source lives locally and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    local_dir: PathBuf,
    remote_url: Option<String>,
}

impl SourceConfig {
    /// # Errors
    /// Returns [`GitError::MissingSourceDir`] if `local_dir` is empty.
    pub fn new(local_dir: impl Into<PathBuf>, remote_url: Option<&str>) -> Result<Self, GitError> {
        let local_dir = local_dir.into();
        if local_dir.as_os_str().is_empty() {
            return Err(GitError::MissingSourceDir);
        }
        let remote_url = remote_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Ok(Self {
            local_dir,
            remote_url,
        })
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }
}

/// What [`SourceSynchronizer::synchronize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The directory was missing and has been cloned.
    Cloned,
    /// `origin` was fetched and pulled.
    Updated,
    /// `origin` could not be resolved; the local copy is used as is.
    Offline,
    /// Nothing to reconcile (no `origin`, or not a repository).
    Untouched,
}

/// Brings a local working copy in line with its remote.
///
/// User-facing warnings go to `out`; everything else is logged.
pub struct SourceSynchronizer<'a, C: GitClient + ?Sized, W: Write> {
    client: &'a C,
    out: W,
}

impl<'a, C: GitClient + ?Sized, W: Write> SourceSynchronizer<'a, C, W> {
    pub fn new(client: &'a C, out: W) -> Self {
        Self { client, out }
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    fn offline_warning(&mut self) {
        if let Err(e) = writeln!(self.out, "{}", OFFLINE_WARNING.yellow()) {
            debug!("could not print offline warning: {}", e);
        }
    }

    /// Ensure `cfg.local_dir()` holds a usable working copy.
    ///
    /// - Missing directory, no remote: fails with `SourceUnavailable`.
    /// - Missing directory, remote: shallow clone of the default branch. An
    ///   unresolvable host prints a warning and fails with
    ///   `SourceUnavailable`.
    /// - Existing directory with an `origin` remote: fetch, then pull. An
    ///   unresolvable host prints a warning and returns
    ///   [`SyncOutcome::Offline`].
    /// - Existing directory without `origin`, or not a repository root of its
    ///   own (even when it sits inside another working tree):
    ///   [`SyncOutcome::Untouched`].
    ///
    /// Safe to call on every invocation.
    pub fn synchronize(&mut self, cfg: &SourceConfig) -> Result<SyncOutcome, GitError> {
        let dir = cfg.local_dir();
        if !dir.exists() {
            return self.materialize(dir, cfg.remote_url());
        }
        // git would otherwise walk up to an enclosing repository.
        if !dir.join(".git").exists() {
            debug!("{} is not a repository root, leaving it alone", dir.display());
            return Ok(SyncOutcome::Untouched);
        }

        let origin = match self.client.remote_url(dir, "origin") {
            Ok(url) => url,
            Err(e @ (GitError::NotARepository { .. } | GitError::NoSuchRemote { .. })) => {
                debug!("nothing to reconcile in {}: {}", dir.display(), e);
                return Ok(SyncOutcome::Untouched);
            }
            Err(e) => return Err(e),
        };

        if let Some(configured) = cfg.remote_url()
            && configured != origin
        {
            warn!(
                "origin of {} is {} but the configured source is {}; updating from origin",
                dir.display(),
                origin,
                configured
            );
        }

        info!("updating {} from {}", dir.display(), origin);
        if let Err(e) = self.client.fetch(dir) {
            return match classify_network_failure(&e) {
                NetworkFailure::Unresolved => {
                    warn!("fetch from {} failed, using local copy: {}", origin, e);
                    self.offline_warning();
                    Ok(SyncOutcome::Offline)
                }
                NetworkFailure::Resolved | NetworkFailure::Other => Err(e),
            };
        }
        self.client.pull(dir)?;
        Ok(SyncOutcome::Updated)
    }

    fn materialize(&mut self, dir: &Path, remote: Option<&str>) -> Result<SyncOutcome, GitError> {
        let Some(url) = remote else {
            return Err(GitError::SourceUnavailable {
                path: dir.to_path_buf(),
                source: None,
            });
        };

        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| GitError::Execution {
                command: format!("mkdir -p {}", parent.display()),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        }

        info!("cloning {} into {}", url, dir.display());
        match self.client.clone_shallow(url, dir) {
            Ok(()) => Ok(SyncOutcome::Cloned),
            Err(e) => match classify_network_failure(&e) {
                NetworkFailure::Unresolved => {
                    warn!("clone of {} failed: {}", url, e);
                    self.offline_warning();
                    Err(GitError::SourceUnavailable {
                        path: dir.to_path_buf(),
                        source: Some(Box::new(GitError::UnresolvedHost {
                            remote: url.to_string(),
                        })),
                    })
                }
                NetworkFailure::Resolved | NetworkFailure::Other => Err(e),
            },
        }
    }
}

/// Make sure the configured archetype source is present and current.
///
/// Runs [`SourceSynchronizer::synchronize`] behind a spinner.
///
/// # Errors
/// Returns an error if no source directory is configured or if
/// synchronization fails.
pub fn ensure_source(cfg: &Settings) -> Result<SyncOutcome> {
    let source = SourceConfig::new(
        cfg.source_dir.clone().unwrap_or_default(),
        cfg.source_repo.as_deref(),
    )?;
    let client = cfg.git_backend.client();

    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(format!("syncing {}", source.local_dir().display()));
    pb.enable_steady_tick(Duration::from_millis(80));

    let res = {
        let mut sync = SourceSynchronizer::new(client.as_ref(), SpinnerWriter::new(&pb));
        sync.synchronize(&source)
    };

    let shown = source.local_dir().display();
    match &res {
        Ok(SyncOutcome::Cloned) => {
            pb.set_style(ok_style());
            pb.finish_with_message(format!("cloned {}", shown));
        }
        Ok(SyncOutcome::Updated) => {
            pb.set_style(ok_style());
            pb.finish_with_message(format!("updated {}", shown));
        }
        Ok(SyncOutcome::Offline) => {
            pb.set_style(warn_style());
            pb.finish_with_message(format!("using local copy of {}", shown));
        }
        Ok(SyncOutcome::Untouched) => pb.finish_and_clear(),
        Err(_) => {
            pb.set_style(err_style());
            pb.finish_with_message(format!("syncing {} failed", shown));
        }
    }
    Ok(res?)
}

use log::trace;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

use super::GitClient;
use super::classify::remote_lookup_failure;
use super::error::GitError;

/// Runs single git primitives as child processes.
///
/// Each call spawns `git -C <dir> <args…>` and waits for it. There is no
/// caching and no retrying.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: OsString,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl CommandRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one primitive in `dir` and return its stdout, trimmed.
    ///
    /// # Errors
    /// - [`GitError::Execution`] if the program is missing, `dir` does not
    ///   exist, or the process exits non-zero (the message is its stderr).
    /// - [`GitError::EmptyOutput`] if it succeeded but printed nothing.
    pub fn run<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<String, GitError> {
        let command = self.render(dir, args);
        trace!("running {}", command);

        let output = Command::new(&self.program)
            .arg("-C")
            .arg(dir)
            .args(args)
            // Diagnostics are matched as English text.
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                let message = if e.kind() == ErrorKind::NotFound {
                    format!("{} not found in PATH", self.program.to_string_lossy())
                } else {
                    e.to_string()
                };
                GitError::Execution {
                    command: command.clone(),
                    message,
                    source: Some(Box::new(e)),
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(GitError::Execution {
                command,
                message,
                source: None,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(GitError::EmptyOutput { command });
        }
        Ok(stdout)
    }

    /// Like [`run`](Self::run) for primitives whose stdout does not matter.
    pub fn run_quiet<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<(), GitError> {
        match self.run(dir, args) {
            Ok(_) | Err(GitError::EmptyOutput { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn render<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> String {
        let mut s = format!("{} -C {}", self.program.to_string_lossy(), dir.display());
        for a in args {
            s.push(' ');
            s.push_str(&a.as_ref().to_string_lossy());
        }
        s
    }
}

/// [`GitClient`] backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct CommandGitClient {
    runner: CommandRunner,
}

impl CommandGitClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

impl GitClient for CommandGitClient {
    fn is_inside_work_tree(&self, dir: &Path) -> Result<bool, GitError> {
        let out = self.runner.run(dir, &["rev-parse", "--is-inside-work-tree"])?;
        Ok(out == "true")
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(dir, &["branch", "--show-current"])
    }

    fn head_hash(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(dir, &["rev-parse", "HEAD"])
    }

    fn head_short_hash(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(dir, &["rev-parse", "--short", "HEAD"])
    }

    fn last_author_date(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(
            dir,
            &["log", "-n1", "--date=format:%Y-%m-%dT%H:%M:%S", "--format=%ad"],
        )
    }

    fn status_porcelain(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(dir, &["status", "--porcelain"])
    }

    fn describe(&self, dir: &Path) -> Result<String, GitError> {
        self.runner.run(dir, &["describe", "--tags", "--long"])
    }

    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let dest = std::path::absolute(dest).map_err(GitError::Resolution)?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("/"));
        let args: [&OsStr; 6] = [
            OsStr::new("clone"),
            OsStr::new("--depth"),
            OsStr::new("1"),
            OsStr::new("--single-branch"),
            OsStr::new(url),
            dest.as_os_str(),
        ];
        self.runner.run_quiet(parent, &args)
    }

    fn remote_url(&self, dir: &Path, name: &str) -> Result<String, GitError> {
        match self.runner.run(dir, &["remote", "get-url", name]) {
            Err(GitError::Execution {
                command,
                message,
                source,
            }) => Err(
                remote_lookup_failure(&message, dir, name).unwrap_or(GitError::Execution {
                    command,
                    message,
                    source,
                }),
            ),
            other => other,
        }
    }

    fn fetch(&self, dir: &Path) -> Result<(), GitError> {
        self.runner.run_quiet(dir, &["fetch"])
    }

    fn pull(&self, dir: &Path) -> Result<(), GitError> {
        self.runner.run_quiet(dir, &["pull", "--ff-only"])
    }
}

//! Test doubles and repository fixtures.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::process::Command;

use super::GitClient;
use super::error::GitError;

type Answer = Result<String, GitError>;

/// Replays queued answers per primitive and records every call.
///
/// A primitive with nothing queued fails with an `Execution` error naming it,
/// so a test notices calls it did not expect.
#[derive(Default)]
pub struct ScriptedClient {
    answers: RefCell<HashMap<&'static str, VecDeque<Answer>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, primitive: &'static str, answer: Answer) -> Self {
        self.answers
            .borrow_mut()
            .entry(primitive)
            .or_default()
            .push_back(answer);
        self
    }

    pub fn ok(self, primitive: &'static str, out: &str) -> Self {
        self.on(primitive, Ok(out.to_string()))
    }

    pub fn fail(self, primitive: &'static str, message: &str) -> Self {
        self.on(primitive, Err(GitError::execution(primitive, message)))
    }

    pub fn empty(self, primitive: &'static str) -> Self {
        self.on(
            primitive,
            Err(GitError::EmptyOutput {
                command: primitive.to_string(),
            }),
        )
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, primitive: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == primitive)
    }

    fn answer(&self, primitive: &'static str) -> Answer {
        self.calls.borrow_mut().push(primitive.to_string());
        self.answers
            .borrow_mut()
            .get_mut(primitive)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(GitError::execution(primitive, "unexpected call")))
    }

    /// Unit primitives succeed on empty output, like `CommandRunner::run_quiet`.
    fn answer_unit(&self, primitive: &'static str) -> Result<(), GitError> {
        match self.answer(primitive) {
            Ok(_) | Err(GitError::EmptyOutput { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl GitClient for ScriptedClient {
    fn is_inside_work_tree(&self, _dir: &Path) -> Result<bool, GitError> {
        self.answer("is_inside_work_tree").map(|s| s == "true")
    }

    fn current_branch(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("current_branch")
    }

    fn head_hash(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("head_hash")
    }

    fn head_short_hash(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("head_short_hash")
    }

    fn last_author_date(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("last_author_date")
    }

    fn status_porcelain(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("status_porcelain")
    }

    fn describe(&self, _dir: &Path) -> Result<String, GitError> {
        self.answer("describe")
    }

    fn clone_shallow(&self, _url: &str, _dest: &Path) -> Result<(), GitError> {
        self.answer_unit("clone_shallow")
    }

    fn remote_url(&self, _dir: &Path, _name: &str) -> Result<String, GitError> {
        self.answer("remote_url")
    }

    fn fetch(&self, _dir: &Path) -> Result<(), GitError> {
        self.answer_unit("fetch")
    }

    fn pull(&self, _dir: &Path) -> Result<(), GitError> {
        self.answer_unit("pull")
    }
}

pub(crate) fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git should be installed");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

/// `git init` plus a local identity and one commit of `README.md`.
pub(crate) fn init_repo_with_commit(dir: &Path) {
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    fs::write(dir.join("README.md"), "# archetypes\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_primitives_treat_empty_output_as_success() {
        let client = ScriptedClient::new()
            .empty("clone_shallow")
            .empty("fetch")
            .ok("pull", "Already up to date.")
            .fail("pull", "fatal: Not possible to fast-forward, aborting.");
        let dir = Path::new("/tmp");
        client.clone_shallow("https://example.com/a.git", dir).unwrap();
        client.fetch(dir).unwrap();
        client.pull(dir).unwrap();
        assert!(matches!(client.pull(dir), Err(GitError::Execution { .. })));
    }

    #[test]
    fn queries_keep_empty_output_as_an_error() {
        let client = ScriptedClient::new().empty("status_porcelain");
        assert!(
            client
                .status_porcelain(Path::new("/tmp"))
                .unwrap_err()
                .is_empty_output()
        );
    }
}

use chrono::{DateTime, FixedOffset};
use git2::{
    BranchType, Cred, DescribeFormatOptions, DescribeOptions, Direction, ErrorCode, FetchOptions,
    Remote, RemoteCallbacks, Repository, Status as FileStatus, StatusOptions,
    build::{CheckoutBuilder, RepoBuilder},
};
use log::{debug, trace};
use std::path::Path;

use super::GitClient;
use super::error::GitError;

/// [`GitClient`] backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

/// Remote callbacks with SSH-agent credentials enabled.
///
/// Falls back to default credentials if the agent has no usable key.
fn callbacks() -> RemoteCallbacks<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });
    cb
}

fn fetch_opts_with_creds() -> FetchOptions<'static> {
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(callbacks());
    fo
}

/// libgit2's local transport cannot negotiate shallow fetches.
fn is_local_url(url: &str) -> bool {
    url.starts_with("file://") || Path::new(url).exists()
}

fn discover(dir: &Path, command: &str) -> Result<Repository, GitError> {
    trace!("libgit2 {} in {}", command, dir.display());
    Repository::discover(dir).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            GitError::NotARepository {
                path: dir.to_path_buf(),
            }
        } else {
            GitError::from_git2(command, e)
        }
    })
}

/// Like [`discover`] but `dir` must be the repository root itself.
fn open(dir: &Path, command: &str) -> Result<Repository, GitError> {
    trace!("libgit2 {} in {}", command, dir.display());
    Repository::open(dir).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            GitError::NotARepository {
                path: dir.to_path_buf(),
            }
        } else {
            GitError::from_git2(command, e)
        }
    })
}

fn lib_err(command: &'static str) -> impl Fn(git2::Error) -> GitError {
    move |e| GitError::from_git2(command, e)
}

/// Two-column porcelain code for one status entry (`XY`).
fn porcelain_code(st: FileStatus) -> &'static str {
    if st.is_wt_new() {
        return "??";
    }
    if st.is_conflicted() {
        return "UU";
    }
    let index = if st.is_index_new() {
        'A'
    } else if st.is_index_deleted() {
        'D'
    } else if st.is_index_renamed() {
        'R'
    } else if st.is_index_modified() || st.is_index_typechange() {
        'M'
    } else {
        ' '
    };
    let worktree = if st.is_wt_deleted() {
        'D'
    } else if st.is_wt_modified() || st.is_wt_typechange() || st.is_wt_renamed() {
        'M'
    } else {
        ' '
    };
    match (index, worktree) {
        ('A', ' ') => "A ",
        ('A', 'M') => "AM",
        ('A', 'D') => "AD",
        ('D', _) => "D ",
        ('R', ' ') => "R ",
        ('R', _) => "RM",
        ('M', ' ') => "M ",
        ('M', 'M') => "MM",
        ('M', 'D') => "MD",
        (' ', 'D') => " D",
        _ => " M",
    }
}

/// Render `seconds` in the commit's own UTC offset.
fn format_author_date(seconds: i64, offset_minutes: i32) -> Option<String> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    let utc = DateTime::from_timestamp(seconds, 0)?;
    Some(
        utc.with_timezone(&offset)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    )
}

impl GitClient for Git2Client {
    fn is_inside_work_tree(&self, dir: &Path) -> Result<bool, GitError> {
        match discover(dir, "open") {
            Ok(repo) => Ok(!repo.is_bare() && repo.workdir().is_some()),
            Err(GitError::NotARepository { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "branch")?;
        let head = repo.head().map_err(lib_err("branch"))?;
        if !head.is_branch() {
            return Err(GitError::EmptyOutput {
                command: "libgit2 branch".to_string(),
            });
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| GitError::execution("libgit2 branch", "branch name is not UTF-8"))
    }

    fn head_hash(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "rev-parse")?;
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(lib_err("rev-parse"))?;
        Ok(commit.id().to_string())
    }

    fn head_short_hash(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "rev-parse --short")?;
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(lib_err("rev-parse --short"))?;
        let short = commit
            .as_object()
            .short_id()
            .map_err(lib_err("rev-parse --short"))?;
        short
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GitError::execution("libgit2 rev-parse --short", "short id is not UTF-8"))
    }

    fn last_author_date(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "log")?;
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(lib_err("log"))?;
        let when = commit.author().when();
        format_author_date(when.seconds(), when.offset_minutes())
            .ok_or_else(|| GitError::execution("libgit2 log", "author date out of range"))
    }

    fn status_porcelain(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "status")?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts)).map_err(lib_err("status"))?;

        let report: Vec<String> = statuses
            .iter()
            .filter(|e| e.status() != FileStatus::CURRENT && !e.status().is_ignored())
            .map(|e| format!("{} {}", porcelain_code(e.status()), e.path().unwrap_or("?")))
            .collect();

        if report.is_empty() {
            return Err(GitError::EmptyOutput {
                command: "libgit2 status".to_string(),
            });
        }
        Ok(report.join("\n"))
    }

    fn describe(&self, dir: &Path) -> Result<String, GitError> {
        let repo = discover(dir, "describe")?;
        let mut opts = DescribeOptions::new();
        opts.describe_tags();
        let mut format = DescribeFormatOptions::new();
        format.always_use_long_format(true);
        repo.describe(&opts)
            .and_then(|d| d.format(Some(&format)))
            .map_err(lib_err("describe"))
    }

    /// Ask the remote for its default branch, then clone only that branch.
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let mut detached = Remote::create_detached(url).map_err(lib_err("clone"))?;
        let branch = {
            let conn = detached
                .connect_auth(Direction::Fetch, Some(callbacks()), None)
                .map_err(lib_err("clone"))?;
            let head = conn.default_branch().map_err(lib_err("clone"))?;
            let head = head.as_str().unwrap_or("refs/heads/main");
            head.strip_prefix("refs/heads/").unwrap_or(head).to_string()
        };
        debug!("cloning {} ({}) into {}", url, branch, dest.display());

        let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
        let mut fo = fetch_opts_with_creds();
        if !is_local_url(url) {
            fo.depth(1);
        }

        let mut builder = RepoBuilder::new();
        builder
            .branch(&branch)
            .fetch_options(fo)
            .remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec));
        builder.clone(url, dest).map_err(lib_err("clone"))?;
        Ok(())
    }

    fn remote_url(&self, dir: &Path, name: &str) -> Result<String, GitError> {
        let repo = open(dir, "remote get-url")?;
        let remote = repo.find_remote(name).map_err(|e| {
            if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::InvalidSpec {
                GitError::NoSuchRemote {
                    name: name.to_string(),
                }
            } else {
                GitError::from_git2("remote get-url", e)
            }
        })?;
        remote
            .url()
            .map(str::to_string)
            .ok_or_else(|| GitError::execution("libgit2 remote get-url", "remote URL is not UTF-8"))
    }

    /// `git fetch origin` with the configured refspecs.
    fn fetch(&self, dir: &Path) -> Result<(), GitError> {
        let repo = open(dir, "fetch")?;
        let mut remote = repo.find_remote("origin").map_err(lib_err("fetch"))?;
        let mut fo = fetch_opts_with_creds();
        remote
            .fetch(&[] as &[&str], Some(&mut fo), None)
            .map_err(lib_err("fetch"))?;
        Ok(())
    }

    /// Fetch, then fast-forward the current branch to its upstream, as
    /// `git pull --ff-only` does.
    fn pull(&self, dir: &Path) -> Result<(), GitError> {
        self.fetch(dir)?;
        let repo = open(dir, "pull")?;

        let head = repo.head().map_err(lib_err("pull"))?;
        let (Some(refname), Some(branch_name)) = (head.name(), head.shorthand()) else {
            return Err(GitError::execution("libgit2 pull", "invalid HEAD reference name"));
        };
        if !head.is_branch() {
            return Err(GitError::execution("libgit2 pull", "HEAD is detached"));
        }
        let refname = refname.to_string();

        let upstream = repo
            .find_branch(branch_name, BranchType::Local)
            .and_then(|b| b.upstream())
            .map_err(lib_err("pull"))?;
        let Some(target) = upstream.get().target() else {
            return Err(GitError::execution("libgit2 pull", "upstream has no target"));
        };

        let annotated = repo.find_annotated_commit(target).map_err(lib_err("pull"))?;
        let (analysis, _) = repo.merge_analysis(&[&annotated]).map_err(lib_err("pull"))?;
        if analysis.is_up_to_date() {
            debug!("{} already up to date", dir.display());
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            return Err(GitError::execution(
                "libgit2 pull",
                "not possible to fast-forward, aborting",
            ));
        }

        let object = repo.find_object(target, None).map_err(lib_err("pull"))?;
        repo.checkout_tree(&object, Some(CheckoutBuilder::new().safe()))
            .map_err(lib_err("pull"))?;
        repo.find_reference(&refname)
            .and_then(|mut r| r.set_target(target, "pull: fast-forward").map(|_| ()))
            .map_err(lib_err("pull"))?;
        repo.set_head(&refname).map_err(lib_err("pull"))?;
        Ok(())
    }
}

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::error::GitError;

/// `<tag>-<N>-g<hex>`; the greedy tag group makes the match bind to the
/// last `-<digits>-g<hex>` suffix, so hyphenated tags stay intact.
static DESCRIBE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)-(\d+)-g([0-9,a-f]+)$").expect("valid describe regex"));

/// Result of `git describe --tags --long`.
///
/// The default value (empty tag, zero commits, empty hash) stands for a
/// repository without any tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Description {
    pub tag: String,
    /// Number of commits on top of `tag`.
    pub additional_commits: u32,
    pub short_hash: String,
}

impl Description {
    pub fn is_empty(&self) -> bool {
        self == &Description::default()
    }

    /// Parse one describe line such as `v1.2.0-rc-1-3-gabc123f`.
    ///
    /// # Errors
    /// Returns [`GitError::MalformedDescription`] if the line does not end in
    /// `-<N>-g<hex>` or if `<N>` does not fit a `u32`.
    pub fn parse(line: &str) -> Result<Self, GitError> {
        let caps = DESCRIBE_RE
            .captures(line)
            .ok_or_else(|| GitError::MalformedDescription {
                line: line.to_string(),
                source: None,
            })?;

        let additional_commits =
            caps[2]
                .parse::<u32>()
                .map_err(|e| GitError::MalformedDescription {
                    line: line.to_string(),
                    source: Some(e),
                })?;

        Ok(Description {
            tag: caps[1].to_string(),
            additional_commits,
            short_hash: caps[3].to_string(),
        })
    }
}

impl std::fmt::Display for Description {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-g{}",
            self.tag, self.additional_commits, self.short_hash
        )
    }
}

use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::git::GitBackend;

pub const ENV_PREFIX: &str = "RARCHETYPE";

const DEFAULT_ARCHETYPES_FOLDER: &str = "archetypes";
const DEFAULT_ARCHETYPE: &str = "hello-world";
const DEFAULT_TRANSFORMATION: &str = "default";
const DEFAULT_GENERATOR: &str = "go-archetype";
const DEFAULT_PROJECT_MARKER: &str = "go.mod";

/// Variable suffixes understood by [`Settings`], sorted.
const VARIABLES: &[&str] = &[
    "ARCHETYPE",
    "ARCHETYPES_FOLDER",
    "ENV",
    "GENERATOR",
    "GIT_BACKEND",
    "PROJECT_MARKER",
    "SOURCE_DIR",
    "SOURCE_REPO",
    "TRANSFORMATION",
    "VERBOSE",
];

fn var_name(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

/// Fully resolved configuration for one invocation.
///
/// Built once in `main` from, highest precedence first:
/// 1. command-line flags ([`Overrides`])
/// 2. the process environment
/// 3. `./.env`
/// 4. the dotenv file named by `RARCHETYPE_ENV`
/// 5. built-in defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub verbose: bool,
    /// Defaults to the archetype name when unset.
    pub feature_name: Option<String>,
    pub archetypes_folder: String,
    pub archetype: String,
    pub transformation: String,
    pub source_dir: Option<PathBuf>,
    pub source_repo: Option<String>,
    pub git_backend: GitBackend,
    /// Executable implementing the overlay generation.
    pub generator: String,
    /// File that must exist in the destination before adding a feature.
    pub project_marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            feature_name: None,
            archetypes_folder: DEFAULT_ARCHETYPES_FOLDER.to_string(),
            archetype: DEFAULT_ARCHETYPE.to_string(),
            transformation: DEFAULT_TRANSFORMATION.to_string(),
            source_dir: None,
            source_repo: None,
            git_backend: GitBackend::default(),
            generator: DEFAULT_GENERATOR.to_string(),
            project_marker: DEFAULT_PROJECT_MARKER.to_string(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub verbose: bool,
    pub feature_name: Option<String>,
    pub archetype: Option<String>,
    pub transformation: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub source_repo: Option<String>,
    pub project_marker: Option<String>,
}

impl Settings {
    /// Resolve settings from the process environment, `./.env`, the
    /// `RARCHETYPE_ENV` file and `overrides`.
    ///
    /// The process environment is read but never modified.
    ///
    /// # Errors
    /// - The file named by `RARCHETYPE_ENV` cannot be read or parsed.
    /// - `RARCHETYPE_GIT_BACKEND` names an unknown backend.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let vars = layered_env(std::env::vars(), Path::new(".env"))?;
        Self::from_vars(&vars, overrides)
    }

    /// Resolve settings from an already layered variable map.
    pub fn from_vars(vars: &HashMap<String, String>, overrides: &Overrides) -> Result<Self> {
        let get = |suffix: &str| {
            vars.get(&var_name(suffix))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let defaults = Settings::default();

        let git_backend = match get("GIT_BACKEND") {
            Some(name) => name
                .parse::<GitBackend>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {}", var_name("GIT_BACKEND")))?,
            None => defaults.git_backend,
        };

        let env_verbose = get("VERBOSE").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Settings {
            verbose: overrides.verbose || env_verbose,
            feature_name: overrides.feature_name.clone().filter(|f| !f.is_empty()),
            archetypes_folder: get("ARCHETYPES_FOLDER").unwrap_or(defaults.archetypes_folder),
            archetype: overrides
                .archetype
                .clone()
                .or_else(|| get("ARCHETYPE"))
                .unwrap_or(defaults.archetype),
            transformation: overrides
                .transformation
                .clone()
                .or_else(|| get("TRANSFORMATION"))
                .unwrap_or(defaults.transformation),
            source_dir: overrides
                .source_dir
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .or_else(|| get("SOURCE_DIR").map(PathBuf::from)),
            source_repo: overrides
                .source_repo
                .clone()
                .filter(|r| !r.is_empty())
                .or_else(|| get("SOURCE_REPO")),
            git_backend,
            generator: get("GENERATOR").unwrap_or(defaults.generator),
            project_marker: overrides
                .project_marker
                .clone()
                .or_else(|| get("PROJECT_MARKER"))
                .unwrap_or(defaults.project_marker),
        })
    }
}

fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read env file: {}", path.display()))?;
    iter.collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse env file: {}", path.display()))
}

/// Merge `process` with dotenv files without letting a file override a
/// variable that is already set.
///
/// `local` (normally `./.env`) is optional and skipped with a warning if it
/// does not parse. The file named by `RARCHETYPE_ENV`, if any, is required.
pub fn layered_env(
    process: impl IntoIterator<Item = (String, String)>,
    local: &Path,
) -> Result<HashMap<String, String>> {
    let mut vars: HashMap<String, String> = process.into_iter().collect();

    if local.is_file() {
        match read_dotenv(local) {
            Ok(pairs) => {
                for (k, v) in pairs {
                    vars.entry(k).or_insert(v);
                }
            }
            Err(e) => warn!("ignoring {}: {:#}", local.display(), e),
        }
    }

    if let Some(extra) = vars.get(&var_name("ENV")).filter(|v| !v.is_empty()).cloned() {
        for (k, v) in read_dotenv(Path::new(&extra))? {
            vars.entry(k).or_insert(v);
        }
    }

    Ok(vars)
}

/// Names of every environment variable the tool reads.
pub fn environment_variables() -> Vec<String> {
    VARIABLES.iter().map(|s| var_name(s)).collect()
}

/// CLI command: print the recognised environment variables, one per line.
pub fn cmd_environment() -> Result<()> {
    for name in environment_variables() {
        println!("{}", name);
    }
    Ok(())
}

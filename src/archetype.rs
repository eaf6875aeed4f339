//! Layout of an archetype source tree.
//!
//! ```text
//! <source dir>/<archetypes folder>/<archetype>/transformations-<name>.yaml
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TRANSFORMATION_PREFIX: &str = "transformations-";
pub const TRANSFORMATION_EXT: &str = "yaml";
pub const DEFAULT_TRANSFORMATION: &str = "default";
pub const FEATURE_NAME_ID: &str = "feature_name";

#[derive(Debug, thiserror::Error)]
pub enum ArchetypeError {
    #[error("undefined {0}")]
    Undefined(&'static str),

    #[error("invalid archetypes folder: {}", .0.display())]
    InvalidArchetypesFolder(PathBuf),

    #[error("invalid archetype folder: {}", .0.display())]
    InvalidArchetypeFolder(PathBuf),

    #[error("invalid transformation file: {}", .0.display())]
    InvalidTransformationFile(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArchetypeError + '_ {
    move |source| ArchetypeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn existing_dir(
    base: &Path,
    name: &str,
    what: &'static str,
    invalid: fn(PathBuf) -> ArchetypeError,
) -> Result<PathBuf, ArchetypeError> {
    if base.as_os_str().is_empty() {
        return Err(ArchetypeError::Undefined("dir"));
    }
    if name.is_empty() {
        return Err(ArchetypeError::Undefined(what));
    }
    let dir = base.join(name);
    let meta = fs::metadata(&dir).map_err(io_err(&dir))?;
    if !meta.is_dir() {
        return Err(invalid(dir));
    }
    Ok(dir)
}

/// `<source>/<folder>`, which must be an existing directory.
pub fn archetypes_folder(source: &Path, folder: &str) -> Result<PathBuf, ArchetypeError> {
    existing_dir(
        source,
        folder,
        "archetypes",
        ArchetypeError::InvalidArchetypesFolder,
    )
}

/// `<archetypes>/<archetype>`, which must be an existing directory.
pub fn archetype_folder(archetypes: &Path, archetype: &str) -> Result<PathBuf, ArchetypeError> {
    existing_dir(
        archetypes,
        archetype,
        "archetype",
        ArchetypeError::InvalidArchetypeFolder,
    )
}

/// File name holding the named transformation.
pub fn transformation_file_name(transformation: &str) -> Result<String, ArchetypeError> {
    if transformation.is_empty() {
        return Err(ArchetypeError::Undefined("transformation"));
    }
    Ok(format!(
        "{}{}.{}",
        TRANSFORMATION_PREFIX, transformation, TRANSFORMATION_EXT
    ))
}

/// Path of the named transformation inside `archetype_dir`; it must be a file.
pub fn transformation_file(
    archetype_dir: &Path,
    transformation: &str,
) -> Result<PathBuf, ArchetypeError> {
    let path = archetype_dir.join(transformation_file_name(transformation)?);
    let meta = fs::metadata(&path).map_err(io_err(&path))?;
    if meta.is_dir() {
        return Err(ArchetypeError::InvalidTransformationFile(path));
    }
    Ok(path)
}

/// Names of the archetype directories under `archetypes`, sorted.
pub fn list_archetypes(archetypes: &Path) -> Result<Vec<String>, ArchetypeError> {
    if archetypes.as_os_str().is_empty() {
        return Err(ArchetypeError::Undefined("dir"));
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(archetypes).map_err(io_err(archetypes))? {
        let entry = entry.map_err(io_err(archetypes))?;
        let path = entry.path();
        // Follows symlinks.
        let meta = fs::metadata(&path).map_err(io_err(&path))?;
        if meta.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Transformation names offered by `archetype_dir`, sorted.
///
/// A file counts when its name starts with `transformations-` and ends with
/// `yaml`; the name is what lies between the prefix and `.yaml`.
pub fn list_transformations(archetype_dir: &Path) -> Result<Vec<String>, ArchetypeError> {
    if archetype_dir.as_os_str().is_empty() {
        return Err(ArchetypeError::Undefined("dir"));
    }
    let dotted = format!(".{}", TRANSFORMATION_EXT);
    let mut names = Vec::new();
    for entry in fs::read_dir(archetype_dir).map_err(io_err(archetype_dir))? {
        let entry = entry.map_err(io_err(archetype_dir))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(rest) = file_name.strip_prefix(TRANSFORMATION_PREFIX) else {
            continue;
        };
        if !file_name.ends_with(TRANSFORMATION_EXT) {
            continue;
        }
        names.push(rest.strip_suffix(&dotted).unwrap_or(rest).to_string());
    }
    names.sort();
    Ok(names)
}

/// `true` if the transformation declares a `feature_name` input.
pub fn wants_feature_name(transformation: &str) -> bool {
    transformation.contains(&format!("- id: {}", FEATURE_NAME_ID))
}

/// Generator arguments with `--feature_name <name>` first, if given.
///
/// Any `--feature_name X` or `--feature_name=X` in `args` is dropped.
pub fn feature_args(feature_name: Option<&str>, args: &[String]) -> Vec<String> {
    let flag = format!("--{}", FEATURE_NAME_ID);
    let flag_eq = format!("{}=", flag);

    let mut out = Vec::with_capacity(args.len() + 2);
    if let Some(name) = feature_name.filter(|n| !n.is_empty()) {
        out.push(flag.clone());
        out.push(name.to_string());
    }

    let mut skip_next = false;
    for a in args {
        if skip_next {
            skip_next = false;
        } else if *a == flag {
            skip_next = true;
        } else if !a.starts_with(&flag_eq) {
            out.push(a.clone());
        }
    }
    out
}

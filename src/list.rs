use anyhow::{Result, bail};
use std::io::Write;
use std::path::Path;

use crate::archetype::{
    DEFAULT_TRANSFORMATION, archetypes_folder, list_archetypes, list_transformations,
};
use crate::config::Settings;
use crate::sync::ensure_source;

/// Print the archetypes found under `<source>/<folder>`.
///
/// Archetypes without transformations are skipped. Transformation lines are
/// left out when `default` is the only one.
///
/// ```text
/// 📦 Archetype: hello-world
/// 📦 Archetype: http-handler
///  📄 Transformation: chi
///  📄 Transformation: default
/// ```
pub fn write_listing<W: Write>(source: &Path, folder: &str, out: &mut W) -> Result<()> {
    let root = archetypes_folder(source, folder)?;
    for name in list_archetypes(&root)? {
        let transformations = list_transformations(&root.join(&name))?;
        if transformations.is_empty() {
            continue;
        }
        writeln!(out, "📦 Archetype: {}", name)?;
        if transformations.len() == 1 && transformations[0] == DEFAULT_TRANSFORMATION {
            continue;
        }
        for t in &transformations {
            writeln!(out, " 📄 Transformation: {}", t)?;
        }
    }
    Ok(())
}

/// CLI command: synchronize the source and list its archetypes.
///
/// # Errors
/// - No source directory is configured, or synchronization fails.
/// - The archetypes folder is missing or unreadable.
pub fn cmd_list(cfg: &Settings) -> Result<()> {
    ensure_source(cfg)?;
    let Some(source) = cfg.source_dir.as_deref() else {
        bail!("source directory is required");
    };
    let stdout = std::io::stdout();
    write_listing(source, &cfg.archetypes_folder, &mut stdout.lock())
}

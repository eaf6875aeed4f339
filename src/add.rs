use anyhow::{Context, Result, bail};
use log::debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archetype::{
    archetype_folder, archetypes_folder, feature_args, transformation_file, wants_feature_name,
};
use crate::config::Settings;
use crate::generator::{Generator, ProcessGenerator};
use crate::git::GitClient;
use crate::status::StatusProbe;
use crate::sync::ensure_source;

/// A validated `add` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub feature_name: String,
    pub archetype: String,
    pub transformation: String,
    pub archetypes_folder: String,
    pub source_dir: PathBuf,
}

impl AddRequest {
    /// Check `cfg` and fill in the feature name.
    ///
    /// Every problem found is reported in one error.
    pub fn from_settings(cfg: &Settings) -> Result<Self> {
        let mut problems = Vec::new();
        if cfg.archetype.is_empty() {
            problems.push("archetype is required");
        }
        let source_dir = cfg
            .source_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty());
        if source_dir.is_none() {
            problems.push("source directory is required");
        }
        let Some(source_dir) = source_dir.filter(|_| problems.is_empty()) else {
            bail!("{}", problems.join("; "));
        };

        Ok(Self {
            feature_name: cfg
                .feature_name
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| cfg.archetype.clone()),
            archetype: cfg.archetype.clone(),
            transformation: cfg.transformation.clone(),
            archetypes_folder: cfg.archetypes_folder.clone(),
            source_dir,
        })
    }
}

/// Overlay the requested archetype onto `destination`.
///
/// `destination` must be a clean git working tree. Progress lines go to `out`.
pub fn add_feature<C, G, W>(
    req: &AddRequest,
    destination: &Path,
    client: &C,
    generator: &G,
    args: &[String],
    out: &mut W,
) -> Result<()>
where
    C: GitClient + ?Sized,
    G: Generator + ?Sized,
    W: Write,
{
    let destination = std::path::absolute(destination)
        .with_context(|| format!("failed to resolve {}", destination.display()))?;
    let root = archetypes_folder(&req.source_dir, &req.archetypes_folder)?;
    let base = archetype_folder(&root, &req.archetype)?;

    writeln!(
        out,
        "🌱 Adding '{}' feature using '{}' archetype.",
        req.feature_name, req.archetype
    )?;
    let tf = transformation_file(&base, &req.transformation)?;
    writeln!(out, "📦 Using transformation file: {}", tf.display())?;

    let status = StatusProbe::new(client).probe_at(&destination)?;
    if status.dirty {
        bail!("git repository is dirty");
    }

    let content =
        fs::read_to_string(&tf).with_context(|| format!("failed to read {}", tf.display()))?;
    let name = wants_feature_name(&content).then_some(req.feature_name.as_str());
    let args = feature_args(name, args);
    debug!("generator args: {:?}", args);

    generator.generate(&tf, &base, &destination, &args)?;
    writeln!(out, "🎉 Feature '{}' added.", req.feature_name)?;
    Ok(())
}

/// CLI command: add a feature to the project in the current directory.
///
/// # Errors
/// - The project marker file is missing from the current directory.
/// - The source cannot be synchronized.
/// - The request is incomplete, the archetype layout is invalid, the working
///   tree is dirty, or the generator fails.
pub fn cmd_add(cfg: &Settings, args: &[String]) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    if !cwd.join(&cfg.project_marker).exists() {
        bail!("{} file not found in the current folder", cfg.project_marker);
    }

    ensure_source(cfg)?;
    let req = AddRequest::from_settings(cfg)?;

    let client = cfg.git_backend.client();
    let generator = ProcessGenerator::new(&cfg.generator);
    let stdout = std::io::stdout();
    add_feature(
        &req,
        &cwd,
        client.as_ref(),
        &generator,
        args,
        &mut stdout.lock(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerateError;
    use crate::git::scripted::ScriptedClient;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingGenerator {
        calls: RefCell<Vec<(PathBuf, PathBuf, PathBuf, Vec<String>)>>,
    }

    impl Generator for RecordingGenerator {
        fn generate(
            &self,
            transformation_file: &Path,
            base_dir: &Path,
            destination: &Path,
            args: &[String],
        ) -> Result<(), GenerateError> {
            self.calls.borrow_mut().push((
                transformation_file.to_path_buf(),
                base_dir.to_path_buf(),
                destination.to_path_buf(),
                args.to_vec(),
            ));
            Ok(())
        }
    }

    fn clean() -> ScriptedClient {
        ScriptedClient::new()
            .ok("is_inside_work_tree", "true")
            .ok("current_branch", "main")
            .ok("head_hash", "0123456789abcdef0123456789abcdef01234567")
            .ok("head_short_hash", "0123456")
            .ok("last_author_date", "2024-05-01T10:11:12")
            .empty("status_porcelain")
            .fail("describe", "fatal: No names found")
    }

    fn source(transformation: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("archetypes").join("http-handler");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("transformations-default.yaml"), transformation).unwrap();
        tmp
    }

    fn request(source: &Path) -> AddRequest {
        let cfg = Settings {
            archetype: "http-handler".into(),
            feature_name: Some("billing".into()),
            source_dir: Some(source.to_path_buf()),
            ..Settings::default()
        };
        AddRequest::from_settings(&cfg).unwrap()
    }

    #[test]
    fn request_collects_every_problem() {
        let cfg = Settings {
            archetype: String::new(),
            ..Settings::default()
        };
        let err = AddRequest::from_settings(&cfg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "archetype is required; source directory is required"
        );
    }

    #[test]
    fn feature_name_defaults_to_archetype() {
        let cfg = Settings {
            source_dir: Some(PathBuf::from("/src")),
            ..Settings::default()
        };
        let req = AddRequest::from_settings(&cfg).unwrap();
        assert_eq!(req.feature_name, "hello-world");
    }

    #[test]
    fn adds_feature_with_name_argument() {
        let src = source("inputs:\n  - id: feature_name\n    text: Feature?\n");
        let dest = TempDir::new().unwrap();
        let generator = RecordingGenerator::default();
        let mut out = Vec::new();

        add_feature(
            &request(src.path()),
            dest.path(),
            &clean(),
            &generator,
            &["--feature_name=x".to_string(), "--port".to_string(), "80".to_string()],
            &mut out,
        )
        .unwrap();

        let calls = generator.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (tf, base, to, args) = &calls[0];
        assert!(tf.ends_with("http-handler/transformations-default.yaml"));
        assert!(base.ends_with("archetypes/http-handler"));
        assert_eq!(to, dest.path());
        assert_eq!(args, &["--feature_name", "billing", "--port", "80"]);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("🌱 Adding 'billing' feature using 'http-handler' archetype.\n"));
        assert!(text.contains("📦 Using transformation file: "));
        assert!(text.ends_with("🎉 Feature 'billing' added.\n"));
    }

    #[test]
    fn name_argument_omitted_when_not_declared() {
        let src = source("inputs: []\n");
        let dest = TempDir::new().unwrap();
        let generator = RecordingGenerator::default();

        add_feature(
            &request(src.path()),
            dest.path(),
            &clean(),
            &generator,
            &[],
            &mut Vec::new(),
        )
        .unwrap();
        assert!(generator.calls.borrow()[0].3.is_empty());
    }

    #[test]
    fn dirty_tree_is_refused() {
        let src = source("inputs: []\n");
        let dest = TempDir::new().unwrap();
        let client = ScriptedClient::new()
            .ok("is_inside_work_tree", "true")
            .ok("current_branch", "main")
            .ok("head_hash", "0123456789abcdef0123456789abcdef01234567")
            .ok("head_short_hash", "0123456")
            .ok("last_author_date", "2024-05-01T10:11:12")
            .ok("status_porcelain", " M go.mod")
            .fail("describe", "fatal: No names found");
        let generator = RecordingGenerator::default();

        let err = add_feature(
            &request(src.path()),
            dest.path(),
            &client,
            &generator,
            &[],
            &mut Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "git repository is dirty");
        assert!(generator.calls.borrow().is_empty());
    }

    #[test]
    fn missing_transformation_stops_before_probing() {
        let src = source("inputs: []\n");
        let dest = TempDir::new().unwrap();
        let mut req = request(src.path());
        req.transformation = "chi".into();
        let client = ScriptedClient::new();

        let err = add_feature(
            &req,
            dest.path(),
            &client,
            &RecordingGenerator::default(),
            &[],
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("transformations-chi.yaml"), "{err:#}");
        assert!(client.calls().is_empty());
    }

    #[test]
    fn unknown_archetype() {
        let src = source("inputs: []\n");
        let mut req = request(src.path());
        req.archetype = "grpc".into();
        let err = add_feature(
            &req,
            Path::new("."),
            &ScriptedClient::new(),
            &RecordingGenerator::default(),
            &[],
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("grpc"), "{err:#}");
    }
}

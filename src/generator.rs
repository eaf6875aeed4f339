use log::{debug, info};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{program} not found in PATH")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

/// Applies a transformation file to an archetype and writes the result.
pub trait Generator {
    fn generate(
        &self,
        transformation_file: &Path,
        base_dir: &Path,
        destination: &Path,
        args: &[String],
    ) -> Result<(), GenerateError>;
}

/// [`Generator`] that runs an external executable:
///
/// ```text
/// <program> transform --transformations <file> --source <base> --destination <dest> -- <args…>
/// ```
///
/// Stdio is inherited so interactive prompts reach the user.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    program: OsString,
}

impl ProcessGenerator {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(
        &self,
        transformation_file: &Path,
        base_dir: &Path,
        destination: &Path,
        args: &[String],
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("transform")
            .arg("--transformations")
            .arg(transformation_file)
            .arg("--source")
            .arg(base_dir)
            .arg("--destination")
            .arg(destination)
            .arg("--")
            .args(args);
        cmd
    }
}

impl Generator for ProcessGenerator {
    fn generate(
        &self,
        transformation_file: &Path,
        base_dir: &Path,
        destination: &Path,
        args: &[String],
    ) -> Result<(), GenerateError> {
        let program = self.program.to_string_lossy().into_owned();
        let mut cmd = self.command(transformation_file, base_dir, destination, args);
        debug!("running {:?}", cmd);

        let status = cmd.status().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                GenerateError::NotFound {
                    program: program.clone(),
                }
            } else {
                GenerateError::Spawn {
                    program: program.clone(),
                    source,
                }
            }
        })?;

        if !status.success() {
            return Err(GenerateError::Failed {
                program,
                status: status.to_string(),
            });
        }
        info!("{} finished", program);
        Ok(())
    }
}

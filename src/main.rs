//! # rarchetype
//!
//! **rarchetype** scaffolds features into a project from archetypes.
//!
//! Features:
//! - `rarchetype add` overlays an archetype onto the current project
//! - `rarchetype list` shows the archetypes and transformations available
//! - `rarchetype status` prints the git state of the current directory
//!
//! Archetypes live in a source directory that is cloned or updated from a
//! git repository before use.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use rarchetype::{Overrides, Settings, cmd_add, cmd_environment, cmd_list, cmd_status};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "rarchetype",
    version,
    about = "rarchetype - scaffolding using archetypes",
    arg_required_else_help = true
)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Source directory to use
    #[arg(short = 's', long)]
    source_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Add a feature using an archetype
    Add {
        /// Feature name to add
        #[arg(short = 'f', long = "feature")]
        feature: Option<String>,
        /// Archetype to use
        #[arg(short, long)]
        archetype: Option<String>,
        /// Transformation to use
        #[arg(short, long)]
        transformation: Option<String>,
        #[command(flatten)]
        source: SourceArgs,
        /// Source repository to use
        #[arg(short = 'r', long)]
        source_repo: Option<String>,
        /// File that marks the project root
        #[arg(long)]
        project_marker: Option<String>,
        /// Arguments passed to the generator
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List available archetypes
    List {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Show the git status of the current directory
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    #[command(hide = true)]
    Environment,
}

impl Cmd {
    fn overrides(&self, verbose: bool) -> Overrides {
        let mut o = Overrides {
            verbose,
            ..Overrides::default()
        };
        match self {
            Cmd::Add {
                feature,
                archetype,
                transformation,
                source,
                source_repo,
                project_marker,
                ..
            } => {
                o.feature_name = feature.clone();
                o.archetype = archetype.clone();
                o.transformation = transformation.clone();
                o.source_dir = source.source_dir.clone();
                o.source_repo = source_repo.clone();
                o.project_marker = project_marker.clone();
            }
            Cmd::List { source } => o.source_dir = source.source_dir.clone(),
            Cmd::Status { .. } | Cmd::Environment => {}
        }
        o
    }
}

fn init_logging(verbose: u8, settings_verbose: bool) {
    let default = match verbose {
        0 if settings_verbose => "info",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default)).init();
}

fn try_main(cli: Cli) -> anyhow::Result<()> {
    let cfg = Settings::load(&cli.cmd.overrides(cli.verbose > 0))?;
    init_logging(cli.verbose, cfg.verbose);

    match cli.cmd {
        Cmd::Add { args, .. } => cmd_add(&cfg, &args),
        Cmd::List { .. } => cmd_list(&cfg),
        Cmd::Status { json } => cmd_status(&cfg, json),
        Cmd::Environment => cmd_environment(),
    }
}

/// CLI entry point.
///
/// Any error is printed as `💥 rarchetype error: …` and exits with status 1.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match try_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("💥 rarchetype error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

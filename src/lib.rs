//! Crate entry point for **rarchetype**.
//!
//! This library provides the internal implementation for the `rarchetype`
//! CLI, a tool for scaffolding features into a project from archetypes kept
//! in a git repository. Each submodule covers one responsibility (settings,
//! git operations, source synchronization, archetype layout, etc.).
//! The `pub use` re-exports make the commands accessible from the crate root.

mod add;
mod archetype;
mod config;
mod generator;
pub mod git;
mod list;
mod status;
mod sync;

pub use add::{AddRequest, add_feature, cmd_add};
pub use archetype::ArchetypeError;
pub use config::{ENV_PREFIX, Overrides, Settings, cmd_environment, environment_variables};
pub use generator::{GenerateError, Generator, ProcessGenerator};
pub use list::{cmd_list, write_listing};
pub use status::{Status, StatusError, StatusProbe, cmd_status, is_dirty};
pub use sync::{SourceConfig, SourceSynchronizer, SyncOutcome, ensure_source};

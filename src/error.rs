//! Error handling for tfscaffold.
//! Defines the error taxonomy shared by every generation phase and the result alias
//! used throughout the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a catalog, planning a run or writing its artifacts.
///
/// Catalog and planning errors are fatal to the whole run and are always raised
/// before anything touches the filesystem. `WriteFailure` is reported per artifact.
#[derive(Error, Debug)]
pub enum Error {
    /// A module or layer was declared without any template.
    #[error("{kind} '{id}' declares no templates")]
    EmptySpec { kind: &'static str, id: String },

    /// Two templates of one spec share a name.
    #[error("{kind} '{id}' declares template '{name}' more than once")]
    DuplicateTemplate {
        kind: &'static str,
        id: String,
        name: String,
    },

    /// An identifier that cannot be used as a single path component.
    #[error("invalid {kind} identifier '{id}'")]
    InvalidIdentifier { kind: &'static str, id: String },

    /// Environment profiles are keyed by id, so a repeated id is ambiguous.
    #[error("environment '{0}' is defined more than once")]
    DuplicateEnvironment(String),

    /// A declared layer variable that cannot be written to `terraform.tfvars`.
    #[error("layer '{layer}' cannot declare variable '{name}': {reason}")]
    InvalidLayerVariable {
        layer: String,
        name: String,
        reason: &'static str,
    },

    /// A template placeholder (or a declared layer variable) has no value in any source.
    #[error("unresolved variable '{key}' while rendering '{artifact}'")]
    UnresolvedVariable { key: String, artifact: String },

    /// A layer template references a declared layer variable, which only has a
    /// value per environment.
    #[error(
        "'{key}' is set per environment and cannot be substituted in '{artifact}'; \
         reference it as var.{key} instead"
    )]
    PerEnvironmentVariable { key: String, artifact: String },

    /// Engine placeholder delimiters collide with pass-through text.
    #[error("ambiguous placeholder '{fragment}' in '{artifact}'")]
    AmbiguousPlaceholder { artifact: String, fragment: String },

    /// Two planned artifacts map to the same output path.
    #[error("output path '{}' is produced by both {first} and {second}", path.display())]
    PathCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// Writing one artifact failed.
    #[error("failed to write '{}': {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A run was asked to continue after it already finished or failed.
    #[error("run is already {0} and cannot continue")]
    RunFinished(&'static str),

    /// The writing phase finished with at least one failed artifact.
    #[error("{failed} of {total} artifacts could not be written")]
    IncompleteRun { failed: usize, total: usize },

    /// Represents errors in catalog files or command-line overrides
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}.")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}.")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error chain to stderr and exits with status code 1
pub fn default_error_handler(err: anyhow::Error) {
    eprintln!("Error: {err:#}");
    std::process::exit(1);
}

//! tfscaffold generates the module, layer and per-environment files of a layered
//! Terraform repository from a declarative catalog.
//! The generated tree is always rewritten in full, so running it again against an
//! unchanged catalog reproduces the same bytes.

/// Modules, layers and environment profiles
pub mod catalog;

/// Command-line interface module for the tfscaffold binary
pub mod cli;

/// Common constants: file names, built-in defaults, reserved keys
pub mod constants;

/// Built-in `backend.conf` and `terraform.tfvars` artifacts
pub mod environment;

/// Error types and handling
pub mod error;

/// Run driver: planning, collision pre-flight and writing
pub mod generator;

/// Output paths derived from catalog identifiers
pub mod layout;

/// Catalog loading from JSON or YAML files
/// Supports catalog.json, catalog.yml, catalog.yaml
pub mod loader;

pub mod logger;

/// Writing artifacts to disk
pub mod materializer;

/// Placeholder substitution
pub mod renderer;

/// Merging variable sources per unit
pub mod variables;

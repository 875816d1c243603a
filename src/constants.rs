//! Common constants used throughout tfscaffold.

/// Catalog file names looked up when a directory is given instead of a file
pub const CATALOG_FILES: [&str; 3] = ["catalog.json", "catalog.yml", "catalog.yaml"];

/// Extension appended to template names that carry none
pub const DEFAULT_EXTENSION: &str = "tf";

/// Top-level output directories
pub const MODULES_DIR: &str = "modules";
pub const LAYERS_DIR: &str = "layers";
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Per-environment artifact file names
pub const BACKEND_FILE: &str = "backend.conf";
pub const TFVARS_FILE: &str = "terraform.tfvars";

/// Template name that is written as markdown rather than with the catalog extension
pub const README_TEMPLATE: &str = "README";

/// Values every unit starts from before any catalog source is applied.
pub const BUILTIN_DEFAULTS: [(&str, &str); 8] = [
    ("aws_region", "us-east-1"),
    ("project_name", "enterprise"),
    ("state_bucket", "terraform-state-${AWS_ACCOUNT_ID}"),
    ("lock_table_prefix", "terraform-state-lock"),
    ("tag_project", "enterprise-infrastructure"),
    ("managed_by", "terraform"),
    ("cost_center", "engineering"),
    ("owner", "platform-team"),
];

/// Keys derived from the unit being generated. They always win over catalog sources.
pub const RESERVED_KEYS: [&str; 9] = [
    "module",
    "module_upper",
    "module_title",
    "description",
    "layer",
    "layer_upper",
    "layer_title",
    "environment",
    "environment_upper",
];

/// Settings written to the general block of every `terraform.tfvars`
pub const TFVARS_GENERAL_KEYS: [&str; 3] = ["environment", "aws_region", "project_name"];

/// Tag map written at the end of every `terraform.tfvars`
pub const COMMON_TAGS_KEY: &str = "common_tags";

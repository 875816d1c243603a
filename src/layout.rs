//! Output tree layout.
//!
//! ```text
//! modules/<module-id>/<artifact>
//! layers/<layer-id>/<artifact>
//! layers/<layer-id>/environments/<env-id>/{backend.conf,terraform.tfvars}
//! ```
//!
//! Paths are pure functions of identifiers and artifact names.

use crate::constants::{ENVIRONMENTS_DIR, LAYERS_DIR, MODULES_DIR, README_TEMPLATE};
use std::path::PathBuf;

/// File name written for a template.
///
/// Names that already carry an extension are kept, `README` becomes `README.md`
/// and everything else gets the catalog extension.
pub fn artifact_file_name(template_name: &str, extension: &str) -> String {
    if template_name.contains('.') {
        template_name.to_string()
    } else if template_name == README_TEMPLATE {
        format!("{README_TEMPLATE}.md")
    } else {
        format!("{template_name}.{extension}")
    }
}

pub fn module_artifact_path(module_id: &str, template_name: &str, extension: &str) -> PathBuf {
    PathBuf::from(MODULES_DIR)
        .join(module_id)
        .join(artifact_file_name(template_name, extension))
}

pub fn layer_artifact_path(layer_id: &str, template_name: &str, extension: &str) -> PathBuf {
    PathBuf::from(LAYERS_DIR)
        .join(layer_id)
        .join(artifact_file_name(template_name, extension))
}

pub fn environment_artifact_path(layer_id: &str, environment_id: &str, file_name: &str) -> PathBuf {
    PathBuf::from(LAYERS_DIR)
        .join(layer_id)
        .join(ENVIRONMENTS_DIR)
        .join(environment_id)
        .join(file_name)
}

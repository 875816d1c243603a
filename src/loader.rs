//! Catalog file loading.
//! Reads a catalog from JSON or YAML and builds the [`CatalogIndex`] for a run.
//! Template bodies are either inline strings or files next to the catalog.

use crate::catalog::{CatalogIndex, EnvironmentProfile, LayerSpec, ModuleSpec, VariableMap};
use crate::constants::CATALOG_FILES;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A template body as written in the catalog file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TemplateBody {
    /// Body written inline
    Inline(String),
    /// Body read from a file, relative to the catalog file
    File { file: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleEntry {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    defaults: VariableMap,
    #[serde(default)]
    templates: IndexMap<String, TemplateBody>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayerEntry {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    defaults: VariableMap,
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default)]
    templates: IndexMap<String, TemplateBody>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    defaults: VariableMap,
    #[serde(default)]
    environments: IndexMap<String, VariableMap>,
    #[serde(default)]
    modules: Vec<ModuleEntry>,
    #[serde(default)]
    layers: Vec<LayerEntry>,
}

/// Finds the catalog file for `path`.
///
/// A file path is used as is. For a directory the first existing entry of
/// [`CATALOG_FILES`] is used.
///
/// # Errors
/// * `Error::ConfigError` if `path` is a directory without a catalog file
pub fn find_catalog<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    for file in CATALOG_FILES {
        let candidate = path.join(file);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::ConfigError(format!(
        "No catalog file found in {} (tried: {})",
        path.display(),
        CATALOG_FILES.join(", ")
    )))
}

/// Loads and validates the catalog at `path` (a file, or a directory holding one).
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<CatalogIndex> {
    let catalog_path = find_catalog(path)?;
    debug!("Loading catalog from {}", catalog_path.display());
    let content = fs::read_to_string(&catalog_path)?;
    let template_dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
    parse_catalog(&content, template_dir)
}

/// Parses catalog content. File templates are resolved against `template_dir`.
///
/// # Errors
/// * `Error::JsonError` for malformed content that starts like a JSON object
/// * `Error::YamlError` for any other malformed content
/// * `Error::ConfigError` for unreadable template files
/// * any validation error of the catalog model
pub fn parse_catalog(content: &str, template_dir: &Path) -> Result<CatalogIndex> {
    // Try parsing as JSON first
    let file: CatalogFile = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(json_err) => match serde_yaml::from_str(content) {
            Ok(v) => v,
            Err(_) if content.trim_start().starts_with('{') => return Err(json_err.into()),
            Err(yaml_err) => return Err(yaml_err.into()),
        },
    };

    let mut builder = CatalogIndex::builder().defaults(file.defaults);
    if let Some(extension) = file.extension {
        builder = builder.extension(extension);
    }

    for (id, values) in file.environments {
        builder = builder.environment(EnvironmentProfile::new(id, values)?);
    }

    for entry in file.modules {
        let templates = read_templates(entry.templates, template_dir)?;
        let module =
            ModuleSpec::new(entry.id, entry.description, templates)?.with_defaults(entry.defaults);
        builder = builder.module(module);
    }

    for entry in file.layers {
        let templates = read_templates(entry.templates, template_dir)?;
        let layer = LayerSpec::new(entry.id, templates)?
            .with_description(entry.description)
            .with_defaults(entry.defaults)
            .with_variables(entry.variables)?;
        builder = builder.layer(layer);
    }

    builder.build()
}

fn read_templates(
    templates: IndexMap<String, TemplateBody>,
    template_dir: &Path,
) -> Result<Vec<(String, String)>> {
    templates
        .into_iter()
        .map(|(name, body)| {
            let body = match body {
                TemplateBody::Inline(text) => text,
                TemplateBody::File { file } => {
                    let path = template_dir.join(&file);
                    fs::read_to_string(&path).map_err(|e| {
                        Error::ConfigError(format!(
                            "Cannot read template '{}': {e}",
                            path.display()
                        ))
                    })?
                }
            };
            Ok((name, body))
        })
        .collect()
}

/// Parses a `KEY=VALUE` override. The value is read as a YAML scalar or
/// collection (`30`, `true`, `[a, b]`) and falls back to a plain string.
pub fn parse_override(s: &str) -> Result<(String, serde_json::Value)> {
    let (key, raw) = s.split_once('=').ok_or_else(|| {
        Error::ConfigError(format!("Invalid override '{s}', expected KEY=VALUE"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::ConfigError(format!(
            "Invalid override '{s}', empty key"
        )));
    }
    let value = serde_yaml::from_str::<serde_json::Value>(raw)
        .ok()
        .filter(|v| !v.is_null() || raw.trim() == "null")
        .unwrap_or_else(|| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

//! Catalog model: modules, layers and environment profiles for one generation run.
//!
//! Every spec is validated when it is constructed and is immutable afterwards.
//! A [`CatalogIndex`] is assembled once per run through [`CatalogBuilder`] and is
//! only ever read from that point on.

use crate::constants::{COMMON_TAGS_KEY, DEFAULT_EXTENSION, TFVARS_GENERAL_KEYS};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;

/// Variable name to value mapping, kept in declaration order.
pub type VariableMap = IndexMap<String, serde_json::Value>;

/// Named artifact templates of one spec, in declaration order.
pub type TemplateMap = IndexMap<String, String>;

fn validate_identifier(kind: &'static str, id: &str) -> Result<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if id.is_empty() || id == "." || id == ".." || !valid_chars {
        return Err(Error::InvalidIdentifier {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// True for names HCL accepts as a bare attribute name.
pub(crate) fn is_hcl_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn collect_templates<I, N, B>(kind: &'static str, id: &str, templates: I) -> Result<TemplateMap>
where
    I: IntoIterator<Item = (N, B)>,
    N: Into<String>,
    B: Into<String>,
{
    let mut collected = TemplateMap::new();
    for (name, body) in templates {
        let name = name.into();
        validate_identifier("template", &name)?;
        if collected.contains_key(&name) {
            return Err(Error::DuplicateTemplate {
                kind,
                id: id.to_string(),
                name,
            });
        }
        collected.insert(name, body.into());
    }
    if collected.is_empty() {
        return Err(Error::EmptySpec {
            kind,
            id: id.to_string(),
        });
    }
    Ok(collected)
}

/// A reusable component generated once, independent of any environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSpec {
    id: String,
    description: String,
    templates: TemplateMap,
    defaults: VariableMap,
}

impl ModuleSpec {
    /// Creates a module spec.
    ///
    /// # Errors
    /// * `Error::InvalidIdentifier` if `id` or a template name is not a plain path component
    /// * `Error::DuplicateTemplate` if a template name repeats
    /// * `Error::EmptySpec` if `templates` is empty
    pub fn new<I, N, B>(
        id: impl Into<String>,
        description: impl Into<String>,
        templates: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<String>,
    {
        let id = id.into();
        validate_identifier("module", &id)?;
        let templates = collect_templates("module", &id, templates)?;
        Ok(Self {
            id,
            description: description.into(),
            templates,
            defaults: VariableMap::new(),
        })
    }

    /// Sets the module-level default variables.
    pub fn with_defaults(mut self, defaults: VariableMap) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn templates(&self) -> &TemplateMap {
        &self.templates
    }

    pub fn defaults(&self) -> &VariableMap {
        &self.defaults
    }
}

/// A logical infrastructure grouping, generated once plus once per environment.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    id: String,
    description: String,
    templates: TemplateMap,
    defaults: VariableMap,
    variables: Vec<String>,
}

impl LayerSpec {
    /// Creates a layer spec. Validation matches [`ModuleSpec::new`].
    pub fn new<I, N, B>(id: impl Into<String>, templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<String>,
    {
        let id = id.into();
        validate_identifier("layer", &id)?;
        let templates = collect_templates("layer", &id, templates)?;
        Ok(Self {
            id,
            description: String::new(),
            templates,
            defaults: VariableMap::new(),
            variables: Vec::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the layer-level default variables.
    pub fn with_defaults(mut self, defaults: VariableMap) -> Self {
        self.defaults = defaults;
        self
    }

    /// Declares the variables every environment must supply for this layer.
    /// They are emitted into the layer's `terraform.tfvars`. Repeated names are kept once.
    ///
    /// # Errors
    /// * `Error::InvalidLayerVariable` if a name is not an HCL identifier or is
    ///   one of the settings `terraform.tfvars` always writes
    pub fn with_variables<I, S>(mut self, variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables.clear();
        for name in variables {
            let name = name.into();
            let reason = if !is_hcl_identifier(&name) {
                Some("not an HCL identifier")
            } else if TFVARS_GENERAL_KEYS.contains(&name.as_str()) || name == COMMON_TAGS_KEY {
                Some("terraform.tfvars already sets it")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(Error::InvalidLayerVariable {
                    layer: self.id,
                    name,
                    reason,
                });
            }
            if !self.variables.contains(&name) {
                self.variables.push(name);
            }
        }
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn templates(&self) -> &TemplateMap {
        &self.templates
    }

    pub fn defaults(&self) -> &VariableMap {
        &self.defaults
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Concrete variable values for one environment. Profiles never inherit from each other.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentProfile {
    id: String,
    values: VariableMap,
}

impl EnvironmentProfile {
    pub fn new(id: impl Into<String>, values: VariableMap) -> Result<Self> {
        let id = id.into();
        validate_identifier("environment", &id)?;
        Ok(Self { id, values })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &VariableMap {
        &self.values
    }
}

/// Read-only catalog for one run. Listings are ordered by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogIndex {
    extension: String,
    defaults: VariableMap,
    modules: Vec<ModuleSpec>,
    layers: Vec<LayerSpec>,
    environments: Vec<EnvironmentProfile>,
}

impl CatalogIndex {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn modules(&self) -> &[ModuleSpec] {
        &self.modules
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn environments(&self) -> &[EnvironmentProfile] {
        &self.environments
    }

    pub fn environment(&self, id: &str) -> Option<&EnvironmentProfile> {
        self.environments.iter().find(|env| env.id == id)
    }

    /// Global default variables shared by every unit.
    pub fn defaults(&self) -> &VariableMap {
        &self.defaults
    }

    /// File extension given to templates whose name has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Collects specs and profiles, then freezes them into a [`CatalogIndex`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    extension: Option<String>,
    defaults: VariableMap,
    modules: Vec<ModuleSpec>,
    layers: Vec<LayerSpec>,
    environments: Vec<EnvironmentProfile>,
}

impl CatalogBuilder {
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn defaults(mut self, defaults: VariableMap) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn module(mut self, module: ModuleSpec) -> Self {
        self.modules.push(module);
        self
    }

    pub fn layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn environment(mut self, environment: EnvironmentProfile) -> Self {
        self.environments.push(environment);
        self
    }

    /// Validates and sorts the collected entries.
    ///
    /// Repeated module or layer identifiers are kept; they map to the same output
    /// paths and are rejected by the collision pre-flight of a run.
    ///
    /// # Errors
    /// * `Error::DuplicateEnvironment` if two profiles share an id
    /// * `Error::InvalidIdentifier` if the extension is not a plain path component
    pub fn build(self) -> Result<CatalogIndex> {
        let extension = match self.extension {
            Some(ext) => ext.trim_start_matches('.').to_string(),
            None => DEFAULT_EXTENSION.to_string(),
        };
        validate_identifier("extension", &extension)?;

        let mut modules = self.modules;
        let mut layers = self.layers;
        let mut environments = self.environments;
        modules.sort_by(|a, b| a.id.cmp(&b.id));
        layers.sort_by(|a, b| a.id.cmp(&b.id));
        environments.sort_by(|a, b| a.id.cmp(&b.id));

        if let Some(pair) = environments.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(Error::DuplicateEnvironment(pair[0].id.clone()));
        }

        debug!(
            "Catalog built with {} modules, {} layers, {} environments",
            modules.len(),
            layers.len(),
            environments.len()
        );

        Ok(CatalogIndex {
            extension,
            defaults: self.defaults,
            modules,
            layers,
            environments,
        })
    }
}

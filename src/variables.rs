//! Variable resolution.
//!
//! A unit's variables are folded from an ordered list of sources where the later
//! source wins on a key collision:
//!
//! 1. built-in defaults
//! 2. global catalog defaults
//! 3. the module or layer defaults
//! 4. the environment profile, for per-environment units
//! 5. explicit overrides supplied with the run
//! 6. unit identity (`layer`, `environment`, ...), which cannot be overridden

use crate::catalog::{
    is_hcl_identifier, CatalogIndex, EnvironmentProfile, LayerSpec, ModuleSpec, VariableMap,
};
use crate::constants::{BUILTIN_DEFAULTS, RESERVED_KEYS};
use crate::error::{Error, Result};
use cruet::Inflector;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::fmt;

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    Builtin,
    Global,
    Module(String),
    Layer(String),
    Environment(String),
    Override,
    Identity,
}

impl fmt::Display for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableSource::Builtin => write!(f, "built-in defaults"),
            VariableSource::Global => write!(f, "global defaults"),
            VariableSource::Module(id) => write!(f, "module '{id}'"),
            VariableSource::Layer(id) => write!(f, "layer '{id}'"),
            VariableSource::Environment(id) => write!(f, "environment '{id}'"),
            VariableSource::Override => write!(f, "overrides"),
            VariableSource::Identity => write!(f, "unit identity"),
        }
    }
}

/// A catalog entry that variables are resolved for.
#[derive(Debug, Clone, Copy)]
pub enum Unit<'a> {
    Module(&'a ModuleSpec),
    Layer(&'a LayerSpec),
}

impl<'a> Unit<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Unit::Module(module) => module.id(),
            Unit::Layer(layer) => layer.id(),
        }
    }

    fn defaults(&self) -> &'a VariableMap {
        match self {
            Unit::Module(module) => module.defaults(),
            Unit::Layer(layer) => layer.defaults(),
        }
    }

    fn source(&self) -> VariableSource {
        match self {
            Unit::Module(module) => VariableSource::Module(module.id().to_string()),
            Unit::Layer(layer) => VariableSource::Layer(layer.id().to_string()),
        }
    }
}

impl fmt::Display for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Module(module) => write!(f, "module '{}'", module.id()),
            Unit::Layer(layer) => write!(f, "layer '{}'", layer.id()),
        }
    }
}

/// The final variables of one unit, each with the source that supplied it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedVariableSet {
    entries: IndexMap<String, (Value, VariableSource)>,
}

impl ResolvedVariableSet {
    /// Applies one source on top of the current values.
    pub fn apply(&mut self, source: &VariableSource, values: &VariableMap) {
        for (key, value) in values {
            self.entries.insert(key.clone(), (value.clone(), source.clone()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|(value, _)| value)
    }

    pub fn source(&self, key: &str) -> Option<&VariableSource> {
        self.entries.get(key).map(|(_, source)| source)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Text substituted for `key` in a template.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(text_form)
    }

    /// Looks up a value that `artifact` cannot be produced without.
    ///
    /// # Errors
    /// * `Error::UnresolvedVariable` naming the key and the artifact
    pub fn require(&self, key: &str, artifact: &str) -> Result<&Value> {
        self.get(key).ok_or_else(|| Error::UnresolvedVariable {
            key: key.to_string(),
            artifact: artifact.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, (value, _))| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merges catalog sources into a [`ResolvedVariableSet`] per unit.
pub struct VariableResolver<'a> {
    catalog: &'a CatalogIndex,
    builtins: VariableMap,
    overrides: VariableMap,
}

impl<'a> VariableResolver<'a> {
    pub fn new(catalog: &'a CatalogIndex) -> Self {
        let builtins = BUILTIN_DEFAULTS
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        Self {
            catalog,
            builtins,
            overrides: VariableMap::new(),
        }
    }

    /// Sets the explicit overrides applied after every catalog source.
    pub fn with_overrides(mut self, overrides: VariableMap) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolves the variables of `unit`, optionally for one environment.
    ///
    /// Modules and the environment-independent layer templates pass `None`.
    pub fn resolve(
        &self,
        unit: Unit<'_>,
        environment: Option<&EnvironmentProfile>,
    ) -> ResolvedVariableSet {
        let mut sources: Vec<(VariableSource, &VariableMap)> = vec![
            (VariableSource::Builtin, &self.builtins),
            (VariableSource::Global, self.catalog.defaults()),
            (unit.source(), unit.defaults()),
        ];
        if let Some(env) = environment {
            sources.push((
                VariableSource::Environment(env.id().to_string()),
                env.values(),
            ));
        }
        sources.push((VariableSource::Override, &self.overrides));

        let mut resolved = ResolvedVariableSet::default();
        for (source, values) in &sources {
            resolved.apply(source, values);
        }

        let identity = identity_variables(unit, environment);
        for key in identity.keys() {
            if let Some(source) = resolved.source(key) {
                warn!("'{key}' from {source} is reserved and replaced for {unit}");
            }
        }
        resolved.apply(&VariableSource::Identity, &identity);

        debug!(
            "Resolved {} variables for {unit}{}",
            resolved.len(),
            environment.map(|env| format!(" in '{}'", env.id())).unwrap_or_default()
        );
        resolved
    }
}

fn identity_variables(unit: Unit<'_>, environment: Option<&EnvironmentProfile>) -> VariableMap {
    let mut identity = VariableMap::new();
    let mut insert = |key: &str, value: String| {
        debug_assert!(RESERVED_KEYS.contains(&key));
        identity.insert(key.to_string(), Value::String(value));
    };

    match unit {
        Unit::Module(module) => {
            insert("module", module.id().to_string());
            insert("module_upper", module.id().to_uppercase());
            insert("module_title", module.id().to_title_case());
            insert("description", module.description().to_string());
        }
        Unit::Layer(layer) => {
            insert("layer", layer.id().to_string());
            insert("layer_upper", layer.id().to_uppercase());
            insert("layer_title", layer.id().to_title_case());
            insert("description", layer.description().to_string());
        }
    }
    if let Some(env) = environment {
        insert("environment", env.id().to_string());
        insert("environment_upper", env.id().to_uppercase());
    }
    identity
}

/// Substitution text of a value: strings verbatim, everything else as an HCL literal.
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => hcl_literal(other),
    }
}

/// Formats a value as an HCL literal expression.
pub fn hcl_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(hcl_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{} = {}", object_key(key), hcl_literal(value)))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Bare identifiers stay bare, anything else is quoted.
pub(crate) fn object_key(key: &str) -> String {
    if is_hcl_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

//! Per-environment artifacts of a layer: `backend.conf` and `terraform.tfvars`.
//!
//! Both files are built in code rather than from a template, so every value goes
//! through [`hcl_literal`] and is quoted and escaped the same way.

use crate::catalog::LayerSpec;
use crate::constants::{COMMON_TAGS_KEY, TFVARS_GENERAL_KEYS};
use crate::error::{Error, Result};
use crate::variables::{hcl_literal, object_key, text_form, ResolvedVariableSet};
use indexmap::IndexMap;
use log::warn;
use serde_json::Value;
use std::fmt::Write;

const RULE: &str =
    "################################################################################";

/// Tag name and the variable holding its value. Every tfvars file carries all of them.
const REQUIRED_TAGS: [(&str, &str); 6] = [
    ("Environment", "environment"),
    ("Project", "tag_project"),
    ("ManagedBy", "managed_by"),
    ("Layer", "layer"),
    ("CostCenter", "cost_center"),
    ("Owner", "owner"),
];

/// Builds `backend.conf` for one (layer, environment) pair.
///
/// Writes `bucket`, `key`, `region`, `dynamodb_table` and `encrypt`, in that order.
///
/// # Errors
/// * `Error::UnresolvedVariable` for a missing backend setting
pub fn backend_conf(artifact: &str, variables: &ResolvedVariableSet) -> Result<String> {
    let require = |key: &str| variables.require(key, artifact);

    let layer = text_form(require("layer")?);
    let environment = text_form(require("environment")?);
    let state_key = Value::String(format!("layers/{layer}/{environment}/terraform.tfstate"));
    let lock_table = Value::String(format!(
        "{}-{environment}",
        text_form(require("lock_table_prefix")?)
    ));
    let encrypt = Value::Bool(true);

    let settings = [
        ("bucket", require("state_bucket")?),
        ("key", &state_key),
        ("region", require("aws_region")?),
        ("dynamodb_table", &lock_table),
        ("encrypt", &encrypt),
    ];

    let mut out = String::new();
    write_assignments(
        &mut out,
        settings
            .into_iter()
            .map(|(key, value)| Ok((key.to_string(), value))),
    )?;
    Ok(out)
}

/// Builds `terraform.tfvars` for one (layer, environment) pair.
///
/// Every variable the layer declares must resolve; its value is written as an
/// HCL literal. Entries of an optional `extra_tags` map follow the required tags.
///
/// # Errors
/// * `Error::UnresolvedVariable` for a missing general setting, tag or declared variable
/// * `Error::ConfigError` if `extra_tags` is not a map
pub fn terraform_tfvars(
    artifact: &str,
    layer: &LayerSpec,
    variables: &ResolvedVariableSet,
) -> Result<String> {
    let require = |key: &str| variables.require(key, artifact);

    let mut out = String::new();
    writeln!(out, "{RULE}").ok();
    writeln!(
        out,
        "# {} Layer - {} Environment Configuration",
        text_form(require("layer_title")?),
        text_form(require("environment_upper")?)
    )
    .ok();
    writeln!(out, "{RULE}").ok();

    out.push_str("\n# General Configuration\n");
    write_assignments(
        &mut out,
        TFVARS_GENERAL_KEYS
            .into_iter()
            .map(|key| Ok((key.to_string(), require(key)?))),
    )?;

    if !layer.variables().is_empty() {
        out.push_str("\n# Layer Inputs\n");
        write_assignments(
            &mut out,
            layer
                .variables()
                .iter()
                .map(|key| Ok((key.clone(), require(key.as_str())?))),
        )?;
    }

    let mut tags: IndexMap<String, &Value> = IndexMap::new();
    for (tag, key) in REQUIRED_TAGS {
        tags.insert(tag.to_string(), require(key)?);
    }
    match variables.get("extra_tags") {
        None => {}
        Some(Value::Object(extra)) => {
            for (tag, value) in extra {
                if tags.contains_key(tag) {
                    warn!("extra tag '{tag}' replaces a required tag in '{artifact}'");
                }
                tags.insert(tag.clone(), value);
            }
        }
        Some(other) => {
            return Err(Error::ConfigError(format!(
                "'extra_tags' must be a map, got {other} while rendering '{artifact}'"
            )));
        }
    }

    writeln!(out, "\n# Common Tags\n{COMMON_TAGS_KEY} = {{").ok();
    let keys: Vec<String> = tags.keys().map(|tag| object_key(tag)).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);
    for (key, value) in keys.iter().zip(tags.values()) {
        writeln!(out, "  {key:<width$} = {}", hcl_literal(value)).ok();
    }
    out.push_str("}\n");

    Ok(out)
}

fn write_assignments<'v, I>(out: &mut String, entries: I) -> Result<()>
where
    I: Iterator<Item = Result<(String, &'v Value)>>,
{
    let entries = entries.collect::<Result<Vec<_>>>()?;
    let width = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in entries {
        writeln!(out, "{key:<width$} = {}", hcl_literal(value)).ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableSource;
    use serde_json::json;

    fn variables(pairs: &[(&str, Value)]) -> ResolvedVariableSet {
        let mut vars = ResolvedVariableSet::default();
        let base = [
            ("layer", json!("database")),
            ("layer_title", json!("Database")),
            ("environment", json!("qa")),
            ("environment_upper", json!("QA")),
            ("aws_region", json!("us-east-1")),
            ("project_name", json!("enterprise")),
            ("state_bucket", json!("terraform-state-${AWS_ACCOUNT_ID}")),
            ("lock_table_prefix", json!("terraform-state-lock")),
            ("tag_project", json!("enterprise-infrastructure")),
            ("managed_by", json!("terraform")),
            ("cost_center", json!("engineering")),
            ("owner", json!("platform-team")),
        ];
        let map = base
            .iter()
            .chain(pairs)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        vars.apply(&VariableSource::Global, &map);
        vars
    }

    #[test]
    fn test_backend_conf_layout() {
        let out = backend_conf("backend.conf", &variables(&[])).unwrap();
        assert_eq!(
            out,
            "bucket         = \"terraform-state-${AWS_ACCOUNT_ID}\"\n\
             key            = \"layers/database/qa/terraform.tfstate\"\n\
             region         = \"us-east-1\"\n\
             dynamodb_table = \"terraform-state-lock-qa\"\n\
             encrypt        = true\n"
        );
    }

    #[test]
    fn test_backend_conf_escapes_values() {
        let vars = variables(&[
            ("state_bucket", json!("my\"bucket")),
            ("aws_region", json!(["eu-west-1"])),
        ]);
        let out = backend_conf("backend.conf", &vars).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "bucket         = \"my\\\"bucket\"");
        assert_eq!(lines[2], "region         = [\"eu-west-1\"]");
    }

    #[test]
    fn test_backend_conf_missing_setting() {
        let mut vars = ResolvedVariableSet::default();
        vars.apply(
            &VariableSource::Identity,
            &[
                ("layer".to_string(), json!("dns")),
                ("environment".to_string(), json!("dev")),
            ]
            .into_iter()
            .collect(),
        );
        let err = backend_conf("backend.conf", &vars).unwrap_err();
        assert!(matches!(err, Error::UnresolvedVariable { key, .. } if key == "lock_table_prefix"));
    }

    #[test]
    fn test_tfvars_layout() {
        let layer = LayerSpec::new("database", [("main", "")])
            .unwrap()
            .with_variables(["rds_instance", "multi_az"])
            .unwrap();
        let vars = variables(&[
            ("rds_instance", json!("db.t3.medium")),
            ("multi_az", json!(true)),
        ]);
        let out = terraform_tfvars("terraform.tfvars", &layer, &vars).unwrap();

        let expected = format!(
            "{RULE}\n# Database Layer - QA Environment Configuration\n{RULE}\n\
             \n# General Configuration\n\
             environment  = \"qa\"\n\
             aws_region   = \"us-east-1\"\n\
             project_name = \"enterprise\"\n\
             \n# Layer Inputs\n\
             rds_instance = \"db.t3.medium\"\n\
             multi_az     = true\n\
             \n# Common Tags\ncommon_tags = {{\n\
             \x20 Environment = \"qa\"\n\
             \x20 Project     = \"enterprise-infrastructure\"\n\
             \x20 ManagedBy   = \"terraform\"\n\
             \x20 Layer       = \"database\"\n\
             \x20 CostCenter  = \"engineering\"\n\
             \x20 Owner       = \"platform-team\"\n\
             }}\n"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tfvars_extra_tags_follow_required_tags() {
        let layer = LayerSpec::new("storage", [("main", "")]).unwrap();
        let vars = variables(&[("extra_tags", json!({"Compliance": "pci-dss"}))]);
        let out = terraform_tfvars("terraform.tfvars", &layer, &vars).unwrap();
        assert!(!out.contains("# Layer Inputs"));
        let owner = out.find("Owner").unwrap();
        let compliance = out.find("Compliance  = \"pci-dss\"").unwrap();
        assert!(owner < compliance);
    }

    #[test]
    fn test_tfvars_missing_declared_variable() {
        let layer = LayerSpec::new("database", [("main", "")])
            .unwrap()
            .with_variables(["instance_type"])
            .unwrap();
        let artifact = "layers/database/environments/qa/terraform.tfvars";
        let err = terraform_tfvars(artifact, &layer, &variables(&[])).unwrap_err();
        assert!(matches!(err, Error::UnresolvedVariable { key, .. } if key == "instance_type"));
    }

    #[test]
    fn test_tfvars_rejects_non_map_extra_tags() {
        let layer = LayerSpec::new("dns", [("main", "")]).unwrap();
        let vars = variables(&[("extra_tags", json!("pci"))]);
        let err = terraform_tfvars("terraform.tfvars", &layer, &vars).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}

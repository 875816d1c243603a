use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;
use tfscaffold::{
    catalog::{CatalogIndex, EnvironmentProfile, LayerSpec, ModuleSpec, VariableMap},
    error::Error,
    generator::{Generator, RunState},
    materializer::FileSystemMaterializer,
    renderer::PlaceholderRenderer,
};
use walkdir::WalkDir;

fn vars(pairs: &[(&str, serde_json::Value)]) -> VariableMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn profile(id: &str, pairs: &[(&str, serde_json::Value)]) -> EnvironmentProfile {
    EnvironmentProfile::new(id, vars(pairs)).unwrap()
}

fn database_catalog() -> CatalogIndex {
    let main = r#"module "rds" {
  source = "../../modules/rds"

  identifier = "${var.project_name}-${var.environment}-db"
  tags       = var.common_tags
}
"#;
    CatalogIndex::builder()
        .layer(
            LayerSpec::new("database", [("main", main), ("versions", "terraform {}\n")])
                .unwrap()
                .with_description("RDS and DynamoDB")
                .with_variables(["instance_type"])
                .unwrap(),
        )
        .environment(profile("dev", &[("instance_type", json!("db.t3.small"))]))
        .environment(profile("prod", &[("instance_type", json!("db.r5.xlarge"))]))
        .build()
        .unwrap()
}

fn enterprise_catalog() -> CatalogIndex {
    let module_main = "# {{module_upper}} Module - Main Configuration\n\
                       # Description: {{description}}\n\
                       # Resources: {{resources}}\n";
    let s3_templates = [
        ("main", module_main),
        ("README", "# {{module_title}} Module\n"),
    ];
    CatalogIndex::builder()
        .defaults(vars(&[
            ("retention", json!(7)),
            ("extra_tags", json!({"Compliance": "pci-dss"})),
        ]))
        .module(
            ModuleSpec::new("s3", "S3 buckets with policies", s3_templates)
                .unwrap()
                .with_defaults(vars(&[(
                    "resources",
                    json!(["aws_s3_bucket", "aws_s3_bucket_policy"]),
                )])),
        )
        .module(
            ModuleSpec::new("kms", "KMS encryption keys", [("main", module_main)])
                .unwrap()
                .with_defaults(vars(&[("resources", json!(["aws_kms_key"]))])),
        )
        .layer(
            LayerSpec::new("monitoring", [("main", "# retention {{retention}}\n")])
                .unwrap()
                .with_defaults(vars(&[("retention", json!(14))]))
                .with_variables(["retention", "multi_az"])
                .unwrap(),
        )
        .environment(profile("dev", &[("multi_az", json!(false))]))
        .environment(profile(
            "prod",
            &[
                ("multi_az", json!(true)),
                ("retention", json!(90)),
                ("vpc_cidr", json!("10.3.0.0/16")),
            ],
        ))
        .build()
        .unwrap()
}

fn generate(catalog: &CatalogIndex, output: &Path) -> Result<(), Error> {
    let renderer = PlaceholderRenderer::new();
    let mut generator = Generator::new(catalog, &renderer);
    generator
        .run(output, &mut FileSystemMaterializer::new())?
        .into_result()?;
    assert_eq!(generator.state(), RunState::Done);
    Ok(())
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

#[test_log::test]
fn test_database_layer_per_environment() {
    let temp_dir = TempDir::new().unwrap();
    generate(&database_catalog(), temp_dir.path()).unwrap();

    let env_dir = temp_dir.path().join("layers/database/environments");
    let dev_tfvars = fs::read_to_string(env_dir.join("dev/terraform.tfvars")).unwrap();
    let prod_tfvars = fs::read_to_string(env_dir.join("prod/terraform.tfvars")).unwrap();
    assert!(dev_tfvars.contains("instance_type = \"db.t3.small\""));
    assert!(prod_tfvars.contains("instance_type = \"db.r5.xlarge\""));
    assert!(dev_tfvars.starts_with(
        "################################################################################\n\
         # Database Layer - DEV Environment Configuration\n"
    ));
    let tags = [
        "Environment",
        "Project",
        "ManagedBy",
        "Layer",
        "CostCenter",
        "Owner",
    ];
    for tag in tags {
        assert!(
            prod_tfvars.contains(&format!("  {tag} ")),
            "missing tag {tag}"
        );
    }

    let dev_backend = fs::read_to_string(env_dir.join("dev/backend.conf")).unwrap();
    let prod_backend = fs::read_to_string(env_dir.join("prod/backend.conf")).unwrap();
    let keys: Vec<&str> = dev_backend
        .lines()
        .map(|line| line.split('=').next().unwrap().trim())
        .collect();
    assert_eq!(
        keys,
        ["bucket", "key", "region", "dynamodb_table", "encrypt"]
    );

    let differing: Vec<(&str, &str)> = dev_backend
        .lines()
        .zip(prod_backend.lines())
        .filter(|(dev, prod)| dev != prod)
        .collect();
    assert_eq!(
        differing,
        [
            (
                "key            = \"layers/database/dev/terraform.tfstate\"",
                "key            = \"layers/database/prod/terraform.tfstate\""
            ),
            (
                "dynamodb_table = \"terraform-state-lock-dev\"",
                "dynamodb_table = \"terraform-state-lock-prod\""
            ),
        ]
    );

    // pass-through interpolation reaches the layer file untouched
    let main = fs::read_to_string(temp_dir.path().join("layers/database/main.tf")).unwrap();
    assert!(main.contains("\"${var.project_name}-${var.environment}-db\""));
}

#[test]
fn test_merge_precedence_in_generated_files() {
    let temp_dir = TempDir::new().unwrap();
    generate(&enterprise_catalog(), temp_dir.path()).unwrap();

    let env_dir = temp_dir.path().join("layers/monitoring/environments");
    let prod = fs::read_to_string(env_dir.join("prod/terraform.tfvars")).unwrap();
    let dev = fs::read_to_string(env_dir.join("dev/terraform.tfvars")).unwrap();
    assert!(prod.contains("retention = 90"));
    assert!(prod.contains("multi_az  = true"));
    assert!(dev.contains("retention = 14"));
    assert!(dev.contains("  Compliance  = \"pci-dss\""));
    // unreferenced profile values are not an error and not emitted
    assert!(!prod.contains("vpc_cidr"));

    let layer_main = temp_dir.path().join("layers/monitoring/main.tf");
    assert_eq!(fs::read_to_string(layer_main).unwrap(), "# retention 14\n");

    let s3_main = fs::read_to_string(temp_dir.path().join("modules/s3/main.tf")).unwrap();
    assert_eq!(
        s3_main,
        "# S3 Module - Main Configuration\n# Description: S3 buckets with policies\n\
         # Resources: [\"aws_s3_bucket\", \"aws_s3_bucket_policy\"]\n"
    );
    assert!(temp_dir.path().join("modules/s3/README.md").exists());
    assert!(temp_dir.path().join("modules/kms/main.tf").exists());
}

#[test]
fn test_regeneration_is_byte_identical() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let catalog = enterprise_catalog();

    generate(&catalog, first.path()).unwrap();
    generate(&catalog, second.path()).unwrap();
    assert!(!dir_diff::is_different(first.path(), second.path()).unwrap());

    // running again over an existing tree reproduces it as well
    generate(&catalog, first.path()).unwrap();
    assert!(!dir_diff::is_different(first.path(), second.path()).unwrap());
}

#[test]
fn test_output_does_not_depend_on_declaration_order() {
    let forward = database_catalog();
    let reversed = CatalogIndex::builder()
        .environment(forward.environments()[1].clone())
        .environment(forward.environments()[0].clone())
        .layer(forward.layers()[0].clone())
        .build()
        .unwrap();

    let renderer = PlaceholderRenderer::new();
    let plan_a = Generator::new(&forward, &renderer).plan().unwrap();
    let plan_b = Generator::new(&reversed, &renderer).plan().unwrap();
    assert_eq!(plan_a, plan_b);
}

#[test]
fn test_regeneration_overwrites_manual_edits() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = database_catalog();
    generate(&catalog, temp_dir.path()).unwrap();

    let backend = temp_dir
        .path()
        .join("layers/database/environments/dev/backend.conf");
    let original = fs::read_to_string(&backend).unwrap();
    let edited = format!("{original}# manual edit, longer than the generated content\n");
    fs::write(&backend, edited).unwrap();

    generate(&catalog, temp_dir.path()).unwrap();
    assert_eq!(fs::read_to_string(&backend).unwrap(), original);
}

#[test]
fn test_backend_values_are_escaped() {
    let catalog = CatalogIndex::builder()
        .defaults(vars(&[("state_bucket", json!("my\"bucket"))]))
        .layer(LayerSpec::new("compute", [("main", "")]).unwrap())
        .environment(profile("dev", &[]))
        .build()
        .unwrap();

    let renderer = PlaceholderRenderer::new();
    let plan = Generator::new(&catalog, &renderer).plan().unwrap();
    let backend = plan
        .get(Path::new("layers/compute/environments/dev/backend.conf"))
        .unwrap();
    assert!(backend.text.starts_with("bucket         = \"my\\\"bucket\"\n"));
}

#[test]
fn test_layer_cannot_redeclare_tfvars_settings() {
    let err = LayerSpec::new("compute", [("main", "")])
        .unwrap()
        .with_variables(["instance_size", "common_tags"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidLayerVariable { ref name, .. } if name == "common_tags"));
}

#[test]
fn test_missing_variable_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = CatalogIndex::builder()
        .module(
            ModuleSpec::new("alb", "load balancer", [("main", "# ok\n")])
                .unwrap(),
        )
        .layer(
            LayerSpec::new("compute", [("main", "size = \"{{X}}\"\n")])
                .unwrap(),
        )
        .build()
        .unwrap();

    let err = generate(&catalog, temp_dir.path()).unwrap_err();
    match err {
        Error::UnresolvedVariable { key, artifact } => {
            assert_eq!(key, "X");
            assert!(artifact.contains("compute"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_files(temp_dir.path()), 0);
}

#[test]
fn test_per_environment_variable_in_layer_template() {
    let temp_dir = TempDir::new().unwrap();
    let main = "instance_class = \"{{instance_type}}\"\n";
    let catalog = CatalogIndex::builder()
        .layer(
            LayerSpec::new("database", [("main", main)])
                .unwrap()
                .with_variables(["instance_type"])
                .unwrap(),
        )
        .environment(profile("dev", &[("instance_type", json!("db.t3.small"))]))
        .environment(profile("prod", &[("instance_type", json!("db.r5.xlarge"))]))
        .build()
        .unwrap();

    let err = generate(&catalog, temp_dir.path()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "'instance_type' is set per environment and cannot be substituted in \
         'layers/database/main.tf'; reference it as var.instance_type instead"
    );
    assert_eq!(count_files(temp_dir.path()), 0);
}

#[test]
fn test_missing_declared_environment_variable_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = CatalogIndex::builder()
        .layer(
            LayerSpec::new("database", [("main", "")])
                .unwrap()
                .with_variables(["instance_type"])
                .unwrap(),
        )
        .environment(profile("dev", &[("instance_type", json!("db.t3.small"))]))
        .environment(profile("qa", &[]))
        .build()
        .unwrap();

    let err = generate(&catalog, temp_dir.path()).unwrap_err();
    match err {
        Error::UnresolvedVariable { key, artifact } => {
            assert_eq!(key, "instance_type");
            assert!(artifact.contains("qa"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_files(temp_dir.path()), 0);
}

#[test]
fn test_path_collision_aborts_before_writing() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = CatalogIndex::builder()
        .module(
            ModuleSpec::new("alb", "load balancer", [("main", "# alb\n")])
                .unwrap(),
        )
        .module(
            ModuleSpec::new("foo", "first", [("main", "# one\n")])
                .unwrap(),
        )
        .module(
            ModuleSpec::new("foo", "second", [("main", "# two\n")])
                .unwrap(),
        )
        .build()
        .unwrap();

    let err = generate(&catalog, temp_dir.path()).unwrap_err();
    match err {
        Error::PathCollision { path, .. } => assert_eq!(path, Path::new("modules/foo/main.tf")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_files(temp_dir.path()), 0);
}

#[test]
fn test_template_names_mapping_to_one_file_collide() {
    let templates = [("main", "a"), ("main.tf", "b")];
    let catalog = CatalogIndex::builder()
        .module(ModuleSpec::new("vpc", "network", templates).unwrap())
        .build()
        .unwrap();
    let renderer = PlaceholderRenderer::new();
    let err = Generator::new(&catalog, &renderer).plan().unwrap_err();
    assert!(matches!(err, Error::PathCollision { .. }));
}

#[test]
fn test_ambiguous_placeholder_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let main = "name = \"${{module}}\"\n";
    let catalog = CatalogIndex::builder()
        .module(ModuleSpec::new("iam", "roles", [("main", main)]).unwrap())
        .build()
        .unwrap();

    let err = generate(&catalog, temp_dir.path()).unwrap_err();
    assert!(matches!(err, Error::AmbiguousPlaceholder { .. }));
    assert_eq!(count_files(temp_dir.path()), 0);
}

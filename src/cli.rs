//! Command-line interface implementation for tfscaffold.
//! Provides argument parsing and help text formatting using clap.

use crate::loader::parse_override;
use clap::{error::ErrorKind, CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments structure for tfscaffold.
#[derive(Parser, Debug)]
#[command(author, version, about = "tfscaffold: generate multi-environment Terraform trees from a catalog", long_about = None)]
pub struct Args {
    /// Catalog file (JSON or YAML), or a directory containing catalog.{json,yml,yaml}
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// Directory the tree is generated into. Existing generated files are overwritten.
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Override a variable for every unit, e.g. --set aws_region=eu-west-1.
    /// Applied after global, unit and environment values.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, serde_json::Value)>,

    /// Plan and list the artifacts without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}

//! tfscaffold's entry point.
//! Loads the catalog, plans the run and writes the generated tree.

use anyhow::Context;
use tfscaffold::{
    catalog::VariableMap,
    cli::{get_args, Args},
    error::default_error_handler,
    generator::Generator,
    loader::load_catalog,
    logger::init_logger,
    materializer::FileSystemMaterializer,
    renderer::PlaceholderRenderer,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Loads and validates the catalog
/// 2. Plans every artifact in memory (nothing is written if this fails)
/// 3. Lists the plan and stops when `--dry-run` is set
/// 4. Writes every artifact, reporting each success and failure
fn run(args: Args) -> anyhow::Result<()> {
    let catalog = load_catalog(&args.catalog)
        .with_context(|| format!("failed to load catalog '{}'", args.catalog.display()))?;

    let renderer = PlaceholderRenderer::new();
    let overrides: VariableMap = args.overrides.into_iter().collect();
    let mut generator = Generator::new(&catalog, &renderer).with_overrides(overrides);

    let plan = generator.plan().context("planning failed, nothing was written")?;

    if args.dry_run {
        for artifact in plan.artifacts() {
            println!("plan: '{}'", args.output_dir.join(&artifact.path).display());
        }
        println!("{} artifacts planned, nothing written.", plan.len());
        return Ok(());
    }

    let mut materializer = FileSystemMaterializer::new();
    let report = generator.write(&plan, &args.output_dir, &mut materializer)?;
    for path in &report.written {
        println!("write: '{}'", args.output_dir.join(path).display());
    }
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
    report.into_result().with_context(|| {
        format!(
            "generation into '{}' is incomplete; fix the cause and run again",
            args.output_dir.display()
        )
    })?;

    println!(
        "Generation completed successfully in {}.",
        args.output_dir.display()
    );
    Ok(())
}

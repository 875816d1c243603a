//! Run driver: turns a catalog into a written tree.
//!
//! A run goes through `Planning -> Writing -> Done`. Planning resolves and renders
//! every artifact in memory and checks the whole set for path collisions; any
//! error there fails the run before the filesystem is touched. Writing then
//! materializes the plan artifact by artifact. A failed write is recorded and the
//! remaining artifacts are still written; nothing is rolled back, and re-running
//! the generator after fixing the cause rewrites the whole tree.

use crate::catalog::{CatalogIndex, LayerSpec, VariableMap};
use crate::constants::{BACKEND_FILE, TFVARS_FILE};
use crate::environment::{backend_conf, terraform_tfvars};
use crate::error::{Error, Result};
use crate::layout::{environment_artifact_path, layer_artifact_path, module_artifact_path};
use crate::materializer::{check_collisions, GeneratedArtifact, Materializer};
use crate::renderer::TemplateRenderer;
use crate::variables::{ResolvedVariableSet, Unit, VariableResolver};
use log::{debug, error, info};
use std::path::{Path, PathBuf};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planning,
    Writing,
    Done,
    Failed,
}

/// Every artifact of a run, rendered and collision-checked, in write order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Plan {
    artifacts: Vec<GeneratedArtifact>,
}

impl Plan {
    pub fn artifacts(&self) -> &[GeneratedArtifact] {
        &self.artifacts
    }

    pub fn get(&self, path: &Path) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|artifact| artifact.path == path)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Outcome of the writing phase.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Relative paths written successfully, in write order
    pub written: Vec<PathBuf>,
    /// One `Error::WriteFailure` per artifact that could not be written
    pub failures: Vec<Error>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.failures.len()
    }

    /// Converts a report with failures into `Error::IncompleteRun`.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::IncompleteRun {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }
}

/// Drives one generation run over a read-only catalog.
///
/// `Done` and `Failed` are terminal: a generator is used for a single run.
pub struct Generator<'a> {
    catalog: &'a CatalogIndex,
    renderer: &'a dyn TemplateRenderer,
    resolver: VariableResolver<'a>,
    state: RunState,
}

impl<'a> Generator<'a> {
    pub fn new(catalog: &'a CatalogIndex, renderer: &'a dyn TemplateRenderer) -> Self {
        Self {
            catalog,
            renderer,
            resolver: VariableResolver::new(catalog),
            state: RunState::Planning,
        }
    }

    /// Sets explicit overrides, applied after every catalog source.
    pub fn with_overrides(mut self, overrides: VariableMap) -> Self {
        self.resolver = VariableResolver::new(self.catalog).with_overrides(overrides);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn ensure_planning(&self) -> Result<()> {
        match self.state {
            RunState::Planning => Ok(()),
            RunState::Writing => Err(Error::RunFinished("writing")),
            RunState::Done => Err(Error::RunFinished("done")),
            RunState::Failed => Err(Error::RunFinished("failed")),
        }
    }

    /// Resolves and renders every artifact, then checks the set for collisions.
    ///
    /// # Errors
    /// * `Error::RunFinished` once the run is `Done` or `Failed`
    /// * any resolution, render or collision error. The run is then `Failed` and
    ///   nothing has been written.
    pub fn plan(&mut self) -> Result<Plan> {
        self.ensure_planning()?;
        match self.build_plan() {
            Ok(plan) => {
                info!("Planned {} artifacts", plan.len());
                Ok(plan)
            }
            Err(err) => {
                self.transition(RunState::Failed);
                Err(err)
            }
        }
    }

    fn build_plan(&self) -> Result<Plan> {
        let extension = self.catalog.extension();
        let mut artifacts = Vec::new();

        for module in self.catalog.modules() {
            let unit = Unit::Module(module);
            let variables = self.resolver.resolve(unit, None);
            for (name, body) in module.templates() {
                let path = module_artifact_path(module.id(), name, extension);
                artifacts.push(self.render(path, body, &variables, unit.to_string())?);
            }
        }

        for layer in self.catalog.layers() {
            let unit = Unit::Layer(layer);
            let variables = self.resolver.resolve(unit, None);
            for (name, body) in layer.templates() {
                let path = layer_artifact_path(layer.id(), name, extension);
                let artifact = self
                    .render(path, body, &variables, unit.to_string())
                    .map_err(|err| per_environment(layer, err))?;
                artifacts.push(artifact);
            }

            for environment in self.catalog.environments() {
                let variables = self.resolver.resolve(unit, Some(environment));
                let label = format!("{unit} in '{}'", environment.id());

                let path = environment_artifact_path(layer.id(), environment.id(), BACKEND_FILE);
                let text = backend_conf(&path.display().to_string(), &variables)?;
                artifacts.push(GeneratedArtifact {
                    path,
                    text,
                    unit: label.clone(),
                });

                let path = environment_artifact_path(layer.id(), environment.id(), TFVARS_FILE);
                let text = terraform_tfvars(&path.display().to_string(), layer, &variables)?;
                artifacts.push(GeneratedArtifact {
                    path,
                    text,
                    unit: label,
                });
            }
        }

        check_collisions(&artifacts)?;
        Ok(Plan { artifacts })
    }

    fn render(
        &self,
        path: PathBuf,
        body: &str,
        variables: &ResolvedVariableSet,
        unit: String,
    ) -> Result<GeneratedArtifact> {
        let text = self
            .renderer
            .render(&path.display().to_string(), body, variables)?;
        Ok(GeneratedArtifact { path, text, unit })
    }

    /// Writes every planned artifact under `base_dir`.
    ///
    /// Failed writes are collected in the report and do not stop the others.
    ///
    /// # Errors
    /// * `Error::RunFinished` if planning failed or the plan was already written
    pub fn write(
        &mut self,
        plan: &Plan,
        base_dir: &Path,
        materializer: &mut dyn Materializer,
    ) -> Result<RunReport> {
        self.ensure_planning()?;
        self.transition(RunState::Writing);

        let mut report = RunReport::default();
        for artifact in plan.artifacts() {
            match materializer.materialize(base_dir, &artifact.path, &artifact.text) {
                Ok(()) => report.written.push(artifact.path.clone()),
                Err(err) => {
                    error!("{err}");
                    report.failures.push(err);
                }
            }
        }

        if report.is_success() {
            info!(
                "Wrote {} artifacts to {}",
                report.written.len(),
                base_dir.display()
            );
            self.transition(RunState::Done);
        } else {
            self.transition(RunState::Failed);
        }
        Ok(report)
    }

    /// Plans and writes in one call.
    ///
    /// # Errors
    /// Planning errors only; write failures are reported in the returned [`RunReport`].
    pub fn run(
        &mut self,
        base_dir: &Path,
        materializer: &mut dyn Materializer,
    ) -> Result<RunReport> {
        let plan = self.plan()?;
        self.write(&plan, base_dir, materializer)
    }
}

/// Layer templates have no environment, so a declared layer variable can never
/// resolve there.
fn per_environment(layer: &LayerSpec, err: Error) -> Error {
    match err {
        Error::UnresolvedVariable { key, artifact } if layer.variables().contains(&key) => {
            Error::PerEnvironmentVariable { key, artifact }
        }
        other => other,
    }
}

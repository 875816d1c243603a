//! Writing planned artifacts to disk.
//!
//! Every artifact is written in full: intermediate directories are created as
//! needed and an existing file at the target path is truncated and replaced.
//! Manual edits to generated files are therefore lost on the next run.

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One rendered file, bound to its path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Path relative to the output directory
    pub path: PathBuf,
    /// Rendered file content
    pub text: String,
    /// Catalog unit that produced the artifact, e.g. `layer 'dns' in 'prod'`
    pub unit: String,
}

/// Destination for rendered artifacts.
pub trait Materializer {
    /// Writes `text` to `relative_path` under `base_dir`.
    ///
    /// # Errors
    /// * `Error::WriteFailure` naming the path that could not be written
    fn materialize(&mut self, base_dir: &Path, relative_path: &Path, text: &str) -> Result<()>;
}

/// Materializer backed by the local filesystem.
#[derive(Debug, Default)]
pub struct FileSystemMaterializer;

impl FileSystemMaterializer {
    pub fn new() -> Self {
        Self
    }
}

impl Materializer for FileSystemMaterializer {
    fn materialize(&mut self, base_dir: &Path, relative_path: &Path, text: &str) -> Result<()> {
        let target = base_dir.join(relative_path);
        let failure = |source| Error::WriteFailure {
            path: target.clone(),
            source,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(failure)?;
        }
        fs::write(&target, text).map_err(failure)?;
        debug!("Wrote {} ({} bytes)", target.display(), text.len());
        Ok(())
    }
}

/// Verifies that no two planned artifacts share an output path.
///
/// # Errors
/// * `Error::PathCollision` for the first repeated path, naming both units
pub fn check_collisions(artifacts: &[GeneratedArtifact]) -> Result<()> {
    let mut seen: HashMap<&Path, &str> = HashMap::with_capacity(artifacts.len());
    for artifact in artifacts {
        if let Some(first) = seen.insert(&artifact.path, &artifact.unit) {
            return Err(Error::PathCollision {
                path: artifact.path.clone(),
                first: first.to_string(),
                second: artifact.unit.clone(),
            });
        }
    }
    Ok(())
}

//! Target preparation.
//!
//! Before a tool runs, the target circuit is staged into a scratch directory
//! so analyzers that write artifacts next to their input (compiled R1CS,
//! witness files, solver dumps) never touch the original tree. Preparation is
//! a trait seam: the built-in preparer just copies the circuit, and tests
//! plug in their own.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("circuit '{0}' does not exist")]
    MissingCircuit(PathBuf),
    #[error("failed to stage '{path}': {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stages one target into a scratch directory and hands back the path the
/// tool should be pointed at.
pub trait TargetPreparer: Send + Sync {
    fn prepare(&self, circuit: &Path, scratch: &Path) -> Result<PathBuf, PrepareError>;
}

/// Copies the circuit file into the scratch directory under its own name.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPreparer;

impl TargetPreparer for CopyPreparer {
    fn prepare(&self, circuit: &Path, scratch: &Path) -> Result<PathBuf, PrepareError> {
        if !circuit.exists() {
            return Err(PrepareError::MissingCircuit(circuit.to_path_buf()));
        }
        let file_name = circuit.file_name().unwrap_or_else(|| "circuit".as_ref());
        let staged = scratch.join(file_name);
        fs::copy(circuit, &staged)
            .map_err(|source| PrepareError::Stage { path: staged.clone(), source })?;
        debug!(circuit = %circuit.display(), staged = %staged.display(), "staged target");
        Ok(staged)
    }
}

/// Scratch directory that removes itself (and everything the tool dumped
/// into it) when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<base>/<name>` fresh. An existing directory from a crashed
    /// earlier run is cleared first.
    pub fn create(base: &Path, name: &str) -> Result<Self, PrepareError> {
        let path = base.join(name);
        if path.exists() {
            fs::remove_dir_all(&path)
                .map_err(|source| PrepareError::Stage { path: path.clone(), source })?;
        }
        fs::create_dir_all(&path)
            .map_err(|source| PrepareError::Stage { path: path.clone(), source })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

//! Directory-scoped storage for run artifacts.
//!
//! Layout of a run directory:
//! - `rtl.sv`, `tb.sv`, `if.sv`: the three artifacts, overwritten in place
//! - `sim_output.vvp`: transient compiled simulation image
//! - `properly_finished.tag`: completion marker written at the end of a run
//!
//! The store offers no locking; each concurrent run must own its directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{Artifact, ArtifactKind, Result, VeriloopError};

/// File name of the compiled simulation image.
pub const SIMULATION_IMAGE: &str = "sim_output.vvp";

/// File name of the completion marker.
pub const COMPLETION_TAG: &str = "properly_finished.tag";

/// Read/write access to one run's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the artifact directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an artifact file.
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Path of a transient file inside the run directory.
    pub fn transient_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read an artifact's content.
    pub fn read(&self, kind: ArtifactKind) -> Result<String> {
        let path = self.path(kind);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VeriloopError::ArtifactNotFound { kind, path })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read an artifact into its typed form.
    pub fn load(&self, kind: ArtifactKind) -> Result<Artifact> {
        Ok(Artifact::new(kind, self.read(kind)?))
    }

    /// Overwrite an artifact.
    pub fn write(&self, kind: ArtifactKind, content: &str) -> Result<()> {
        let path = self.path(kind);
        std::fs::write(&path, content)?;
        debug!(artifact = %kind, path = %path.display(), bytes = content.len(), "artifact written");
        Ok(())
    }

    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_file()
    }

    /// Best-effort removal of a transient file. Never fails.
    pub fn delete_transient(&self, name: &str) {
        let path = self.transient_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "transient removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove transient"),
        }
    }

    /// Remove a completion marker left by an earlier run.
    pub fn clear_completion_tag(&self) {
        self.delete_transient(COMPLETION_TAG);
    }

    /// Write `1` on success, or `0` followed by a summary line.
    pub fn write_completion_tag(&self, success: bool, summary: &str) -> Result<PathBuf> {
        let path = self.transient_path(COMPLETION_TAG);
        let body = if success {
            "1".to_string()
        } else {
            format!("0\n{summary}")
        };
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

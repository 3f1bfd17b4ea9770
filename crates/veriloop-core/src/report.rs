//! Run report persistence.
//!
//! At the end of a run the artifact directory receives:
//! - `run_report.json`: the serialized [`LoopOutcome`]
//! - `run_report.digest`: sha256 hex of the JSON bytes
//! - `properly_finished.tag`: `1`, or `0` followed by the terminal reason

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::artifacts::ArtifactStore;
use crate::domain::{Result, VeriloopError};
use crate::orchestrator::LoopOutcome;

pub const REPORT_FILE: &str = "run_report.json";
pub const DIGEST_FILE: &str = "run_report.digest";

/// Lowercase hex sha256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write the report pair and the completion tag. Returns the report path.
pub fn write_run_report(outcome: &LoopOutcome, store: &ArtifactStore) -> Result<PathBuf> {
    let report_path = store.transient_path(REPORT_FILE);
    let digest_path = store.transient_path(DIGEST_FILE);
    let json = serde_json::to_vec_pretty(outcome)?;
    let digest = digest_hex(&json);

    std::fs::write(&report_path, &json)?;
    std::fs::write(&digest_path, digest.as_bytes())?;
    store.write_completion_tag(outcome.overall_success, &outcome.reason.to_string())?;

    Ok(report_path)
}

/// Read `run_report.json` from `dir` and verify it against its digest.
pub fn read_run_report(dir: &Path) -> Result<LoopOutcome> {
    let json = std::fs::read(dir.join(REPORT_FILE))?;
    let expected = std::fs::read_to_string(dir.join(DIGEST_FILE))?;
    let actual = digest_hex(&json);
    if expected.trim() != actual {
        return Err(VeriloopError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

//! The most recent report for each gate, kept as JSON under `.gatekeep/runs/`.

use crate::error::Result;
use crate::paths;
use crate::report::RunReport;
use std::path::Path;

pub fn save_last(root: &Path, report: &RunReport) -> Result<()> {
    paths::validate_gate_name(report.gate())?;
    let path = paths::last_run_path(root, report.gate());
    let data = serde_json::to_vec_pretty(report)?;
    crate::io::atomic_write(&path, &data)
}

/// `Ok(None)` if the gate has never been run (or its report was removed).
pub fn load_last(root: &Path, gate: &str) -> Result<Option<RunReport>> {
    paths::validate_gate_name(gate)?;
    let path = paths::last_run_path(root, gate);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

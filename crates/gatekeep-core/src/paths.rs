use crate::error::{GateError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const GATEKEEP_DIR: &str = ".gatekeep";
pub const CONFIG_FILE: &str = ".gatekeep/config.yaml";
pub const RUNS_DIR: &str = ".gatekeep/runs";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn runs_dir(root: &Path) -> PathBuf {
    root.join(RUNS_DIR)
}

pub fn last_run_path(root: &Path, gate: &str) -> PathBuf {
    runs_dir(root).join(format!("{gate}.json"))
}

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("valid gate name regex")
    })
}

/// Gate names double as file names under `.gatekeep/runs/`.
pub fn validate_gate_name(name: &str) -> Result<()> {
    if name_re().is_match(name) {
        Ok(())
    } else {
        Err(GateError::InvalidGateName(name.to_string()))
    }
}

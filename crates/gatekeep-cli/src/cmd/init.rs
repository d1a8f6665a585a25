use anyhow::Context;
use gatekeep_core::{config::GatesConfig, paths, GateError};
use std::path::Path;

pub fn run(root: &Path, force: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        return Err(GateError::AlreadyInitialized(paths::CONFIG_FILE.to_string()).into());
    }

    let config = GatesConfig::default();
    config.save(root).context("failed to write config")?;
    tracing::info!(path = %path.display(), "wrote default config");

    println!("Wrote {}", paths::CONFIG_FILE);
    println!("Gates: {}", config.gates.keys().cloned().collect::<Vec<_>>().join(", "));
    println!("Run a gate with: gatekeep run <gate>");
    Ok(())
}

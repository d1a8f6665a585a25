use crate::output::{print_json, print_table};
use anyhow::Context;
use gatekeep_core::config::GatesConfig;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = GatesConfig::load(root).context("failed to load config")?;

    if json {
        let gates: Vec<_> = config
            .gates
            .iter()
            .map(|(name, def)| {
                serde_json::json!({
                    "name": name,
                    "steps": def.steps.len(),
                    "description": def.description,
                    "required_vars": def.required_vars(),
                })
            })
            .collect();
        return print_json(&gates);
    }

    if config.gates.is_empty() {
        println!("No gates defined in .gatekeep/config.yaml");
        return Ok(());
    }

    let rows = config
        .gates
        .iter()
        .map(|(name, def)| {
            vec![
                name.clone(),
                def.steps.len().to_string(),
                def.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["GATE", "STEPS", "DESCRIPTION"], rows);
    Ok(())
}

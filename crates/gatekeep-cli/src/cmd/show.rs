use crate::output::print_json;
use anyhow::Context;
use gatekeep_core::config::GatesConfig;
use std::path::Path;

pub fn run(root: &Path, gate: &str, json: bool) -> anyhow::Result<()> {
    let config = GatesConfig::load(root).context("failed to load config")?;
    let def = config.definition(gate)?;

    if json {
        return print_json(&serde_json::json!({
            "name": gate,
            "definition": def,
            "required_vars": def.required_vars(),
        }));
    }

    println!("{gate}");
    if let Some(desc) = &def.description {
        println!("  {desc}");
    }
    for (k, v) in &def.vars {
        println!("  var {k} = {v}");
    }
    let required = def.required_vars();
    if !required.is_empty() {
        let list: Vec<_> = required.into_iter().collect();
        println!("  requires --var: {}", list.join(", "));
    }
    println!();
    for (i, step) in def.steps.iter().enumerate() {
        println!("{:>3}. {}", i + 1, step.name);
        println!("       run: {}", step.command.run);
        if let Some(fallback) = &step.fallback {
            println!("  fallback: {}", fallback.run);
        }
        if step.timeout_seconds > 0 {
            println!("   timeout: {}s", step.timeout_seconds);
        }
    }
    Ok(())
}

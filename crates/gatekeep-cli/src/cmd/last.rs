use crate::output::{print_json, print_table};
use anyhow::Context;
use gatekeep_core::history;
use std::path::Path;

pub fn run(root: &Path, gate: &str, json: bool) -> anyhow::Result<()> {
    let report = history::load_last(root, gate)
        .with_context(|| format!("failed to read last run of '{gate}'"))?;

    let Some(report) = report else {
        if json {
            print_json(&serde_json::Value::Null)?;
        } else {
            println!("No recorded run for '{gate}'.");
        }
        return Ok(());
    };

    if json {
        return print_json(&report);
    }

    let status = match report.halted_at() {
        None => "all passed".to_string(),
        Some(r) => format!("halted at step {} ({})", r.index, r.step),
    };
    println!(
        "{} at {}: {status} in {}ms",
        report.gate(),
        report.started_at().format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms()
    );
    println!();

    let rows = report
        .results()
        .iter()
        .map(|r| {
            vec![
                r.index.to_string(),
                r.step.clone(),
                r.outcome.to_string(),
                r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                if r.used_fallback { "yes" } else { "" }.to_string(),
                format!("{}ms", r.duration_ms),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "OUTCOME", "EXIT", "FALLBACK", "TIME"], rows);
    Ok(())
}

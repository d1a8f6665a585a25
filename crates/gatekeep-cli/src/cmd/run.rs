use crate::output::{print_indented, print_json};
use anyhow::Context;
use gatekeep_core::{
    config::GatesConfig, history, step::parse_vars, Gate, GateRunner, Progress, RunReport,
    StepOutcome,
};
use std::io::Write;
use std::path::Path;

pub struct RunOptions {
    pub vars: Vec<String>,
    pub dry_run: bool,
    pub verbose: bool,
    pub no_save: bool,
}

pub fn run(root: &Path, gate_name: &str, opts: RunOptions, json: bool) -> anyhow::Result<()> {
    let config = GatesConfig::load(root).context("failed to load config")?;
    let vars = parse_vars(opts.vars.as_slice())?;
    let gate = config
        .gate(gate_name, &vars)
        .with_context(|| format!("cannot run gate '{gate_name}'"))?;

    if opts.dry_run {
        return print_plan(&gate, json);
    }

    let runner = GateRunner::shell(root);
    let report = if json {
        runner.run(&gate)
    } else {
        let total = gate.len();
        runner.run_observed(&gate, |progress| print_progress(progress, total, opts.verbose))
    };

    if !opts.no_save {
        history::save_last(root, &report).context("failed to save run report")?;
    }

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }

    if let Some(halted) = report.halted_at() {
        anyhow::bail!(
            "gate '{}' halted at step {} ({})",
            report.gate(),
            halted.index,
            halted.step
        );
    }
    Ok(())
}

fn print_plan(gate: &Gate, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "gate": gate.name(),
            "steps": gate.steps(),
        }));
    }
    println!("Plan for '{}' (dry run, nothing executed):", gate.name());
    for (i, step) in gate.steps().iter().enumerate() {
        println!("  {}. {}: {}", i + 1, step.name, step.command.run);
        if let Some(fallback) = &step.fallback {
            println!("     else: {}", fallback.run);
        }
    }
    Ok(())
}

fn print_progress(progress: Progress<'_>, total: usize, verbose: bool) {
    match progress {
        Progress::Started { index, name } => {
            print!("[{index}/{total}] {name} ... ");
            let _ = std::io::stdout().flush();
        }
        Progress::Finished(result) => {
            let via = if result.used_fallback {
                " via fallback"
            } else {
                ""
            };
            println!("{}{via} ({}ms)", result.outcome, result.duration_ms);
            if verbose || result.outcome != StepOutcome::Passed {
                print_indented(&result.output);
            }
        }
    }
}

fn print_summary(report: &RunReport) {
    match report.halted_at() {
        None => println!(
            "✓ {}: all {} steps passed ({}ms)",
            report.gate(),
            report.results().len(),
            report.duration_ms()
        ),
        Some(r) => println!(
            "✗ {}: halted at step {} ({}), {}",
            report.gate(),
            r.index,
            r.step,
            r.outcome
        ),
    }
}

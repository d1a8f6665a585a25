use crate::exec::{Execution, Executor, ShellExecutor};
use crate::report::{RunReport, StepOutcome, StepResult};
use crate::step::{Gate, Step};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Emitted by [`GateRunner::run_observed`] around each step.
#[derive(Debug)]
pub enum Progress<'a> {
    Started { index: usize, name: &'a str },
    Finished(&'a StepResult),
}

/// Executes a gate's steps one at a time, in order, and stops at the first
/// step that does not pass.
///
/// There are no retries and nothing is undone: a failure is recorded and the
/// run ends.
pub struct GateRunner<E: Executor = ShellExecutor> {
    executor: E,
    cwd: PathBuf,
}

impl GateRunner<ShellExecutor> {
    pub fn shell(cwd: impl Into<PathBuf>) -> Self {
        Self::new(ShellExecutor::new(), cwd)
    }
}

impl<E: Executor> GateRunner<E> {
    pub fn new(executor: E, cwd: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            cwd: cwd.into(),
        }
    }

    pub fn run(&self, gate: &Gate) -> RunReport {
        self.run_observed(gate, |_| {})
    }

    pub fn run_observed<F>(&self, gate: &Gate, mut observe: F) -> RunReport
    where
        F: FnMut(Progress<'_>),
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(gate.len());

        tracing::info!(gate = gate.name(), steps = gate.len(), "running gate");

        for (i, step) in gate.steps().iter().enumerate() {
            let index = i + 1;
            observe(Progress::Started {
                index,
                name: &step.name,
            });

            let result = self.run_step(index, step);
            observe(Progress::Finished(&result));

            let passed = result.passed();
            results.push(result);
            if !passed {
                tracing::info!(gate = gate.name(), index, step = %step.name, "gate halted");
                break;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        RunReport::new(gate.name(), results, started_at, duration_ms)
    }

    fn run_step(&self, index: usize, step: &Step) -> StepResult {
        let timeout = match step.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        };
        let start = Instant::now();

        tracing::debug!(index, step = %step.name, command = %step.command.run, "starting step");
        let mut used_fallback = false;
        let mut execution = self.executor.execute(&step.command, &self.cwd, timeout);

        if let Execution::Unavailable { reason } = &execution {
            if let Some(fallback) = &step.fallback {
                tracing::warn!(
                    step = %step.name,
                    %reason,
                    fallback = %fallback.run,
                    "primary command unavailable, trying fallback"
                );
                used_fallback = true;
                execution = self.executor.execute(fallback, &self.cwd, timeout);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let (outcome, exit_code, output) = match execution {
            Execution::Completed {
                success: true,
                exit_code,
                output,
            } => (StepOutcome::Passed, exit_code, output),
            Execution::Completed {
                success: false,
                exit_code,
                output,
            } => (StepOutcome::Failed, exit_code, output),
            Execution::Unavailable { reason } => (StepOutcome::Skipped, None, reason),
        };

        tracing::debug!(index, step = %step.name, %outcome, duration_ms, "step finished");

        StepResult {
            index,
            step: step.name.clone(),
            outcome,
            output,
            used_fallback,
            exit_code,
            duration_ms,
        }
    }
}

/// Run `gate` with the shell executor, using `root` as the working directory.
pub fn run_gate(root: &Path, gate: &Gate) -> RunReport {
    GateRunner::shell(root).run(gate)
}

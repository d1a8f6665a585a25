use crate::error::GateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed,
    /// Neither the command nor its fallback could be started.
    Skipped,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Passed => "passed",
            StepOutcome::Failed => "failed",
            StepOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-indexed position of the step in its gate.
    pub index: usize,
    pub step: String,
    pub outcome: StepOutcome,
    pub output: String,
    /// True when the primary command was unavailable and the fallback ran.
    #[serde(default)]
    pub used_fallback: bool,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.outcome == StepOutcome::Passed
    }
}

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    AllPassed,
    /// 1-indexed position of the first step that did not pass.
    HaltedAtStep { index: usize },
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// The record of one gate execution.
///
/// The overall outcome is derived from the results when the report is built:
/// `AllPassed` iff every result passed, otherwise `HaltedAtStep(n)` for the
/// first result that did not. Results after `n` are discarded. Deserialized
/// reports go through the same constructor and are rejected if the stored
/// outcome disagrees with the stored results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRunReport")]
pub struct RunReport {
    gate: String,
    outcome: RunOutcome,
    results: Vec<StepResult>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

impl RunReport {
    pub fn new(
        gate: impl Into<String>,
        mut results: Vec<StepResult>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let outcome = match results.iter().position(|r| !r.passed()) {
            Some(pos) => {
                results.truncate(pos + 1);
                RunOutcome::HaltedAtStep { index: pos + 1 }
            }
            None => RunOutcome::AllPassed,
        };
        Self {
            gate: gate.into(),
            outcome,
            results,
            started_at,
            duration_ms,
        }
    }

    pub fn gate(&self) -> &str {
        &self.gate
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn all_passed(&self) -> bool {
        self.outcome == RunOutcome::AllPassed
    }

    /// The result that halted the run, if any.
    pub fn halted_at(&self) -> Option<&StepResult> {
        match self.outcome {
            RunOutcome::AllPassed => None,
            RunOutcome::HaltedAtStep { index } => {
                index.checked_sub(1).and_then(|i| self.results.get(i))
            }
        }
    }

    /// `Ok(())` if every step passed, otherwise the failing step as a
    /// [`GateError::StepFailed`].
    pub fn check(&self) -> Result<(), GateError> {
        match self.halted_at() {
            None => Ok(()),
            Some(r) => Err(GateError::StepFailed {
                index: r.index,
                step: r.step.clone(),
                output: r.output.clone(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct RawRunReport {
    gate: String,
    outcome: RunOutcome,
    results: Vec<StepResult>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

impl TryFrom<RawRunReport> for RunReport {
    type Error = String;

    fn try_from(raw: RawRunReport) -> Result<Self, Self::Error> {
        for (pos, r) in raw.results.iter().enumerate() {
            if r.index != pos + 1 {
                return Err(format!(
                    "result {} has index {}, expected {}",
                    pos + 1,
                    r.index,
                    pos + 1
                ));
            }
        }
        let stored = raw.results.len();
        let report = RunReport::new(raw.gate, raw.results, raw.started_at, raw.duration_ms);
        if report.outcome != raw.outcome {
            return Err(format!(
                "outcome {:?} does not match results ({:?})",
                raw.outcome, report.outcome
            ));
        }
        if report.results.len() != stored {
            return Err(format!(
                "{} results recorded after the halting step",
                stored - report.results.len()
            ));
        }
        Ok(report)
    }
}

pub mod config;
pub mod error;
pub mod exec;
pub mod history;
pub mod io;
pub mod paths;
pub mod report;
pub mod runner;
pub mod step;

pub use error::{GateError, Result};
pub use report::{RunOutcome, RunReport, StepOutcome, StepResult};
pub use runner::{run_gate, GateRunner, Progress};
pub use step::{Gate, Invocation, Step};

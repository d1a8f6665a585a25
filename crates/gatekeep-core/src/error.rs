use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("not initialized: run 'gatekeep init'")]
    NotInitialized,

    #[error("already initialized: {0} exists (use --force to overwrite)")]
    AlreadyInitialized(String),

    #[error("gate not found: {0}")]
    GateNotFound(String),

    #[error("invalid gate name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidGateName(String),

    #[error("gate '{0}' has no steps")]
    EmptyGate(String),

    #[error("gate '{gate}' has a step with an empty name at position {index}")]
    EmptyStepName { gate: String, index: usize },

    #[error("step '{step}' in gate '{gate}' has an empty command")]
    EmptyCommand { gate: String, step: String },

    #[error("step '{step}' appears more than once in gate '{gate}'")]
    DuplicateStep { gate: String, step: String },

    #[error("step '{step}' uses '{{{{{var}}}}}' but no value was given (pass --var {var}=...)")]
    MissingVariable { step: String, var: String },

    #[error("invalid variable '{0}': expected KEY=VALUE")]
    InvalidVariable(String),

    #[error("step {index} ({step}) failed{}", format_output(.output))]
    StepFailed {
        index: usize,
        step: String,
        output: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{output}")
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

use crate::error::{GateError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// `requires` entries with this prefix name a script that must be defined in
/// the working directory's `package.json`, e.g. `npm-script:lint`.
pub const NPM_SCRIPT_PREFIX: &str = "npm-script:";

/// Something that must hold before an invocation counts as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement<'a> {
    /// A program resolvable on `PATH`.
    Program(&'a str),
    /// A `scripts` entry in `package.json`.
    NpmScript(&'a str),
}

impl<'a> Requirement<'a> {
    pub fn parse(entry: &'a str) -> Self {
        match entry.strip_prefix(NPM_SCRIPT_PREFIX) {
            Some(script) => Requirement::NpmScript(script),
            None => Requirement::Program(entry),
        }
    }
}

/// A shell command plus what must be present for it to be considered
/// available.
///
/// In YAML an invocation may be a plain string (`run: npm test`) or a map
/// with an explicit `requires` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "InvocationRepr")]
pub struct Invocation {
    pub run: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InvocationRepr {
    Plain(String),
    Full {
        run: String,
        #[serde(default)]
        requires: Vec<String>,
    },
}

impl From<InvocationRepr> for Invocation {
    fn from(repr: InvocationRepr) -> Self {
        match repr {
            InvocationRepr::Plain(run) => Invocation {
                run,
                requires: Vec::new(),
            },
            InvocationRepr::Full { run, requires } => Invocation { run, requires },
        }
    }
}

impl Invocation {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            requires: Vec::new(),
        }
    }

    pub fn requiring(mut self, program: impl Into<String>) -> Self {
        self.requires.push(program.into());
        self
    }

    pub fn requirements(&self) -> impl Iterator<Item = Requirement<'_>> {
        self.requires.iter().map(|r| Requirement::parse(r))
    }

    /// Names of `{{placeholder}}` variables referenced by `run`, in order of
    /// first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for cap in placeholder_re().captures_iter(&self.run) {
            let name = cap[1].to_string();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Each placeholder expands to exactly one shell word: values are
    /// quoted, so templates must not wrap `{{var}}` in quotes themselves.
    fn substitute(&self, step: &str, vars: &BTreeMap<String, String>) -> Result<Invocation> {
        let mut missing = None;
        let run = placeholder_re().replace_all(&self.run, |cap: &regex::Captures<'_>| {
            match vars.get(&cap[1]) {
                Some(value) => shell_words::quote(value).into_owned(),
                None => {
                    missing.get_or_insert_with(|| cap[1].to_string());
                    String::new()
                }
            }
        });
        if let Some(var) = missing {
            return Err(GateError::MissingVariable {
                step: step.to_string(),
                var,
            });
        }
        Ok(Invocation {
            run: run.into_owned(),
            requires: self.requires.clone(),
        })
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}").expect("valid placeholder regex")
    })
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One named unit of work wrapping an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub name: String,
    pub command: Invocation,
    /// Tried only when `command` cannot be started at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Invocation>,
    /// `0` means wait indefinitely.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_seconds: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Step {
    pub fn new(name: impl Into<String>, command: Invocation) -> Self {
        Self {
            name: name.into(),
            command,
            fallback: None,
            timeout_seconds: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: Invocation) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    fn substitute(&self, vars: &BTreeMap<String, String>) -> Result<Step> {
        Ok(Step {
            name: self.name.clone(),
            command: self.command.substitute(&self.name, vars)?,
            fallback: self
                .fallback
                .as_ref()
                .map(|f| f.substitute(&self.name, vars))
                .transpose()?,
            timeout_seconds: self.timeout_seconds,
        })
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A validated, ordered, non-empty list of steps. The step list cannot be
/// changed after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    name: String,
    steps: Vec<Step>,
}

impl Gate {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self> {
        let name = name.into();
        validate_steps(&name, &steps)?;
        Ok(Self { name, steps })
    }

    /// Build a gate after replacing `{{var}}` placeholders in every command.
    pub fn with_vars(
        name: impl Into<String>,
        steps: &[Step],
        vars: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let resolved = steps
            .iter()
            .map(|s| s.substitute(vars))
            .collect::<Result<Vec<_>>>()?;
        Self::new(name, resolved)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub(crate) fn validate_steps(gate: &str, steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(GateError::EmptyGate(gate.to_string()));
    }
    let mut seen = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(GateError::EmptyStepName {
                gate: gate.to_string(),
                index: i + 1,
            });
        }
        if !seen.insert(step.name.as_str()) {
            return Err(GateError::DuplicateStep {
                gate: gate.to_string(),
                step: step.name.clone(),
            });
        }
        let blank_fallback = step
            .fallback
            .as_ref()
            .is_some_and(|f| f.run.trim().is_empty());
        if step.command.run.trim().is_empty() || blank_fallback {
            return Err(GateError::EmptyCommand {
                gate: gate.to_string(),
                step: step.name.clone(),
            });
        }
    }
    Ok(())
}

/// Parse `KEY=VALUE` pairs from the command line into a variable map.
pub fn parse_vars<S: AsRef<str>>(pairs: &[S]) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(GateError::InvalidVariable(pair.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(GateError::InvalidVariable(pair.to_string()));
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

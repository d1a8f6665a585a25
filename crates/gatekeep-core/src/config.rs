use crate::error::{GateError, Result};
use crate::paths;
use crate::step::{Gate, Invocation, Step, NPM_SCRIPT_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// GateDefinition
// ---------------------------------------------------------------------------

/// A named gate as written in `.gatekeep/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default values for `{{var}}` placeholders; `--var` overrides them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    pub steps: Vec<Step>,
}

impl GateDefinition {
    /// Placeholders used by any step that have no default value.
    pub fn required_vars(&self) -> BTreeSet<String> {
        self.placeholders()
            .into_iter()
            .filter(|v| !self.vars.contains_key(v))
            .collect()
    }

    fn placeholders(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|s| std::iter::once(&s.command).chain(s.fallback.as_ref()))
            .flat_map(Invocation::placeholders)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// GatesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatesConfig {
    #[serde(default)]
    pub gates: BTreeMap<String, GateDefinition>,
}

impl GatesConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(GateError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: GatesConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn definition(&self, name: &str) -> Result<&GateDefinition> {
        self.gates
            .get(name)
            .ok_or_else(|| GateError::GateNotFound(name.to_string()))
    }

    /// Resolve a gate by name into a runnable [`Gate`]. `overrides` take
    /// precedence over the definition's default vars.
    pub fn gate(&self, name: &str, overrides: &BTreeMap<String, String>) -> Result<Gate> {
        paths::validate_gate_name(name)?;
        let def = self.definition(name)?;
        let mut vars = def.vars.clone();
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Gate::with_vars(name, &def.steps, &vars)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.gates.is_empty() {
            warnings.push(ConfigWarning::warning("no gates defined".to_string()));
        }

        for (name, def) in &self.gates {
            if paths::validate_gate_name(name).is_err() {
                warnings.push(ConfigWarning::error(format!(
                    "gate name '{name}' must be lowercase alphanumeric with hyphens"
                )));
            }

            if def.steps.is_empty() {
                warnings.push(ConfigWarning::error(format!("gate '{name}' has no steps")));
            }

            let mut seen = HashSet::new();
            for (i, step) in def.steps.iter().enumerate() {
                if step.name.trim().is_empty() {
                    warnings.push(ConfigWarning::error(format!(
                        "gate '{name}': step {} has an empty name",
                        i + 1
                    )));
                } else if !seen.insert(step.name.as_str()) {
                    warnings.push(ConfigWarning::error(format!(
                        "gate '{name}': step '{}' is defined more than once",
                        step.name
                    )));
                }

                if step.command.run.trim().is_empty() {
                    warnings.push(ConfigWarning::error(format!(
                        "gate '{name}': step '{}' has an empty command",
                        step.name
                    )));
                }

                if let Some(fallback) = &step.fallback {
                    if fallback.run.trim().is_empty() {
                        warnings.push(ConfigWarning::error(format!(
                            "gate '{name}': step '{}' has an empty fallback",
                            step.name
                        )));
                    } else if fallback.run == step.command.run {
                        warnings.push(ConfigWarning::warning(format!(
                            "gate '{name}': step '{}' falls back to the same command",
                            step.name
                        )));
                    }
                }
            }

            let used = def.placeholders();
            for var in def.vars.keys().filter(|v| !used.contains(*v)) {
                warnings.push(ConfigWarning::warning(format!(
                    "gate '{name}': var '{var}' is never used"
                )));
            }
            for var in def.required_vars() {
                warnings.push(ConfigWarning::warning(format!(
                    "gate '{name}': '{{{{{var}}}}}' has no default; pass --var {var}=..."
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Default workflows
// ---------------------------------------------------------------------------

impl Default for GatesConfig {
    fn default() -> Self {
        let mut gates = BTreeMap::new();
        gates.insert("sync-main".to_string(), sync_main());
        gates.insert("start-task".to_string(), start_task());
        gates.insert("validate".to_string(), validate());
        gates.insert("complete-task".to_string(), complete_task());
        gates.insert("create-pr".to_string(), create_pr());
        Self { gates }
    }
}

fn git(run: &str) -> Invocation {
    Invocation::new(run).requiring("git")
}

/// `npm run <script>` when the project defines that script, otherwise the
/// locally installed tool run directly.
fn npm_step(script: &str, direct: &str) -> Step {
    let primary = Invocation::new(format!("npm run {script}"))
        .requiring("npm")
        .requiring(format!("{NPM_SCRIPT_PREFIX}{script}"));
    let direct = Invocation::new(format!("./node_modules/.bin/{direct}"));
    Step::new(script, primary).with_fallback(direct)
}

fn check_steps() -> Vec<Step> {
    vec![
        npm_step("typecheck", "tsc --noEmit"),
        npm_step("lint", "eslint ."),
        npm_step("test", "vitest run"),
    ]
}

fn base_vars() -> BTreeMap<String, String> {
    BTreeMap::from([("base".to_string(), "main".to_string())])
}

fn sync_main() -> GateDefinition {
    GateDefinition {
        description: Some("Bring the local base branch up to date with origin".to_string()),
        vars: base_vars(),
        steps: vec![
            Step::new("fetch", git("git fetch origin")),
            Step::new("checkout", git("git checkout {{base}}")),
            Step::new("pull", git("git pull --ff-only origin {{base}}")),
        ],
    }
}

fn start_task() -> GateDefinition {
    GateDefinition {
        description: Some("Start a task branch from a clean, current base".to_string()),
        vars: base_vars(),
        steps: vec![
            Step::new(
                "clean-tree",
                git("git diff --quiet && git diff --cached --quiet"),
            ),
            Step::new("fetch", git("git fetch origin")),
            Step::new("branch", git("git checkout -b {{branch}} origin/{{base}}")),
        ],
    }
}

fn validate() -> GateDefinition {
    let mut steps = check_steps();
    steps.push(npm_step("build", "tsc -p ."));
    GateDefinition {
        description: Some("Typecheck, lint, test and build".to_string()),
        vars: BTreeMap::new(),
        steps,
    }
}

fn complete_task() -> GateDefinition {
    let mut steps = check_steps();
    steps.push(Step::new("stage", git("git add -A")));
    steps.push(Step::new("commit", git("git commit -m {{message}}")));
    GateDefinition {
        description: Some("Re-run checks, then commit all changes".to_string()),
        vars: BTreeMap::new(),
        steps,
    }
}

fn create_pr() -> GateDefinition {
    GateDefinition {
        description: Some("Push the current branch and open a pull request".to_string()),
        vars: base_vars(),
        steps: vec![
            Step::new("push", git("git push -u origin HEAD")),
            Step::new(
                "open-pr",
                Invocation::new("gh pr create --fill --base {{base}}").requiring("gh"),
            ),
        ],
    }
}

//! Command execution for gate steps.
//!
//! The runner talks to the outside world only through [`Executor`], so tests
//! can script outcomes without spawning processes. [`ShellExecutor`] is the
//! real implementation: it runs `sh -c <run>` in a working directory, captures
//! stdout and stderr, and enforces an optional timeout.
//!
//! An invocation is *unavailable* (distinct from *unsuccessful*) when one of
//! its requirements does not hold (a program missing from `PATH`, or an npm
//! script missing from `package.json`), when the shell cannot be spawned, or
//! when the shell exits with 126/127 ("not executable" / "command not
//! found"). Only an unavailable primary triggers the step's fallback.
//!
//! Each command runs in its own process group so a timeout kills everything
//! it started, not just the shell.

use crate::step::{Invocation, Requirement};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Output beyond this many bytes is dropped from the front.
pub const MAX_OUTPUT: usize = 10 * 1024;

const EXIT_NOT_EXECUTABLE: i32 = 126;
const EXIT_NOT_FOUND: i32 = 127;

/// What happened when an invocation was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// The command ran to completion (or was killed on timeout).
    Completed {
        success: bool,
        exit_code: Option<i32>,
        output: String,
    },
    /// The command could not be started at all.
    Unavailable { reason: String },
}

pub trait Executor {
    fn execute(&self, invocation: &Invocation, cwd: &Path, timeout: Option<Duration>)
        -> Execution;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(
        &self,
        invocation: &Invocation,
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Execution {
        (**self).execute(invocation, cwd, timeout)
    }
}

// ---------------------------------------------------------------------------
// ShellExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different POSIX shell binary (e.g. `bash`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Executor for ShellExecutor {
    fn execute(
        &self,
        invocation: &Invocation,
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Execution {
        for requirement in invocation.requirements() {
            if let Err(reason) = check_requirement(requirement, cwd) {
                return Execution::Unavailable { reason };
            }
        }
        execute_shell(&self.shell, &invocation.run, cwd, timeout)
    }
}

fn check_requirement(requirement: Requirement<'_>, cwd: &Path) -> Result<(), String> {
    match requirement {
        Requirement::Program(program) => which::which(program)
            .map(|_| ())
            .map_err(|_| format!("required program '{program}' not found on PATH")),
        Requirement::NpmScript(script) => {
            let manifest = cwd.join("package.json");
            let data = std::fs::read_to_string(&manifest)
                .map_err(|e| format!("cannot read {}: {e}", manifest.display()))?;
            let pkg: serde_json::Value = serde_json::from_str(&data)
                .map_err(|e| format!("invalid {}: {e}", manifest.display()))?;
            if pkg["scripts"][script].is_string() {
                Ok(())
            } else {
                Err(format!("package.json defines no '{script}' script"))
            }
        }
    }
}

/// Run `command` through `shell -c`, with an optional timeout.
///
/// stdout and stderr are drained on dedicated threads so a chatty command
/// cannot fill a pipe buffer and block. A waiter thread with
/// `mpsc::recv_timeout` provides the timeout without polling.
fn execute_shell(shell: &str, command: &str, cwd: &Path, timeout: Option<Duration>) -> Execution {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // The shell leads a new group whose id equals its pid.
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return Execution::Unavailable {
                reason: format!("failed to spawn {shell}: {e}"),
            }
        }
    };

    let child_pid = child.id();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout_handle));
    let stderr_thread = std::thread::spawn(move || drain(stderr_handle));

    let wait_result = match timeout {
        None => child.wait(),
        Some(timeout_dur) => {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });

            match rx.recv_timeout(timeout_dur) {
                Ok(result) => result,
                Err(_) => {
                    // Readers see EOF once every process in the group is gone.
                    kill_process_group(child_pid);
                    let secs = timeout_dur.as_secs();
                    tracing::warn!(pid = child_pid, secs, "command timed out, killed");
                    return Execution::Completed {
                        success: false,
                        exit_code: None,
                        output: format!("timed out after {secs}s"),
                    };
                }
            }
        }
    };

    let stdout_buf = stdout_thread.join().unwrap_or_default();
    let stderr_buf = stderr_thread.join().unwrap_or_default();

    let status = match wait_result {
        Ok(s) => s,
        Err(e) => {
            return Execution::Completed {
                success: false,
                exit_code: None,
                output: format!("wait failed: {e}"),
            }
        }
    };

    let output = combine_output(&stdout_buf, &stderr_buf);
    match status.code() {
        Some(code @ (EXIT_NOT_EXECUTABLE | EXIT_NOT_FOUND)) => Execution::Unavailable {
            reason: if output.is_empty() {
                format!("{shell} exited with {code}")
            } else {
                output
            },
        },
        code => Execution::Completed {
            success: status.success(),
            exit_code: code,
            output,
        },
    }
}

fn drain<R: Read>(handle: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Join stdout and stderr, trim, and keep at most [`MAX_OUTPUT`] bytes from
/// the tail.
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    let trimmed = output.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// SIGKILL the process group led by `pid`. Best-effort.
fn kill_process_group(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// Process execution capability. The correlator only needs "run this
// shell command in this directory and give me the output", so that is
// the whole trait. Tests plug in stubs, and a timeout or async
// implementation can be swapped in without touching correlation logic.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::errors::RunError;

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

pub trait ProcessRunner {
    /// Run a shell command to completion, blocking the caller. A
    /// non-zero exit is not an Err; it is reported through
    /// `exit_code` / `stderr`. Err means the process never ran.
    fn execute(&self, command: &str, cwd: &Path) -> Result<ProcessOutput, RunError>;
}

/// Runs commands through `sh -c`. Blocking, no timeout: a hung runner
/// hangs the whole run operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    fn execute(&self, command: &str, cwd: &Path) -> Result<ProcessOutput, RunError> {
        debug!(command, cwd = %cwd.display(), "exec");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output()
            .map_err(|e| RunError::Spawn {
                command: command.to_string(),
                source: e,
            })?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Canned-output runner for tests: returns the queued outputs in order,
/// recording each command it was asked to run.
#[derive(Debug, Default)]
pub struct StubRunner {
    outputs: std::cell::RefCell<std::collections::VecDeque<ProcessOutput>>,
    pub commands: std::cell::RefCell<Vec<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, output: ProcessOutput) {
        self.outputs.borrow_mut().push_back(output);
    }

    /// Queue a plain stdout response with exit code 0 and empty stderr.
    pub fn push_stdout(&self, stdout: &str) {
        self.push_output(ProcessOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        });
    }
}

impl ProcessRunner for StubRunner {
    fn execute(&self, command: &str, _cwd: &Path) -> Result<ProcessOutput, RunError> {
        self.commands.borrow_mut().push(command.to_string());
        Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
    }
}

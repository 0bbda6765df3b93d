//! Blocking execution of external programs.
//!
//! Every call waits for the child to exit. A non-zero exit status is logged
//! as a warning and handed back to the caller; only failing to spawn the
//! program is an error.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{GogError, IoResultExt, Result};

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    /// Captured stdout (empty unless captured)
    pub stdout: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `program` with inherited stdio and wait for it.
pub fn run(program: &Path, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutcome> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    tracing::debug!(program = %program.display(), ?args, "running external command");

    let status = cmd.status().at(program)?;
    let outcome = CommandOutcome {
        code: status.code(),
        stdout: String::new(),
    };
    warn_on_failure(program, &outcome);
    Ok(outcome)
}

/// Run `program` capturing stdout; stderr is discarded.
pub fn run_captured(program: &Path, args: &[&str]) -> Result<CommandOutcome> {
    tracing::debug!(program = %program.display(), ?args, "running external command (captured)");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .at(program)?;

    let outcome = CommandOutcome {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    };
    warn_on_failure(program, &outcome);
    Ok(outcome)
}

fn warn_on_failure(program: &Path, outcome: &CommandOutcome) {
    if !outcome.success() {
        tracing::warn!(
            program = %program.display(),
            code = ?outcome.code,
            "external command exited with error"
        );
    }
}

/// Desktop opener for folders and files.
pub const OPENER: &str = "xdg-open";

/// Open `path` with the desktop's default application.
pub fn open_path(path: &Path) -> Result<CommandOutcome> {
    let opener = which::which(OPENER).map_err(|e| {
        GogError::io(
            OPENER,
            std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        )
    })?;
    let target = path.to_string_lossy();
    run(&opener, &[target.as_ref()], None)
}

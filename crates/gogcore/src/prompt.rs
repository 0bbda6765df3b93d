//! Yes/no confirmation channel.

use std::io::{BufRead, Write};

const YES: &[&str] = &["y", "yes", "1", "true"];
const NO: &[&str] = &["n", "no", "0", "false"];

/// Invalid answers tolerated before falling back to the default.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Asks the operator to confirm an action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Answers every question the same way (`--yes`, non-interactive runs).
#[derive(Debug, Clone, Copy)]
pub struct AutoAnswer(pub bool);

impl Confirm for AutoAnswer {
    fn confirm(&mut self, prompt: &str) -> bool {
        tracing::debug!(prompt, answer = self.0, "auto-answered confirmation");
        self.0
    }
}

/// Line-based prompt over any reader/writer pair, usually stdin/stderr.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    attempts: u32,
    default: bool,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            attempts: DEFAULT_ATTEMPTS,
            default: false,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    fn ask(&mut self, prompt: &str) -> std::io::Result<Option<bool>> {
        for _ in 0..self.attempts {
            write!(self.output, "{prompt} (y/n) ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim().to_lowercase();
            if YES.contains(&answer.as_str()) {
                return Ok(Some(true));
            }
            if NO.contains(&answer.as_str()) {
                return Ok(Some(false));
            }
            writeln!(self.output, "Invalid option: {answer}")?;
        }
        writeln!(self.output, "No choice was made.")?;
        Ok(None)
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        let answer = match self.ask(prompt) {
            Ok(answer) => answer.unwrap_or(self.default),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read confirmation");
                self.default
            }
        };
        tracing::debug!(prompt, answer, "user confirmation");
        answer
    }
}

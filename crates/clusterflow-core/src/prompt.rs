//! Operator confirmation for destructive actions

use crate::error::Result;
use std::io::{BufRead, Write};

/// Asks the operator a yes/no question
pub trait Confirm: Send + Sync {
    /// `true` only when the operator answered exactly `y`
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Reads the answer from stdin
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(is_yes(&input))
    }
}

/// Answers yes without asking (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

fn is_yes(input: &str) -> bool {
    input.trim_end_matches(['\r', '\n']) == "y"
}

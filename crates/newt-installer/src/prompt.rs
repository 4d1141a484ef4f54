//! Operator confirmation, behind a trait so tests never touch a TTY.

use std::io::IsTerminal;

/// Answers yes/no questions before the installer mutates the
/// filesystem.
pub trait Confirmer {
    /// Ask the operator; `false` cancels the operation.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive confirmation via dialoguer; answers `false` when stdin is
/// not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermConfirmer;

impl Confirmer for TermConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            return false;
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .unwrap_or(false)
    }
}

/// Unconditional yes, for `ask = false` paths and scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

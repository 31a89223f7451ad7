//! Console output for user-visible engine messages.

use colored::*;

/// Prints engine log lines with a recognizable prefix.
pub struct ConsoleLog;

impl ConsoleLog {
    pub fn new() -> Self {
        Self
    }

    /// A regular engine message.
    pub fn line(&self, message: &str) {
        println!("{} {}", "soir>".cyan().bold(), message);
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new()
    }
}

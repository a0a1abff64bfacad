use crate::lexer::ArgVector;
use crate::session::Session;
use anyhow::Result;
use rustyline::history::{History, SearchDirection};
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Read-only view of the command history kept by the line editor.
pub trait HistorySource {
    /// Recorded entries, oldest first.
    fn entries(&self) -> Vec<String>;
}

impl HistorySource for rustyline::history::DefaultHistory {
    fn entries(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|idx| self.get(idx, SearchDirection::Forward).ok().flatten())
            .map(|found| found.entry.into_owned())
            .collect()
    }
}

impl HistorySource for Vec<String> {
    fn entries(&self) -> Vec<String> {
        self.clone()
    }
}

/// Object-safe trait for any command the shell runs in-process.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// Regular output goes to `stdout`, diagnostics to `stderr`.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
        history: &dyn HistorySource,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a parsed command line.
///
/// Returns `None` when the factory doesn't recognize the command name.
pub trait CommandFactory {
    /// Attempt to create a command instance for `argv`.
    fn try_create(&self, argv: &ArgVector) -> Option<Box<dyn ExecutableCommand>>;
}

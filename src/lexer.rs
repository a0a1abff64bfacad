//! A module splitting a normalized command line into an argument vector.

use nix::unistd::{SysconfVar, sysconf};
use tracing::debug;

/// Ceiling used when the platform cannot report `ARG_MAX`.
pub const DEFAULT_ARG_MAX: usize = 4096;

/// Upper bound on the size of an [`ArgVector`], sentinel slot included.
///
/// A line never produces more than `max - 1` tokens. Anything past that is
/// dropped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgLimit(usize);

impl ArgLimit {
    /// Create a limit allowing `max - 1` tokens.
    pub fn new(max: usize) -> Self {
        Self(max)
    }

    /// Query `sysconf(_SC_ARG_MAX)`, falling back to [`DEFAULT_ARG_MAX`].
    pub fn from_system() -> Self {
        match sysconf(SysconfVar::ARG_MAX) {
            Ok(Some(max)) if max > 0 => Self(usize::try_from(max).unwrap_or(DEFAULT_ARG_MAX)),
            _ => Self(DEFAULT_ARG_MAX),
        }
    }

    /// Number of tokens a single line may yield.
    pub fn max_tokens(self) -> usize {
        self.0.saturating_sub(1)
    }
}

impl Default for ArgLimit {
    fn default() -> Self {
        Self(DEFAULT_ARG_MAX)
    }
}

/// The parsed, owned tokens of one command line.
///
/// Every token is an independent copy of the source text, so the vector stays
/// valid after the line it came from is gone. Reading one position past the
/// last token yields `None`, which plays the role of the terminating sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgVector {
    args: Vec<String>,
}

impl ArgVector {
    /// Number of tokens, not counting the sentinel.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Token at `index`, or `None` at and beyond the sentinel.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// The command name, i.e. the first token.
    pub fn command(&self) -> Option<&str> {
        self.get(0)
    }

    /// Tokens following the command name.
    pub fn operands(&self) -> Vec<&str> {
        self.args.iter().skip(1).map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(String::as_str)
    }

    /// Release every token together with the vector.
    pub fn release(self) {
        drop(self);
    }
}

/// Release a vector returned by [`split_into_args`]. `None` is a no-op.
pub fn release(argv: Option<ArgVector>) {
    if let Some(argv) = argv {
        argv.release();
    }
}

fn is_delimiter(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Split `line` on runs of spaces and tabs.
///
/// Returns `None` for an absent line or when memory for the vector or one of
/// its tokens cannot be reserved; whatever was built so far is released first.
/// An empty line yields an empty vector. Once `limit` is reached the rest of
/// the line is ignored.
pub fn split_into_args(line: Option<&str>, limit: ArgLimit) -> Option<ArgVector> {
    let line = line?;
    let max = limit.max_tokens();
    let mut tokens = line.split(is_delimiter).filter(|t| !t.is_empty());

    let wanted = tokens.clone().count();
    let mut args: Vec<String> = Vec::new();
    if args.try_reserve_exact(wanted.min(max)).is_err() {
        debug!(tokens = wanted, "failed to reserve argument vector");
        return None;
    }

    for token in tokens.by_ref().take(max) {
        let mut owned = String::new();
        if owned.try_reserve_exact(token.len()).is_err() {
            debug!(len = token.len(), "failed to reserve token");
            return None;
        }
        owned.push_str(token);
        args.push(owned);
    }

    if tokens.next().is_some() {
        debug!(max, "argument limit reached, ignoring the rest of the line");
    }

    Some(ArgVector { args })
}

//! Shell-wide state and the terminal/process-group setup around it.

use anyhow::{Context, Result};
use nix::sys::signal::{SigHandler, Signal, killpg, signal};
use nix::unistd::{Pid, getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Stdin};
use std::os::fd::{AsRawFd, RawFd};
use tracing::{debug, info};

/// Environment variable holding the prompt.
pub const PROMPT_VAR: &str = "MY_PROMPT";

/// Prompt used when [`PROMPT_VAR`] is unset or empty.
pub const DEFAULT_PROMPT: &str = "shell>";

/// Signals ignored by an interactive shell so keyboard shortcuts reach the
/// foreground job instead of the shell itself.
const JOB_CONTROL_SIGNALS: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// State owned by the read loop for the lifetime of the shell.
///
/// The prompt is present from construction until [`Session::destroy`].
#[derive(Debug)]
pub struct Session {
    prompt: Option<Cow<'static, str>>,
    terminal: Stdin,
    pgid: Pid,
    interactive: bool,
    should_exit: bool,
    /// Variables overriding the process environment; `None` hides a variable.
    vars: HashMap<String, Option<OsString>>,
}

impl Session {
    /// A session that leaves the terminal and signal dispositions untouched.
    pub fn new(prompt: impl Into<Cow<'static, str>>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            terminal: io::stdin(),
            pgid: getpgrp(),
            interactive: false,
            should_exit: false,
            vars: HashMap::new(),
        }
    }

    /// Build the session for this process.
    ///
    /// The prompt comes from [`PROMPT_VAR`]. When stdin is a terminal the
    /// shell also ignores job-control signals, moves into its own process
    /// group and takes the terminal foreground; failing to do so is fatal.
    pub fn initialize() -> Result<Self> {
        let prompt = resolve_prompt(env::var(PROMPT_VAR).ok());
        let mut session = Self::new(prompt);

        if session.terminal.is_terminal() {
            session.pgid = take_terminal(&session.terminal)?;
            session.interactive = true;
            info!(pgid = %session.pgid, "acquired terminal foreground");
        } else {
            debug!("stdin is not a terminal, skipping job control setup");
        }
        Ok(session)
    }

    /// The prompt, or `None` once the session has been destroyed.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Descriptor of the controlling terminal (standard input).
    pub fn terminal_fd(&self) -> RawFd {
        self.terminal.as_raw_fd()
    }

    /// The shell's own process group.
    pub fn process_group(&self) -> Pid {
        self.pgid
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Set once the session has been destroyed; the read loop stops here.
    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Value of an environment variable as seen by built-ins.
    ///
    /// Looks up overrides first, falling back to `std::env::var_os`.
    pub fn var(&self, key: &str) -> Option<OsString> {
        match self.vars.get(key) {
            Some(value) => value.clone(),
            None => env::var_os(key),
        }
    }

    /// Set or override a variable for this session only.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<OsString>) {
        self.vars.insert(key.into(), Some(val.into()));
    }

    /// Hide a variable from this session, whatever the process environment holds.
    pub fn unset_var(&mut self, key: impl Into<String>) {
        self.vars.insert(key.into(), None);
    }

    /// Release the prompt and mark the session finished.
    pub fn destroy(&mut self) {
        if self.prompt.take().is_some() {
            debug!("session destroyed");
        }
        self.should_exit = true;
    }
}

/// Pick the prompt from the value of [`PROMPT_VAR`].
pub fn resolve_prompt(value: Option<String>) -> Cow<'static, str> {
    match value {
        Some(prompt) if !prompt.is_empty() => Cow::Owned(prompt),
        _ => Cow::Borrowed(DEFAULT_PROMPT),
    }
}

fn ignore_job_control_signals() -> Result<()> {
    for sig in JOB_CONTROL_SIGNALS {
        // SAFETY: SigIgn installs no handler code, so nothing runs in signal context.
        unsafe { signal(sig, SigHandler::SigIgn) }
            .with_context(|| format!("failed to ignore {sig}"))?;
    }
    Ok(())
}

/// Wait for the foreground, then make our own process group the terminal's
/// foreground group. Returns that group id.
///
/// Fails when the shell is traced, since the tracer keeps the foreground.
fn take_terminal(terminal: &Stdin) -> Result<Pid> {
    loop {
        let foreground = tcgetpgrp(terminal).context("failed to query terminal foreground group")?;
        let own = getpgrp();
        if foreground == own {
            break;
        }
        // Stops us until the job is continued in the foreground.
        killpg(own, Signal::SIGTTIN).context("failed to wait for terminal foreground")?;
    }

    ignore_job_control_signals()?;

    let pid = getpid();
    if getpgrp() != pid {
        setpgid(pid, pid).context("failed to put the shell in its own process group")?;
    }
    tcsetpgrp(terminal, pid).context("failed to take control of the terminal")?;
    Ok(pid)
}

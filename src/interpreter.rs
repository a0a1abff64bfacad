use crate::command::{CommandFactory, ExitCode, HistorySource};
use crate::lexer::{self, ArgLimit, ArgVector};
use crate::line;
use crate::session::{DEFAULT_PROMPT, Session};
use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Number of history entries kept before the oldest are dropped.
const HISTORY_SIZE: usize = 1 << 20;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-in commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Result of handing a command line to the built-in dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A built-in ran and finished with this exit code.
    Handled(ExitCode),
    /// The line is empty or names a command that is not a built-in.
    NotHandled,
}

/// A minimal interactive shell: reads lines, splits them into arguments and
/// runs the built-ins it knows.
///
/// The interpreter owns the [`Session`] and a list of [`CommandFactory`] objects
/// queried by command name. See [`Default`] for the factories included out of
/// the box.
///
/// Example
/// ```
/// use lab_shell::{Dispatch, Interpreter, Session};
/// use lab_shell::lexer::{split_into_args, ArgLimit};
///
/// let mut sh = Interpreter::with_session(Session::new("$ "));
/// let argv = split_into_args(Some("exit"), ArgLimit::default()).unwrap();
/// let history: Vec<String> = Vec::new();
/// assert_eq!(sh.dispatch(&argv, &history).unwrap(), Dispatch::Handled(0));
/// assert!(sh.session().should_exit());
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
    limit: ArgLimit,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(session: Session, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            session,
            commands,
            limit: ArgLimit::default(),
        }
    }

    /// Create an interpreter with the default built-ins around `session`.
    pub fn with_session(session: Session) -> Self {
        use crate::builtin::*;
        Self::new(
            session,
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<History>::default()),
            ],
        )
    }

    /// Override the argument-count ceiling used when splitting lines.
    pub fn with_arg_limit(mut self, limit: ArgLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run `argv` if its first token names a built-in, writing to the process
    /// stdout and stderr.
    pub fn dispatch(
        &mut self,
        argv: &ArgVector,
        history: &dyn HistorySource,
    ) -> anyhow::Result<Dispatch> {
        self.dispatch_with_output(argv, history, &mut io::stdout(), &mut io::stderr())
    }

    /// Same as [`Interpreter::dispatch`] with caller-provided output streams.
    pub fn dispatch_with_output(
        &mut self,
        argv: &ArgVector,
        history: &dyn HistorySource,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> anyhow::Result<Dispatch> {
        if argv.is_empty() {
            return Ok(Dispatch::NotHandled);
        }
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(argv) {
                let code = cmd.execute(stdout, stderr, &mut self.session, history)?;
                debug!(command = argv.command(), code, "builtin finished");
                return Ok(Dispatch::Handled(code));
            }
        }
        Ok(Dispatch::NotHandled)
    }

    /// Read-Eval-Print Loop: runs until `exit` or end of input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl =
            DefaultEditor::with_config(editor_config()?).context("failed to start line editor")?;

        while !self.session.should_exit() {
            let prompt = self.session.prompt().unwrap_or(DEFAULT_PROMPT).to_owned();
            match rl.readline(&prompt) {
                Ok(raw) => {
                    let line = line::trim_line(Some(&raw));
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)
                        .context("failed to record history entry")?;

                    let Some(argv) = lexer::split_into_args(Some(line), self.limit) else {
                        warn!("failed to parse command line");
                        eprintln!("failed to parse command line");
                        continue;
                    };
                    if self.dispatch(&argv, rl.history())? == Dispatch::NotHandled {
                        let name = argv.command().unwrap_or_default();
                        debug!(command = name, "not a builtin");
                        eprintln!("{name}: command not found");
                    }
                    argv.release();
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("interrupted, discarding line");
                }
                Err(ReadlineError::Eof) => {
                    info!("end of input");
                    self.session.destroy();
                }
                Err(err) => return Err(err).context("failed to read line"),
            }
        }

        Ok(())
    }
}

/// Editor settings keeping every entered line, duplicates included.
fn editor_config() -> anyhow::Result<Config> {
    Ok(Config::builder()
        .max_history_size(HISTORY_SIZE)?
        .history_ignore_dups(false)?
        .history_ignore_space(false)
        .build())
}

impl Default for Interpreter {
    /// Create an interpreter over a non-interactive session with the default
    /// built-ins: `exit`, `cd`, `history`.
    fn default() -> Self {
        Self::with_session(Session::new(DEFAULT_PROMPT))
    }
}

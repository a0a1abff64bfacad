use crate::command::{CommandFactory, ExecutableCommand, ExitCode, HistorySource};
use crate::interpreter::Factory;
use crate::lexer::ArgVector;
use crate::session::Session;
use anyhow::{Context, Result, anyhow};
use nix::unistd::{Uid, User};
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Built-in commands known to the shell at compile time.
///
/// Builtins receive the operands of the command line exactly as tokenized,
/// with no option or help parsing, and run in-process without spawning a
/// child process.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "cd" or "exit".
    fn name() -> &'static str;

    /// Build the command from the tokens following its name.
    fn from_operands(operands: Vec<String>) -> Self;

    /// Executes the command against the session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
        history: &dyn HistorySource,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
        history: &dyn HistorySource,
    ) -> Result<ExitCode> {
        match T::execute(*self, stdout, stderr, session, history) {
            Ok(x) => Ok(x),
            Err(e) => {
                warn!(command = T::name(), error = %format!("{e:#}"), "builtin failed");
                writeln!(stderr, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, argv: &ArgVector) -> Option<Box<dyn ExecutableCommand>> {
        if argv.command()? != T::name() {
            return None;
        }
        let operands = argv.operands().into_iter().map(String::from).collect();
        Some(Box::new(T::from_operands(operands)))
    }
}

/// Leave the shell. Operands are ignored.
pub struct Exit;

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_operands(_operands: Vec<String>) -> Self {
        Exit
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        session: &mut Session,
        _history: &dyn HistorySource,
    ) -> Result<ExitCode> {
        session.destroy();
        Ok(0)
    }
}

/// Change the current working directory.
///
/// The first operand is used verbatim; further operands are ignored. Without
/// one, changes to `$HOME`, or to the home directory of the current user.
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_operands(operands: Vec<String>) -> Self {
        Cd {
            target: operands.into_iter().next(),
        }
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        session: &mut Session,
        _history: &dyn HistorySource,
    ) -> Result<ExitCode> {
        let target = resolve_target(self.target, session.var("HOME"))?;
        change_dir(&target)?;
        Ok(0)
    }
}

/// Directory `cd` should switch to: the explicit target, else `home`, else
/// the passwd entry of the real user id.
fn resolve_target(target: Option<String>, home: Option<OsString>) -> Result<PathBuf> {
    if let Some(target) = target {
        return Ok(PathBuf::from(target));
    }
    if let Some(home) = home {
        return Ok(PathBuf::from(home));
    }
    let uid = Uid::current();
    match User::from_uid(uid) {
        Ok(Some(user)) => Ok(user.dir),
        Ok(None) => Err(anyhow!("cd: no passwd entry for uid {uid}")),
        Err(errno) => Err(anyhow!("cd: {}", errno.desc())),
    }
}

fn change_dir(target: &Path) -> Result<()> {
    env::set_current_dir(target).context("cd")?;
    debug!(dir = %target.display(), "changed directory");
    Ok(())
}

/// List the command history, oldest first. Operands are ignored.
pub struct History;

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn from_operands(_operands: Vec<String>) -> Self {
        History
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _session: &mut Session,
        history: &dyn HistorySource,
    ) -> Result<ExitCode> {
        let entries = history.entries();
        if entries.is_empty() {
            writeln!(stderr, "Command history is empty.")?;
            return Ok(0);
        }
        for (idx, entry) in entries.iter().enumerate() {
            writeln!(stdout, "{}.) {}", idx + 1, entry)?;
        }
        Ok(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lexer::{ArgLimit, split_into_args};
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create the builtin for `line` through its factory and run it.
    fn run_line<T: BuiltinCommand + 'static>(
        line: &str,
        session: &mut Session,
        history: &dyn HistorySource,
    ) -> (ExitCode, String, String) {
        let argv = split_into_args(Some(line), ArgLimit::default()).unwrap();
        let cmd = Factory::<T>::default().try_create(&argv).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = cmd.execute(&mut out, &mut err, session, history).unwrap();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn no_history() -> Vec<String> {
        Vec::new()
    }

    fn cwd() -> PathBuf {
        fs::canonicalize(env::current_dir().unwrap()).unwrap()
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = env::current_dir().unwrap();

        let mut session = Session::new("t>");
        let line = format!("cd {}", canonical_temp.display());
        let (code, out, err) = run_line::<Cd>(&line, &mut session, &no_history());

        let new_cwd = cwd();
        env::set_current_dir(&orig).unwrap();

        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_extra_arguments_ignored() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = env::current_dir().unwrap();

        let mut session = Session::new("t>");
        let line = format!("cd {} /does/not/exist", canonical_temp.display());
        let (code, _, _) = run_line::<Cd>(&line, &mut session, &no_history());

        let new_cwd = cwd();
        env::set_current_dir(&orig).unwrap();

        assert_eq!(code, 0);
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_dash_prefixed_directory_used_verbatim() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("-dir")).unwrap();
        fs::create_dir(canonical_temp.join("help")).unwrap();
        let orig = env::current_dir().unwrap();

        env::set_current_dir(&canonical_temp).unwrap();
        let mut session = Session::new("t>");
        let (dash_code, dash_out, dash_err) = run_line::<Cd>("cd -dir", &mut session, &no_history());
        let after_dash = cwd();

        env::set_current_dir(&canonical_temp).unwrap();
        let (help_code, help_out, _) = run_line::<Cd>("cd help", &mut session, &no_history());
        let after_help = cwd();
        env::set_current_dir(&orig).unwrap();

        assert_eq!(dash_code, 0, "stderr: {dash_err}");
        assert!(dash_out.is_empty() && dash_err.is_empty());
        assert_eq!(after_dash, canonical_temp.join("-dir"));

        assert_eq!(help_code, 0);
        assert!(help_out.is_empty());
        assert_eq!(after_help, canonical_temp.join("help"));
    }

    #[test]
    fn test_cd_nonexistent_path_reports_error() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();

        let mut session = Session::new("t>");
        let (code, out, err) = run_line::<Cd>("cd /does/not/exist", &mut session, &no_history());

        assert_eq!(code, 1);
        assert_eq!(env::current_dir().unwrap(), orig);
        assert!(out.is_empty());
        assert!(err.starts_with("cd: "), "unexpected stderr: {err:?}");
    }

    #[test]
    fn test_resolve_target_prefers_explicit_then_home() {
        let explicit = resolve_target(Some("/tmp".into()), Some("/home/x".into())).unwrap();
        assert_eq!(explicit, PathBuf::from("/tmp"));

        let home = resolve_target(None, Some("/home/x".into())).unwrap();
        assert_eq!(home, PathBuf::from("/home/x"));
    }

    #[test]
    fn test_cd_without_target_uses_home() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = env::current_dir().unwrap();

        let mut session = Session::new("t>");
        session.set_var("HOME", canonical_temp.as_os_str());
        let (code, out, err) = run_line::<Cd>("cd", &mut session, &no_history());

        let new_cwd = cwd();
        env::set_current_dir(&orig).unwrap();

        assert_eq!(code, 0, "stderr: {err}");
        assert!(out.is_empty() && err.is_empty());
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_without_home_uses_passwd_entry() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();

        let mut session = Session::new("t>");
        session.unset_var("HOME");
        let (code, out, err) = run_line::<Cd>("cd", &mut session, &no_history());

        let new_cwd = cwd();
        env::set_current_dir(&orig).unwrap();
        assert!(out.is_empty());

        // Without a usable passwd home directory, cd has to fail and stay put.
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) if user.dir.is_dir() => {
                assert_eq!(code, 0, "stderr: {err}");
                assert!(err.is_empty());
                assert_eq!(new_cwd, fs::canonicalize(&user.dir).unwrap());
            }
            _ => {
                assert_eq!(code, 1);
                assert!(err.starts_with("cd: "), "unexpected stderr: {err:?}");
                assert_eq!(new_cwd, fs::canonicalize(&orig).unwrap());
            }
        }
    }

    #[test]
    fn test_history_lists_entries() {
        let mut session = Session::new("t>");
        let history = vec!["ls -la".to_string(), "cd /tmp".to_string()];
        let (code, out, err) = run_line::<History>("history", &mut session, &history);

        assert_eq!(code, 0);
        assert_eq!(out, "1.) ls -la\n2.) cd /tmp\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_history_empty() {
        let mut session = Session::new("t>");
        let (code, out, err) = run_line::<History>("history --bogus", &mut session, &no_history());

        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert_eq!(err, "Command history is empty.\n");
    }

    #[test]
    fn test_exit_destroys_session() {
        let mut session = Session::new(String::from("t>"));
        let (code, out, err) = run_line::<Exit>("exit", &mut session, &no_history());

        assert_eq!(code, 0);
        assert!(out.is_empty() && err.is_empty());
        assert_eq!(session.prompt(), None);
        assert!(session.should_exit());
    }

    #[test]
    fn test_exit_ignores_operands() {
        for line in ["exit --help", "exit help", "exit 3 -x"] {
            let mut session = Session::new(String::from("t>"));
            let (code, out, err) = run_line::<Exit>(line, &mut session, &no_history());

            assert_eq!(code, 0, "{line}");
            assert!(out.is_empty() && err.is_empty(), "{line}");
            assert_eq!(session.prompt(), None, "{line}");
            assert!(session.should_exit(), "{line}");
        }
    }

    #[test]
    fn test_factory_ignores_other_names() {
        let argv = split_into_args(Some("ls -la"), ArgLimit::default()).unwrap();
        assert!(Factory::<Cd>::default().try_create(&argv).is_none());

        let empty = split_into_args(Some(""), ArgLimit::default()).unwrap();
        assert!(Factory::<Exit>::default().try_create(&empty).is_none());
    }
}

use std::io::{self, Write};

use log::debug;

use crate::shell::error::{Result, ShellError};
use crate::shell::executor::JobManager;
use crate::shell::parser::SimpleCommand;
use crate::shell::state::InterpreterState;

/// Commands that run inside the shell process because they change its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Prev,
    Cd,
    Pwd,
    Jobs,
    Help,
}

pub const BUILTINS: [Builtin; 6] = [
    Builtin::Exit,
    Builtin::Prev,
    Builtin::Cd,
    Builtin::Pwd,
    Builtin::Jobs,
    Builtin::Help,
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Prev => "prev",
            Builtin::Cd => "cd",
            Builtin::Pwd => "pwd",
            Builtin::Jobs => "jobs",
            Builtin::Help => "help",
        }
    }

    fn usage(&self) -> &'static str {
        match self {
            Builtin::Exit => "exit [N]     leave the shell",
            Builtin::Prev => "prev         run the previous command line again",
            Builtin::Cd => "cd [DIR]     change the working directory",
            Builtin::Pwd => "pwd          print the working directory",
            Builtin::Jobs => "jobs         list background jobs",
            Builtin::Help => "help         show this list",
        }
    }
}

/// What the caller has to do after a built-in returns.
#[derive(Debug, PartialEq, Eq)]
pub enum BuiltinFlow {
    Status(i32),
    /// Parse and run this line again (`prev`).
    Replay(String),
}

pub struct BuiltinContext<'a> {
    pub state: &'a mut InterpreterState,
    pub jobs: &'a JobManager,
}

/// Runs `builtin` with the arguments of `command`, writing its output to `out`.
pub fn run(
    builtin: Builtin,
    command: &SimpleCommand,
    ctx: BuiltinContext<'_>,
    out: &mut dyn Write,
) -> Result<BuiltinFlow> {
    debug!("running builtin: {}", command);
    let args = command.args();
    let written = match builtin {
        Builtin::Exit => return builtin_exit(args, ctx.state),
        Builtin::Prev => return builtin_prev(args, ctx.state),
        Builtin::Cd => return builtin_cd(args, ctx.state),
        Builtin::Pwd => writeln!(out, "{}", ctx.state.cwd.display()),
        Builtin::Jobs => ctx
            .jobs
            .get_jobs()
            .iter()
            .try_for_each(|job| writeln!(out, "{}", job)),
        Builtin::Help => BUILTINS
            .iter()
            .try_for_each(|builtin| writeln!(out, "{}", builtin.usage())),
    };

    match written.and_then(|_| out.flush()) {
        Ok(()) => Ok(BuiltinFlow::Status(0)),
        // the reading end went away, like a process killed by SIGPIPE
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(BuiltinFlow::Status(1)),
        Err(e) => Err(ShellError::Io(e)),
    }
}

fn builtin_exit(args: &[String], state: &mut InterpreterState) -> Result<BuiltinFlow> {
    let status = match args {
        [] => None,
        [code] => Some(code.parse::<i32>().map_err(|_| {
            ShellError::builtin("exit", format!("numeric argument required: {}", code))
        })?),
        _ => return Err(ShellError::builtin("exit", "too many arguments")),
    };
    state.request_exit(status);
    Ok(BuiltinFlow::Status(status.unwrap_or(state.last_status)))
}

fn builtin_prev(args: &[String], state: &InterpreterState) -> Result<BuiltinFlow> {
    if !args.is_empty() {
        return Err(ShellError::builtin("prev", "too many arguments"));
    }
    let line = state.history.recall()?;
    Ok(BuiltinFlow::Replay(line.to_string()))
}

fn builtin_cd(args: &[String], state: &mut InterpreterState) -> Result<BuiltinFlow> {
    let target = match args {
        [] => "~",
        [dir] => dir.as_str(),
        _ => return Err(ShellError::builtin("cd", "too many arguments")),
    };

    let path = state.resolve(target);
    if !path.is_dir() {
        return Err(ShellError::builtin(
            "cd",
            format!("no such directory: {}", target),
        ));
    }
    let path = path
        .canonicalize()
        .map_err(|e| ShellError::builtin("cd", format!("{}: {}", target, e)))?;

    debug!("cd: {} -> {}", state.cwd.display(), path.display());
    state.cwd = path;
    Ok(BuiltinFlow::Status(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::parser::Parser;
    use std::path::PathBuf;

    fn command(line: &str) -> SimpleCommand {
        let plan = Parser::parse_line(line).unwrap();
        plan.jobs[0].pipeline.single().unwrap().clone()
    }

    fn run_line(state: &mut InterpreterState, line: &str) -> (Result<BuiltinFlow>, String) {
        let command = command(line);
        let builtin = Builtin::from_name(command.program()).unwrap();
        let jobs = JobManager::new();
        let mut out = Vec::new();
        let result = run(builtin, &command, BuiltinContext { state, jobs: &jobs }, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Builtin::from_name("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::from_name("prev"), Some(Builtin::Prev));
        assert_eq!(Builtin::from_name("ls"), None);
    }

    #[test]
    fn test_pwd_prints_tracked_dir() {
        let mut state = InterpreterState::new(PathBuf::from("/some/where"));
        let (result, out) = run_line(&mut state, "pwd");
        assert_eq!(result.unwrap(), BuiltinFlow::Status(0));
        assert_eq!(out, "/some/where\n");
    }

    #[test]
    fn test_cd_changes_tracked_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut state = InterpreterState::new(dir.path().to_path_buf());

        let (result, _) = run_line(&mut state, "cd sub");
        assert_eq!(result.unwrap(), BuiltinFlow::Status(0));
        assert_eq!(state.cwd, dir.path().join("sub").canonicalize().unwrap());

        let (result, _) = run_line(&mut state, "cd ..");
        assert_eq!(result.unwrap(), BuiltinFlow::Status(0));
        assert_eq!(state.cwd, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_cd_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = InterpreterState::new(dir.path().to_path_buf());
        let (result, _) = run_line(&mut state, "cd nowhere");
        let err = result.unwrap_err();
        assert!(matches!(err, ShellError::Builtin { name: "cd", .. }));
        assert_eq!(err.to_string(), "cd: no such directory: nowhere");
        assert_eq!(state.cwd, dir.path());

        let (result, _) = run_line(&mut state, "cd a b");
        assert!(result.is_err());
    }

    #[test]
    fn test_exit() {
        let mut state = InterpreterState::new(PathBuf::from("/"));
        let (result, _) = run_line(&mut state, "exit 4");
        assert_eq!(result.unwrap(), BuiltinFlow::Status(4));
        assert_eq!(state.exit_status(), Some(4));

        let mut state = InterpreterState::new(PathBuf::from("/"));
        let (result, _) = run_line(&mut state, "exit nope");
        assert!(result.is_err());
        assert!(!state.exit_requested());
    }

    #[test]
    fn test_prev() {
        let mut state = InterpreterState::new(PathBuf::from("/"));
        let (result, _) = run_line(&mut state, "prev");
        assert!(matches!(result, Err(ShellError::EmptyHistory)));

        state.history.record("echo cs3650");
        let (result, _) = run_line(&mut state, "prev");
        assert_eq!(result.unwrap(), BuiltinFlow::Replay("echo cs3650".into()));
    }

    #[test]
    fn test_help_lists_builtins() {
        let mut state = InterpreterState::new(PathBuf::from("/"));
        let (_, out) = run_line(&mut state, "help");
        assert_eq!(out.lines().count(), BUILTINS.len());
        assert!(out.contains("prev"));
    }
}

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, error, warn};
use nix::fcntl::OFlag;
use nix::unistd::{pipe2, Pid};

use super::job_manager::{waitpidx, BackgroundJob, JobManager};
use crate::shell::builtins::{self, Builtin, BuiltinContext, BuiltinFlow};
use crate::shell::error::{Result, ShellError};
use crate::shell::parser::{ExecMode, Pipeline, RedirectOp, Redirection, SimpleCommand};
use crate::shell::state::InterpreterState;

/// One end of a stage's standard stream. Owned by exactly one stage.
enum Endpoint {
    Inherit,
    Null,
    File(File),
    Pipe(OwnedFd),
}

impl Endpoint {
    fn into_stdio(self) -> Stdio {
        match self {
            Endpoint::Inherit => Stdio::inherit(),
            Endpoint::Null => Stdio::null(),
            Endpoint::File(file) => Stdio::from(file),
            Endpoint::Pipe(fd) => Stdio::from(fd),
        }
    }

    fn into_writer(self) -> Box<dyn Write> {
        match self {
            Endpoint::Inherit => Box::new(io::stdout()),
            Endpoint::Null => Box::new(io::sink()),
            Endpoint::File(file) => Box::new(file),
            Endpoint::Pipe(fd) => Box::new(File::from(fd)),
        }
    }
}

struct Plumbing {
    stdin: Endpoint,
    stdout: Endpoint,
}

/// Wires `n` stages together: the redirections sit on the outer ends, and
/// every adjacent pair shares a close-on-exec pipe. A detached pipeline
/// without an input redirection reads from /dev/null, never from the shell's
/// own stdin.
fn plumb(
    n: usize,
    input: Option<File>,
    output: Option<File>,
    detached: bool,
) -> Result<Vec<Plumbing>> {
    let mut stdins = Vec::with_capacity(n);
    let mut stdouts = Vec::with_capacity(n);

    let unredirected = if detached {
        Endpoint::Null
    } else {
        Endpoint::Inherit
    };
    stdins.push(input.map_or(unredirected, Endpoint::File));
    for _ in 1..n {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(io::Error::from)?;
        stdouts.push(Endpoint::Pipe(write));
        stdins.push(Endpoint::Pipe(read));
    }
    stdouts.push(output.map_or(Endpoint::Inherit, Endpoint::File));

    Ok(stdins
        .into_iter()
        .zip(stdouts)
        .map(|(stdin, stdout)| Plumbing { stdin, stdout })
        .collect())
}

/// Opens the target of a redirection relative to the tracked working directory.
pub fn open_redirection(state: &InterpreterState, redirection: &Redirection) -> Result<File> {
    let path = state.resolve(&redirection.filename);
    let mut options = OpenOptions::new();
    match redirection.operator {
        RedirectOp::Input => options.read(true),
        RedirectOp::Output => options.write(true).create(true).truncate(true).mode(0o644),
        RedirectOp::Append => options.append(true).create(true).mode(0o644),
    };
    options
        .open(&path)
        .map_err(|source| ShellError::Redirection { path, source })
}

fn spawn(command: &SimpleCommand, plumbing: Plumbing, cwd: &Path, group: Option<Pid>) -> Result<Pid> {
    // a failed chdir in the child looks exactly like a missing program
    if !cwd.is_dir() {
        return Err(ShellError::Spawn {
            program: command.program().to_string(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                format!("working directory {} no longer exists", cwd.display()),
            ),
        });
    }

    let mut process = Command::new(command.program());
    process
        .args(command.args())
        .current_dir(cwd)
        .stdin(plumbing.stdin.into_stdio())
        .stdout(plumbing.stdout.into_stdio());
    if let Some(pgid) = group {
        process.process_group(pgid.as_raw());
    }

    let spawned = process.spawn();
    // the Command holds the parent's copies of this stage's descriptors
    drop(process);

    let child = spawned.map_err(|e| ShellError::from_spawn(command.program(), e))?;
    Ok(Pid::from_raw(child.id() as i32))
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Running(Pid),
    Finished(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Foreground pipeline finished with the status of its last stage.
    Finished(i32),
    /// Pipeline continues in the background as job `index`.
    Background { index: usize, pgid: Pid },
}

pub struct Executor {
    jobs: JobManager,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            jobs: JobManager::new(),
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Runs one pipeline. Failures of individual stages (unknown program,
    /// built-in errors) are pushed to `errors` and do not stop the other
    /// stages; only errors that prevent the pipeline from starting are returned.
    pub fn execute(
        &mut self,
        pipeline: &Pipeline,
        mode: ExecMode,
        state: &mut InterpreterState,
        errors: &mut Vec<ShellError>,
    ) -> Result<ExecOutcome> {
        debug!("executing {:?} pipeline: {}", mode, pipeline);

        let input = pipeline
            .input()
            .map(|r| open_redirection(state, r))
            .transpose()?;
        let output = pipeline
            .output()
            .map(|r| open_redirection(state, r))
            .transpose()?;
        let background = mode == ExecMode::Background;
        let plumbing = plumb(pipeline.len(), input, output, background)?;

        let mut pgid: Option<Pid> = None;
        let mut stages = Vec::with_capacity(pipeline.len());
        let mut deferred = Vec::new();

        for (i, (command, plumbing)) in pipeline.commands().iter().zip(plumbing).enumerate() {
            if let Some(builtin) = Builtin::from_name(command.program()) {
                stages.push(Stage::Finished(0));
                deferred.push((i, builtin, command, plumbing));
                continue;
            }

            // background stages join the group of the first one spawned
            let group = background.then(|| pgid.unwrap_or(Pid::from_raw(0)));
            match spawn(command, plumbing, &state.cwd, group) {
                Ok(pid) => {
                    debug!("spawned {} as {}", command.program(), pid);
                    pgid.get_or_insert(pid);
                    stages.push(Stage::Running(pid));
                }
                Err(e) => {
                    warn!("stage {} failed to start: {}", i, e);
                    stages.push(Stage::Finished(e.exit_status()));
                    errors.push(e);
                }
            }
        }

        // Built-ins never read their piped input; closing every such read end
        // up front keeps a built-in writer from blocking on another built-in.
        let deferred: Vec<_> = deferred
            .into_iter()
            .map(|(i, builtin, command, plumbing)| {
                drop(plumbing.stdin);
                (i, builtin, command, plumbing.stdout)
            })
            .collect();
        for (i, builtin, command, stdout) in deferred {
            let mut out = stdout.into_writer();
            let ctx = BuiltinContext {
                state: &mut *state,
                jobs: &self.jobs,
            };
            let status = match builtins::run(builtin, command, ctx, &mut out) {
                Ok(BuiltinFlow::Status(status)) => status,
                Ok(BuiltinFlow::Replay(_)) => {
                    let e = ShellError::builtin(builtin.name(), "cannot be used in a pipeline");
                    let status = e.exit_status();
                    errors.push(e);
                    status
                }
                Err(e) => {
                    let status = e.exit_status();
                    errors.push(e);
                    status
                }
            };
            stages[i] = Stage::Finished(status);
        }

        let tail = stages.last().copied().unwrap_or(Stage::Finished(0));
        if let (true, Some(pgid)) = (background, pgid) {
            let pids: Vec<Pid> = stages
                .iter()
                .filter_map(|stage| match stage {
                    Stage::Running(pid) => Some(*pid),
                    Stage::Finished(_) => None,
                })
                .collect();
            let tail_status = match tail {
                Stage::Running(_) => None,
                Stage::Finished(status) => Some(status),
            };
            let index = self
                .jobs
                .add_job(pgid, &pids, tail_status, format!("{} &", pipeline));
            debug!("background job [{}] started with group {}", index, pgid);
            return Ok(ExecOutcome::Background { index, pgid });
        }

        // foreground (or a background pipeline with nothing left running)
        for stage in stages.iter_mut() {
            if let Stage::Running(pid) = *stage {
                let status = match waitpidx(pid, true) {
                    Ok(Some(status)) => status,
                    Ok(None) => 0,
                    Err(e) => {
                        error!("waitpid {} failed: {}", pid, e);
                        1
                    }
                };
                debug!("process {} finished with status {}", pid, status);
                *stage = Stage::Finished(status);
            }
        }

        match stages.last() {
            Some(Stage::Finished(status)) => Ok(ExecOutcome::Finished(*status)),
            _ => Ok(ExecOutcome::Finished(0)),
        }
    }

    pub fn reap_background(&mut self) -> Vec<BackgroundJob> {
        self.jobs.reap()
    }

    pub fn shutdown(&mut self) {
        self.jobs.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::parser::Parser;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Fixture {
        dir: tempfile::TempDir,
        state: InterpreterState,
        executor: Executor,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let state = InterpreterState::new(dir.path().to_path_buf());
            Self {
                dir,
                state,
                executor: Executor::new(),
            }
        }

        fn run(&mut self, line: &str) -> (Result<ExecOutcome>, Vec<ShellError>) {
            let plan = Parser::parse_line(line).unwrap();
            let job = &plan.jobs[0];
            let mut errors = Vec::new();
            let outcome = self
                .executor
                .execute(&job.pipeline, job.mode, &mut self.state, &mut errors);
            (outcome, errors)
        }

        fn status(&mut self, line: &str) -> i32 {
            match self.run(line).0.unwrap() {
                ExecOutcome::Finished(status) => status,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join(name)).unwrap()
        }
    }

    #[test]
    fn test_truncate_then_append() {
        let mut fx = Fixture::new();
        assert_eq!(fx.status(r"printf '1\n2\n3\n' > f"), 0);
        assert_eq!(fx.status(r"printf '4\n5\n' >> f"), 0);
        assert_eq!(fx.read("f"), "1\n2\n3\n4\n5\n");
        assert_eq!(fx.status("echo fresh > f"), 0);
        assert_eq!(fx.read("f"), "fresh\n");
    }

    #[test]
    fn test_input_redirection() {
        let mut fx = Fixture::new();
        fs::write(fx.dir.path().join("nums"), "3\n1\n2\n").unwrap();
        assert_eq!(fx.status("sort -n < nums > sorted"), 0);
        assert_eq!(fx.read("sorted"), "1\n2\n3\n");
    }

    #[test]
    fn test_pipeline_wires_stages() {
        let mut fx = Fixture::new();
        assert_eq!(fx.status("printf 'b\\na\\nc\\n' | sort | tr a-z A-Z > out"), 0);
        assert_eq!(fx.read("out"), "A\nB\nC\n");
    }

    #[test]
    fn test_shuffle_sort() {
        let mut fx = Fixture::new();
        assert_eq!(fx.status("seq 1 10 | sort -R | sort -n > out"), 0);
        let expected: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        assert_eq!(fx.read("out").lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_readers_see_end_of_input() {
        // every stage drains its input before writing; a leaked write end hangs here
        let mut fx = Fixture::new();
        assert_eq!(
            fx.status("seq 1 50000 | sort -rn | sort -n | tail -n 1 > out"),
            0
        );
        assert_eq!(fx.read("out"), "50000\n");
    }

    #[test]
    fn test_status_of_last_stage() {
        let mut fx = Fixture::new();
        assert_eq!(fx.status("false | true"), 0);
        assert_eq!(fx.status("true | false"), 1);
        assert_eq!(fx.status("sh -c 'exit 3'"), 3);
    }

    #[test]
    fn test_unknown_command() {
        let mut fx = Fixture::new();
        let (outcome, errors) = fx.run("not_a_real_command");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(127));
        assert!(matches!(errors.as_slice(), [ShellError::CommandNotFound(name)] if name == "not_a_real_command"));
    }

    #[test]
    fn test_unknown_stage_does_not_stop_siblings() {
        let mut fx = Fixture::new();
        let (outcome, errors) = fx.run("echo hi | not_a_real_command | cat > out");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(0));
        assert_eq!(errors.len(), 1);
        assert_eq!(fx.read("out"), "");

        let (outcome, errors) = fx.run("not_a_real_command | echo still > out");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(0));
        assert_eq!(errors.len(), 1);
        assert_eq!(fx.read("out"), "still\n");
    }

    #[test]
    fn test_redirection_error_spawns_nothing() {
        let mut fx = Fixture::new();
        let (outcome, errors) = fx.run("cat < missing.txt > out");
        assert!(matches!(outcome, Err(ShellError::Redirection { .. })));
        assert!(errors.is_empty());
        assert!(!fx.dir.path().join("out").exists());

        let (outcome, _) = fx.run("echo x > no/such/dir/file");
        assert!(matches!(outcome, Err(ShellError::Redirection { .. })));
    }

    #[test]
    fn test_children_use_tracked_cwd() {
        let mut fx = Fixture::new();
        fs::create_dir(fx.dir.path().join("sub")).unwrap();
        fx.state.cwd = fx.dir.path().join("sub");
        assert_eq!(fx.status("touch made_here"), 0);
        assert!(fx.dir.path().join("sub/made_here").exists());
    }

    #[test]
    fn test_builtin_inside_pipeline() {
        let mut fx = Fixture::new();
        let cwd = fx.state.cwd.display().to_string();
        assert_eq!(fx.status("pwd | cat > out"), 0);
        assert_eq!(fx.read("out"), format!("{}\n", cwd));

        // the built-in's piped input is closed, so the writer just stops
        assert_eq!(fx.status("yes | pwd > out2"), 0);
        assert_eq!(fx.read("out2"), format!("{}\n", cwd));
    }

    #[test]
    fn test_prev_inside_pipeline_is_rejected() {
        let mut fx = Fixture::new();
        fx.state.history.record("echo hi");
        let (outcome, errors) = fx.run("prev | cat");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(0));
        assert!(matches!(errors.as_slice(), [ShellError::Builtin { name: "prev", .. }]));
    }

    #[test]
    fn test_background_job_is_reaped() {
        let mut fx = Fixture::new();
        let (outcome, errors) = fx.run("sleep 0.1 | cat &");
        assert!(errors.is_empty());
        let index = match outcome.unwrap() {
            ExecOutcome::Background { index, .. } => index,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(index, 1);
        assert_eq!(fx.executor.jobs().get_jobs().len(), 1);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut finished = Vec::new();
        while finished.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
            finished = fx.executor.reap_background();
        }
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].command, "sleep 0.1 | cat &");
        assert!(fx.executor.jobs().is_empty());
    }

    #[test]
    fn test_removed_cwd_is_reported_as_such() {
        let mut fx = Fixture::new();
        let gone = fx.dir.path().join("gone");
        fs::create_dir(&gone).unwrap();
        fx.state.cwd = gone.clone();
        fs::remove_dir(&gone).unwrap();

        let (outcome, errors) = fx.run("ls");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(1));
        assert!(matches!(errors.as_slice(), [ShellError::Spawn { program, .. }] if program == "ls"));
        assert!(errors[0].to_string().contains("no longer exists"));
    }

    #[test]
    fn test_background_stdin_is_null() {
        let mut fx = Fixture::new();
        let (outcome, errors) = fx.run("wc -c > count &");
        assert!(errors.is_empty());
        assert!(matches!(outcome.unwrap(), ExecOutcome::Background { .. }));

        let deadline = Instant::now() + Duration::from_secs(10);
        while !fx.executor.jobs().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
            fx.executor.reap_background();
        }
        assert!(fx.executor.jobs().is_empty());
        assert_eq!(fx.read("count").trim(), "0");
    }

    #[test]
    fn test_background_builtin_only_pipeline_finishes_inline() {
        let mut fx = Fixture::new();
        let (outcome, _) = fx.run("pwd | pwd > out &");
        assert_eq!(outcome.unwrap(), ExecOutcome::Finished(0));
        assert!(fx.executor.jobs().is_empty());
    }
}

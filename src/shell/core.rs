use std::io::{self, Write};
use std::path::PathBuf;

use log::{debug, error, info};
use nix::unistd::Pid;

use crate::shell::builtins::{self, Builtin, BuiltinContext, BuiltinFlow};
use crate::shell::error::{Result, ShellError};
use crate::shell::executor::{open_redirection, BackgroundJob, ExecOutcome, Executor, JobManager};
use crate::shell::parser::{CommandPlan, Job, Parser, SimpleCommand};
use crate::shell::state::InterpreterState;

/// Everything that came out of running one input line.
#[derive(Debug, Default)]
pub struct LineOutcome {
    /// Status of the last job that ran.
    pub status: i32,
    /// Errors caught at job boundaries, in the order they happened.
    pub errors: Vec<ShellError>,
    /// Background jobs started by this line: job number and process group.
    pub launched: Vec<(usize, Pid)>,
}

/// Drives tokenizer, parser, built-ins and executor for one line at a time.
pub struct Interpreter {
    state: InterpreterState,
    executor: Executor,
}

impl Interpreter {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            state: InterpreterState::new(cwd),
            executor: Executor::new(),
        }
    }

    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    pub fn jobs(&self) -> &JobManager {
        self.executor.jobs()
    }

    pub fn exit_requested(&self) -> bool {
        self.state.exit_requested()
    }

    /// Status the shell process should exit with.
    pub fn exit_status(&self) -> i32 {
        self.state.exit_status().unwrap_or(self.state.last_status)
    }

    pub fn run_line(&mut self, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome::default();

        let plan = match Parser::parse_line(line) {
            Ok(plan) => plan,
            Err(e) => {
                outcome.status = e.exit_status();
                outcome.errors.push(e);
                self.state.last_status = outcome.status;
                return outcome;
            }
        };
        if plan.is_empty() {
            outcome.status = self.state.last_status;
            return outcome;
        }

        // lines that call prev are never remembered, so prev cannot replay itself
        if !plan.invokes(Builtin::Prev.name()) {
            self.state.history.record(line.trim());
        }

        self.run_plan(plan, &mut outcome);
        outcome
    }

    fn run_plan(&mut self, plan: CommandPlan, outcome: &mut LineOutcome) {
        for job in plan {
            if self.state.exit_requested() {
                debug!("exit requested, skipping: {}", job);
                break;
            }
            let status = match self.run_job(&job, outcome) {
                Ok(status) => status,
                Err(e) => {
                    error!("job `{}` failed: {}", job, e);
                    let status = e.exit_status();
                    outcome.errors.push(e);
                    status
                }
            };
            self.state.last_status = status;
            outcome.status = status;
        }
    }

    fn run_job(&mut self, job: &Job, outcome: &mut LineOutcome) -> Result<i32> {
        if let Some(command) = job.pipeline.single() {
            if let Some(builtin) = Builtin::from_name(command.program()) {
                return self.run_builtin(builtin, command, outcome);
            }
        }

        match self
            .executor
            .execute(&job.pipeline, job.mode, &mut self.state, &mut outcome.errors)?
        {
            ExecOutcome::Finished(status) => Ok(status),
            ExecOutcome::Background { index, pgid } => {
                info!("[{}] {} started: {}", index, pgid, job);
                outcome.launched.push((index, pgid));
                Ok(0)
            }
        }
    }

    fn run_builtin(
        &mut self,
        builtin: Builtin,
        command: &SimpleCommand,
        outcome: &mut LineOutcome,
    ) -> Result<i32> {
        if builtin == Builtin::Prev && (command.input().is_some() || command.output().is_some()) {
            return Err(ShellError::builtin("prev", "redirections are not supported"));
        }

        // the input file is only checked; built-ins do not read stdin
        let _input = command
            .input()
            .map(|r| open_redirection(&self.state, r))
            .transpose()?;
        let mut out: Box<dyn Write> = match command.output() {
            Some(r) => Box::new(open_redirection(&self.state, r)?),
            None => Box::new(io::stdout()),
        };

        let ctx = BuiltinContext {
            state: &mut self.state,
            jobs: self.executor.jobs(),
        };
        match builtins::run(builtin, command, ctx, &mut out)? {
            BuiltinFlow::Status(status) => Ok(status),
            BuiltinFlow::Replay(line) => self.replay(&line, outcome),
        }
    }

    fn replay(&mut self, line: &str, outcome: &mut LineOutcome) -> Result<i32> {
        debug!("prev: replaying `{}`", line);
        let plan = Parser::parse_line(line)?;
        self.run_plan(plan, outcome);
        Ok(outcome.status)
    }

    /// Non-blocking check for finished background jobs; meant to run before
    /// every prompt.
    pub fn reap_background(&mut self) -> Vec<BackgroundJob> {
        self.executor.reap_background()
    }

    pub fn shutdown(&mut self) {
        self.executor.shutdown();
    }
}

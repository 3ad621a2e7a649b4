use std::fmt;

use super::lexer::RedirectOp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub operator: RedirectOp,
    pub filename: String,
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.operator.symbol(),
            shell_words::quote(&self.filename)
        )
    }
}

/// One program invocation: argv plus at most one input and one output redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    argv: Vec<String>,
    input: Option<Redirection>,
    output: Option<Redirection>,
}

impl SimpleCommand {
    pub(crate) fn new(
        argv: Vec<String>,
        input: Option<Redirection>,
        output: Option<Redirection>,
    ) -> Self {
        Self {
            argv,
            input,
            output,
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn input(&self) -> Option<&Redirection> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Redirection> {
        self.output.as_ref()
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_words::join(&self.argv))?;
        if let Some(input) = &self.input {
            write!(f, " {}", input)?;
        }
        if let Some(output) = &self.output {
            write!(f, " {}", output)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<SimpleCommand>,
}

impl Pipeline {
    pub(crate) fn new(commands: Vec<SimpleCommand>) -> Self {
        debug_assert!(!commands.is_empty());
        Self { commands }
    }

    pub fn commands(&self) -> &[SimpleCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The single command of a one-stage pipeline.
    pub fn single(&self) -> Option<&SimpleCommand> {
        match self.commands.as_slice() {
            [command] => Some(command),
            _ => None,
        }
    }

    /// Input redirection of the whole pipeline, bound to the first command.
    pub fn input(&self) -> Option<&Redirection> {
        self.commands.first().and_then(SimpleCommand::input)
    }

    /// Output redirection of the whole pipeline, bound to the last command.
    pub fn output(&self) -> Option<&Redirection> {
        self.commands.last().and_then(SimpleCommand::output)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Foreground,
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pipeline: Pipeline,
    pub mode: ExecMode,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pipeline)?;
        if self.mode == ExecMode::Background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPlan {
    pub jobs: Vec<Job>,
}

impl CommandPlan {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Whether any command in the plan is named `program`.
    pub fn invokes(&self, program: &str) -> bool {
        self.jobs.iter().any(|job| {
            job.pipeline
                .commands()
                .iter()
                .any(|command| command.program() == program)
        })
    }
}

impl IntoIterator for CommandPlan {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

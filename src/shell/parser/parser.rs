use std::iter::Peekable;
use std::vec::IntoIter;

use log::trace;

use super::ast::{CommandPlan, ExecMode, Job, Pipeline, Redirection, SimpleCommand};
use super::lexer::{tokenize, RedirectOp, Token};
use crate::shell::error::{Result, ShellError};

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    /// Tokenizes and parses one line.
    pub fn parse_line(line: &str) -> Result<CommandPlan> {
        let plan = Parser::new(tokenize(line)?).parse_plan()?;
        trace!("parsed plan: {:?}", plan);
        Ok(plan)
    }

    pub fn parse_plan(&mut self) -> Result<CommandPlan> {
        let mut plan = CommandPlan::default();

        while self.tokens.peek().is_some() {
            let pipeline = self.parse_pipeline()?;
            let mode = match self.tokens.next() {
                None | Some(Token::Sequence) => ExecMode::Foreground,
                Some(Token::Background) => ExecMode::Background,
                Some(other) => return Err(unexpected(&other)),
            };
            plan.jobs.push(Job { pipeline, mode });
        }

        Ok(plan)
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline> {
        let mut commands = vec![self.parse_simple_command()?];

        while self.tokens.next_if_eq(&Token::Pipe).is_some() {
            match self.tokens.peek() {
                None | Some(Token::Pipe | Token::Sequence | Token::Background) => {
                    return Err(ShellError::syntax("expected a command after `|`"));
                }
                _ => commands.push(self.parse_simple_command()?),
            }
        }

        check_redirection_placement(&commands)?;
        Ok(Pipeline::new(commands))
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommand> {
        let mut argv = Vec::new();
        let mut input = None;
        let mut output = None;

        loop {
            match self.tokens.peek() {
                None | Some(Token::Pipe | Token::Sequence | Token::Background) => break,
                Some(Token::Redirect(op)) => {
                    let op = *op;
                    let redirection = self.parse_redirection(op)?;
                    // a later redirection of the same direction wins
                    match op {
                        RedirectOp::Input => input = Some(redirection),
                        RedirectOp::Output | RedirectOp::Append => output = Some(redirection),
                    }
                }
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(word)) = self.tokens.next() {
                        argv.push(word);
                    }
                }
            }
        }

        if argv.is_empty() {
            return Err(match self.tokens.peek() {
                Some(token) => unexpected(token),
                None if input.is_some() || output.is_some() => {
                    ShellError::syntax("redirection without a command")
                }
                None => ShellError::syntax("unexpected end of line"),
            });
        }

        Ok(SimpleCommand::new(argv, input, output))
    }

    fn parse_redirection(&mut self, operator: RedirectOp) -> Result<Redirection> {
        self.tokens.next(); // the operator itself

        match self.tokens.next() {
            Some(Token::Word(filename)) => Ok(Redirection { operator, filename }),
            Some(other) => Err(ShellError::syntax(format!(
                "expected a file name after `{}`, found `{}`",
                operator.symbol(),
                other
            ))),
            None => Err(ShellError::syntax(format!(
                "expected a file name after `{}`",
                operator.symbol()
            ))),
        }
    }
}

fn unexpected(token: &Token) -> ShellError {
    ShellError::syntax(format!("unexpected token `{}`", token))
}

// Input binds to the first stage and output to the last; anything else cannot
// be honored and is rejected instead of being dropped.
fn check_redirection_placement(commands: &[SimpleCommand]) -> Result<()> {
    let last = commands.len() - 1;
    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            if let Some(redirection) = command.input() {
                return Err(ShellError::syntax(format!(
                    "`{}` is only allowed on the first command of a pipeline",
                    redirection
                )));
            }
        }
        if i < last {
            if let Some(redirection) = command.output() {
                return Err(ShellError::syntax(format!(
                    "`{}` is only allowed on the last command of a pipeline",
                    redirection
                )));
            }
        }
    }
    Ok(())
}

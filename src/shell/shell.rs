use std::env;
use std::error::Error;
use std::io::{self, Write};

use log::{debug, error, warn};

use crate::shell::core::{Interpreter, LineOutcome};
use crate::shell::readline::{LineSource, ReadlineError};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    theme: Theme,
    input: LineSource<'a>,
    interpreter: Interpreter,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, Box<dyn Error>> {
        let input = LineSource::open(config)?;
        if !input.is_interactive() {
            // scripted runs get bare command output
            colored::control::set_override(false);
        }
        Ok(Self {
            theme: Theme::load_theme(&config.theme),
            input,
            interpreter: Interpreter::new(env::current_dir()?),
        })
    }

    /// Runs until end of input or `exit` and returns the status to exit with.
    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!("starting minish");

        signals::install_interrupt_handler()?;
        self.input.load_history();

        if self.input.is_interactive() {
            println!(
                "{}",
                (self.theme.success_style)(self.theme.get_message("welcome"))
            );
            println!(
                "{}",
                (self.theme.warning_style)(self.theme.get_message("help"))
            );
        }

        self.run_loop()?;
        self.input.save_history();
        self.interpreter.shutdown();

        debug!("leaving minish");
        Ok(self.interpreter.exit_status())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.report_finished_jobs();
            io::stdout().flush()?;
            let prompt = (self.theme.prompt_style)(self.theme.get_message("prompt"));

            match self.input.read_line(&prompt) {
                Ok(line) => {
                    self.handle_input(&line);
                    if self.interpreter.exit_requested() {
                        println!(
                            "{}",
                            (self.theme.success_style)(self.theme.get_message("exit"))
                        );
                        break;
                    }
                }
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    if self.input.is_interactive() {
                        println!(
                            "\n{}",
                            (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                        );
                    }
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("interrupted at the prompt");
                    println!(
                        "{}",
                        (self.theme.warning_style)(self.theme.get_message("interrupt_signal"))
                    );
                }
                // a bad line is skipped; only end of input or `exit` ends the loop
                Err(ReadlineError::Io(err)) if err.kind() == io::ErrorKind::InvalidData => {
                    warn!("skipping unreadable line: {}", err);
                    eprintln!(
                        "{}: {}",
                        (self.theme.error_style)(self.theme.get_message("error")),
                        err
                    );
                }
                Err(err) => {
                    error!("failed to read input: {}", err);
                    eprintln!(
                        "{}: {}",
                        (self.theme.error_style)(self.theme.get_message("error")),
                        err
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        self.input.add_history(line);
        debug!("executing: {}", line);
        let outcome = self.interpreter.run_line(line);
        self.report(&outcome);
    }

    fn report(&self, outcome: &LineOutcome) {
        for err in &outcome.errors {
            eprintln!(
                "{}: {}",
                (self.theme.error_style)(self.theme.get_message("error")),
                err
            );
        }

        if !self.input.is_interactive() {
            return;
        }
        for (index, pgid) in &outcome.launched {
            println!("[{}] {}", index, pgid);
        }
        if outcome.status != 0 {
            eprintln!(
                "{} {}",
                (self.theme.error_style)(self.theme.get_message("error_symbol")),
                (self.theme.error_style)(format!("exit status {}", outcome.status))
            );
        }
    }

    // before every prompt, so finished background children never pile up
    fn report_finished_jobs(&mut self) {
        for job in self.interpreter.reap_background() {
            debug!("background job finished: {}", job);
            if self.input.is_interactive() {
                println!("{}", job);
            }
        }
    }
}

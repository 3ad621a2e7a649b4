use std::io::{self, BufRead, IsTerminal};

use log::{debug, error, warn};
pub use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Config as RLConfig, Editor};

use crate::utils::config::Config;

/// Line editor with on-disk history, used when stdin is a terminal.
pub struct ReadlineManager<'a> {
    config: &'a Config,
    editor: Editor<(), FileHistory>,
}

impl<'a> ReadlineManager<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let editor = Editor::with_config(rl_config)?;
        Ok(Self { config, editor })
    }

    pub fn load_history(&mut self) {
        if let Err(err) = self.editor.load_history(&self.config.history_file) {
            warn!(
                "cannot load history {}: {}",
                self.config.history_file.display(),
                err
            );
        } else {
            debug!("history loaded");
        }
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) -> Result<bool, ReadlineError> {
        self.editor.add_history_entry(line)
    }

    pub fn save_history(&mut self) {
        if let Some(parent) = self.config.history_file.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                error!("cannot create history directory {}: {}", parent.display(), err);
                return;
            }
        }
        if let Err(err) = self.editor.save_history(&self.config.history_file) {
            error!("failed to save history: {}", err);
        } else {
            debug!("history saved");
        }
    }
}

/// Where input lines come from.
pub enum LineSource<'a> {
    Interactive(ReadlineManager<'a>),
    Piped(io::StdinLock<'static>),
}

impl<'a> LineSource<'a> {
    /// Picks the line editor for a terminal and plain line reads otherwise.
    pub fn open(config: &'a Config) -> Result<Self, ReadlineError> {
        if io::stdin().is_terminal() {
            Ok(LineSource::Interactive(ReadlineManager::new(config)?))
        } else {
            debug!("stdin is not a terminal, reading lines without an editor");
            Ok(LineSource::Piped(io::stdin().lock()))
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, LineSource::Interactive(_))
    }

    /// Next line without its terminator. `ReadlineError::Eof` at end of input.
    pub fn read_line(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        match self {
            LineSource::Interactive(readline) => readline.readline(prompt),
            LineSource::Piped(stdin) => read_plain_line(stdin),
        }
    }

    pub fn add_history(&mut self, line: &str) {
        if let LineSource::Interactive(readline) = self {
            if let Err(err) = readline.add_history(line) {
                warn!("cannot add history entry: {}", err);
            }
        }
    }

    pub fn load_history(&mut self) {
        if let LineSource::Interactive(readline) = self {
            readline.load_history();
        }
    }

    pub fn save_history(&mut self) {
        if let LineSource::Interactive(readline) = self {
            readline.save_history();
        }
    }
}

// bytes that are not UTF-8 become U+FFFD instead of failing the whole read
fn read_plain_line<R: BufRead>(reader: &mut R) -> Result<String, ReadlineError> {
    let mut bytes = Vec::new();
    if reader.read_until(b'\n', &mut bytes)? == 0 {
        return Err(ReadlineError::Eof);
    }
    let line = String::from_utf8_lossy(&bytes);
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

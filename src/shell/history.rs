use crate::shell::error::{Result, ShellError};

/// Remembers the most recently executed line for `prev`. Holds exactly one entry.
#[derive(Debug, Default)]
pub struct History {
    last: Option<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: impl Into<String>) {
        self.last = Some(line.into());
    }

    pub fn recall(&self) -> Result<&str> {
        self.last.as_deref().ok_or(ShellError::EmptyHistory)
    }
}

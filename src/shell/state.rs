use std::path::{Path, PathBuf};

use crate::shell::history::History;

/// Interpreter-local state that only built-ins and the loop may change.
///
/// Child processes never see this struct; they get a copy of `cwd` when they
/// are spawned.
#[derive(Debug)]
pub struct InterpreterState {
    pub cwd: PathBuf,
    pub history: History,
    pub last_status: i32,
    exit_status: Option<i32>,
}

impl InterpreterState {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            history: History::new(),
            last_status: 0,
            exit_status: None,
        }
    }

    /// Resolves a user supplied path against the tracked working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    pub fn request_exit(&mut self, status: Option<i32>) {
        self.exit_status = Some(status.unwrap_or(self.last_status));
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_status.is_some()
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }
}

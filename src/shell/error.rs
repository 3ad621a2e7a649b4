use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while turning a line into running processes.
///
/// None of these are fatal to the interpreter: they are caught at the job
/// boundary, reported, and the next job runs.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{0}: permission denied")]
    PermissionDenied(String),

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Redirection {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{name}: {message}")]
    Builtin { name: &'static str, message: String },

    #[error("prev: no previous command")]
    EmptyHistory,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    pub fn syntax(message: impl Into<String>) -> Self {
        ShellError::Syntax(message.into())
    }

    pub fn builtin(name: &'static str, message: impl Into<String>) -> Self {
        ShellError::Builtin {
            name,
            message: message.into(),
        }
    }

    /// Classifies a failed spawn of `program` by the OS error it produced.
    pub fn from_spawn(program: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ShellError::CommandNotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => ShellError::PermissionDenied(program.to_string()),
            _ => ShellError::Spawn {
                program: program.to_string(),
                source,
            },
        }
    }

    /// Exit status a job reports when it fails with this error.
    pub fn exit_status(&self) -> i32 {
        match self {
            ShellError::Syntax(_) => 2,
            ShellError::CommandNotFound(_) => 127,
            ShellError::PermissionDenied(_) => 126,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

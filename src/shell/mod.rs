pub mod builtins;
pub mod core;
pub mod error;
pub mod executor;
pub mod history;
pub mod parser;
pub mod readline;
#[allow(clippy::module_inception)]
pub mod shell;
pub mod signals;
pub mod state;

pub use self::core::{Interpreter, LineOutcome};
pub use error::{Result, ShellError};
pub use shell::Shell;

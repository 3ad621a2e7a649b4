pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{CommandPlan, ExecMode, Job, Pipeline, Redirection, SimpleCommand};
pub use lexer::{tokenize, Lexer, RedirectOp, Token};
pub use parser::Parser;

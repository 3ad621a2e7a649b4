use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use minish::shell::parser::tokenize;

/// Prints every token of every input line on its own line.
fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for bytes in io::stdin().lock().split(b'\n') {
        let bytes = bytes?;
        let line = String::from_utf8_lossy(&bytes);
        match tokenize(line.trim_end_matches('\r')) {
            Ok(tokens) => {
                for token in tokens {
                    writeln!(out, "{}", token)?;
                }
            }
            Err(e) => {
                out.flush()?;
                eprintln!("tokenize: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

use std::fs::{self, File};
use std::io::{self, Write};
use std::process;

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::utils::config::Config;

fn parse_level(level: &str) -> LevelFilter {
    match level {
        level if level.eq_ignore_ascii_case("off") => LevelFilter::Off,
        level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
        level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
        level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
        level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
        level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn open_log_file(config: &Config) -> io::Result<File> {
    fs::create_dir_all(&config.logger_dir)?;
    let date = Local::now().format("%Y-%m-%d");
    let log_file = config.logger_dir.join(format!("{}_{}.log", config.name, date));
    File::options().create(true).append(true).open(log_file)
}

/// Sends this crate's records to the daily log file (and stderr if asked),
/// other crates only at `warn` and above.
///
/// Logging never goes to stdout: that stream belongs to the commands.
pub fn init_logger(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let level = parse_level(&config.logger_level);

    let mut writers: Vec<Box<dyn Write + Send + Sync>> = Vec::new();
    let file_error = match open_log_file(config) {
        Ok(file) => {
            writers.push(Box::new(file));
            None
        }
        Err(e) => Some(e),
    };
    if config.log_to_stderr || file_error.is_some() {
        writers.push(Box::new(io::stderr()));
    }

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(MultiWriter { writers })))
        .filter(Some(config.name.as_str()), level)
        .filter(None, LevelFilter::Warn)
        .try_init()?;

    if let Some(e) = file_error {
        log::warn!(
            "cannot open log file in {}: {}",
            config.logger_dir.display(),
            e
        );
    }
    log::debug!("log level set to {}", level);
    Ok(())
}

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for writer in &mut self.writers {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }
}

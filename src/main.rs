use std::process::ExitCode;

use log::{debug, warn};

use minish::shell::Shell;
use minish::utils::config::Config;
use minish::utils::log::init_logger;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::new();
    if let Err(e) = init_logger(&config) {
        eprintln!("minish: logging disabled: {}", e);
    }
    debug!("config loaded from {}", config.config_dir.display());

    let mut shell = Shell::new(&config)?;
    let status = shell.run()?;
    if !(0..=255).contains(&status) {
        warn!("exit status {} truncated", status);
    }
    Ok(ExitCode::from(status as u8))
}

use std::env;
use std::path::PathBuf;

use dotenv::dotenv;
use rustyline::EditMode;

pub struct Config {
    pub name: String,
    pub theme: String,
    pub config_dir: PathBuf,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/minish")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("minish"),
            theme: String::from("default"),
            history_file: config_dir.join(".minish_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            log_to_stderr: false,
            config_dir,
        }
    }

    pub fn new() -> Self {
        // a .env file may preset any of the MINISH_* variables
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("MINISH_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("MINISH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("MINISH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(level) = env::var("MINISH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("MINISH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if let Ok(flag) = env::var("MINISH_LOG_STDERR") {
            config.log_to_stderr = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}

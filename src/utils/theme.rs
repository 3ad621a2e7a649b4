use std::collections::HashMap;

use colored::Colorize;

type Style = Box<dyn Fn(String) -> String>;

pub struct Theme {
    messages: HashMap<&'static str, &'static str>,
    pub prompt_style: Style,
    pub success_style: Style,
    pub warning_style: Style,
    pub error_style: Style,
}

const MESSAGES: [(&str, &str); 8] = [
    ("welcome", "Welcome to mini-shell."),
    ("help", "Type `help` to list the built-in commands."),
    ("prompt", "shell $ "),
    ("exit", "Bye bye."),
    ("eof_signal", "End of input."),
    ("interrupt_signal", "Interrupted. Use `exit` or Ctrl-D to leave."),
    ("error", "minish"),
    ("error_symbol", "✗"),
];

impl Theme {
    fn with_styles(
        prompt_style: Style,
        success_style: Style,
        warning_style: Style,
        error_style: Style,
    ) -> Self {
        Theme {
            messages: MESSAGES.into_iter().collect(),
            prompt_style,
            success_style,
            warning_style,
            error_style,
        }
    }

    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "plain" => Theme::with_styles(
                Box::new(|s| s),
                Box::new(|s| s),
                Box::new(|s| s),
                Box::new(|s| s),
            ),
            _ => Theme::default(),
        }
    }

    pub fn get_message(&self, key: &str) -> String {
        self.messages
            .get(key)
            .map(|message| message.to_string())
            .unwrap_or_default()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::with_styles(
            Box::new(|s| s.bright_cyan().to_string()),
            Box::new(|s| s.bright_green().to_string()),
            Box::new(|s| s.yellow().to_string()),
            Box::new(|s| s.bright_red().to_string()),
        )
    }
}

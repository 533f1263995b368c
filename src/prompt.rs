use std::{borrow::Cow, env, sync::Arc};

use nu_ansi_term::{Color, Style};
use reedline::{Prompt, PromptEditMode, PromptHistorySearch};

use crate::{settings::ShellSettings, store::Store};

/// Prompt rendered from the session's display settings on every redraw.
pub struct ShellPrompt {
    store: Arc<Store>,
    custom_prompt: Option<String>,
    continuing: bool,
}

impl ShellPrompt {
    pub fn new(store: Arc<Store>, custom_prompt: Option<String>) -> Self {
        Self {
            store,
            custom_prompt,
            continuing: false,
        }
    }

    pub fn set_continuing(&mut self, continuing: bool) {
        self.continuing = continuing;
    }
}

/// Maps a colour name from `shell text-color` onto a terminal colour.
pub fn color_named(name: &str) -> Option<Color> {
    let color = match name.to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "purple" | "magenta" => Color::Purple,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" => Color::DarkGray,
        hex if hex.len() == 7 && hex.starts_with('#') => {
            let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            Color::Rgb(channel(1)?, channel(3)?, channel(5)?)
        }
        _ => return None,
    };
    Some(color)
}

fn style(settings: &ShellSettings) -> Style {
    let mut style = Style::new();
    if let Some(color) = color_named(&settings.text_color) {
        style = style.fg(color);
    }
    if settings.text_bold {
        style = style.bold();
    }
    style
}

/// Shortens every path segment but the last to its first letter, `~` for home.
pub fn short_cwd() -> String {
    let path = env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "~".into());
    let home = dirs::home_dir()
        .map(|h| h.display().to_string())
        .unwrap_or_default();
    let path = if !home.is_empty() && path.starts_with(&home) {
        path.replacen(&home, "~", 1)
    } else {
        path
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let start = if path.starts_with('/') { "/" } else { "" };
    let Some((last, leading)) = segments.split_last() else {
        return start.to_string();
    };
    let mut shortened: Vec<String> = leading
        .iter()
        .map(|seg| match seg.strip_prefix('.') {
            Some(rest) => format!(".{}", rest.chars().next().unwrap_or_default()),
            None => seg.chars().next().unwrap_or_default().to_string(),
        })
        .collect();
    shortened.push(last.to_string());
    format!("{start}{}", shortened.join("/"))
}

fn user() -> String {
    env::var("USER").unwrap_or_else(|_| "user".into())
}

impl Prompt for ShellPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let settings = self.store.settings();
        let text = if self.continuing {
            "> ".to_string()
        } else if let Some(prompt) = &self.custom_prompt {
            prompt.clone()
        } else {
            match settings.prompt_style.as_str() {
                "minimal" => "> ".to_string(),
                "full" => format!("{}@{} $ ", user(), short_cwd()),
                _ => format!("{} > ", short_cwd()),
            }
        };
        Cow::Owned(style(&settings).paint(text).to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("? ")
    }
}

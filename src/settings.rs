use serde::{Deserialize, Serialize};

/// Display customization the `shell` builtin edits and the prompt reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub bg_opacity: u8,
    pub text_size: u32,
    pub text_color: String,
    pub text_bold: bool,
    pub prompt_style: String,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            bg_opacity: 100,
            text_size: 12,
            text_color: "white".to_string(),
            text_bold: false,
            prompt_style: "default".to_string(),
        }
    }
}

impl ShellSettings {
    /// Applies `option value`, returning the confirmation line on success or
    /// the rejection line otherwise. A rejected value leaves `self` untouched.
    pub fn apply(&mut self, option: &str, value: &str) -> Result<String, String> {
        match option {
            "bg-opacity" => match value.parse::<u8>() {
                Ok(opacity) if opacity <= 100 => {
                    self.bg_opacity = opacity;
                    Ok(format!("Background opacity set to {opacity}%"))
                }
                _ => Err(
                    "Invalid opacity value. Please enter a value between 0 and 100.".to_string(),
                ),
            },
            "text-size" => match value.parse::<u32>() {
                Ok(size) if size > 0 => {
                    self.text_size = size;
                    Ok(format!("Text size set to {size}"))
                }
                _ => Err("Invalid text size. Please enter a positive integer.".to_string()),
            },
            "text-color" => {
                self.text_color = value.to_string();
                Ok(format!("Text color set to {value}"))
            }
            "text-bold" => match value {
                "true" | "false" => {
                    self.text_bold = value == "true";
                    Ok(format!("Text bold set to {value}"))
                }
                _ => Err("Invalid value for text-bold. Use true or false.".to_string()),
            },
            "prompt-style" => {
                self.prompt_style = value.to_string();
                Ok(format!("Prompt style set to {value}"))
            }
            _ => Err("Unknown customization option.".to_string()),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "Shell Customization Options:\n\
             bg-opacity: {}%\n\
             text-size: {}\n\
             text-color: {}\n\
             text-bold: {}\n\
             prompt-style: {}\n",
            self.bg_opacity, self.text_size, self.text_color, self.text_bold, self.prompt_style
        )
    }
}

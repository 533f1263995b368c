use log::debug;

/// How a command line is split into words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tokenizer {
    /// Split on runs of whitespace. Quotes are ordinary characters.
    #[default]
    Whitespace,
    /// POSIX-style word splitting with quotes and backslash escapes.
    Words,
}

impl Tokenizer {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "whitespace" => Some(Tokenizer::Whitespace),
            "words" => Some(Tokenizer::Words),
            _ => None,
        }
    }

    pub fn split(self, line: &str) -> Vec<String> {
        match self {
            Tokenizer::Whitespace => tokenize(line),
            // unbalanced quotes fall back to plain splitting
            Tokenizer::Words => shell_words::split(line).unwrap_or_else(|e| {
                debug!("tokenizer: {e}, falling back to whitespace split");
                tokenize(line)
            }),
        }
    }
}

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

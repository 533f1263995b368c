use std::{
    collections::BTreeSet,
    env,
    fs,
    path::PathBuf,
};

use reedline::{Completer, Span, Suggestion};

use crate::builtins;

/// Completes builtins and `PATH` executables in command position, file
/// names everywhere else.
pub struct ShellCompleter {
    commands: BTreeSet<String>,
}

impl ShellCompleter {
    pub fn new() -> Self {
        Self {
            commands: Self::load_commands(),
        }
    }

    /// Every builtin plus every file name found in a `PATH` directory.
    pub fn load_commands() -> BTreeSet<String> {
        let mut commands: BTreeSet<String> =
            builtins::names().into_iter().map(str::to_string).collect();

        if let Some(path_var) = env::var_os("PATH") {
            env::split_paths(&path_var)
                .flat_map(|dir| fs::read_dir(dir).ok().into_iter().flatten())
                .filter_map(|entry| entry.ok()?.file_name().to_str().map(str::to_string))
                .for_each(|cmd| {
                    commands.insert(cmd);
                });
        }
        commands
    }

    fn complete_commands(&self, current: &str, span: Span) -> Vec<Suggestion> {
        self.commands
            .iter()
            .filter(|cmd| cmd.starts_with(current))
            .map(|cmd| Suggestion {
                value: cmd.clone(),
                span,
                append_whitespace: true,
                ..Default::default()
            })
            .collect()
    }

    fn complete_files(&self, current: &str, span: Span) -> Vec<Suggestion> {
        let last_slash = current.rfind('/').map_or(0, |i| i + 1);
        let (base, partial) = current.split_at(last_slash);

        let dir = if base.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(shellexpand::tilde(base).into_owned())
        };
        let Ok(reader) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let partial_span = Span::new(span.start + last_slash, span.end);

        let mut suggestions: Vec<Suggestion> = reader
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let name = file_name.to_str()?;
                if !partial.starts_with('.') && name.starts_with('.') {
                    return None;
                }
                if !name.starts_with(partial) {
                    return None;
                }
                let value = if entry.path().is_dir() {
                    format!("{name}/")
                } else {
                    name.to_string()
                };
                Some(Suggestion {
                    value,
                    span: partial_span,
                    ..Default::default()
                })
            })
            .collect();
        suggestions.sort_by(|a, b| a.value.cmp(&b.value));
        suggestions
    }
}

impl Default for ShellCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for ShellCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let line = &line[..pos];
        let last_space = line.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let span = Span::new(last_space, pos);
        let current_word = &line[last_space..pos];

        // first word, or the first word of a pipeline stage
        let before = line[..last_space].trim_end();
        if before.is_empty() || before.ends_with('|') {
            return self.complete_commands(current_word, span);
        }
        self.complete_files(current_word, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_position_offers_builtins() {
        let mut completer = ShellCompleter {
            commands: ["history", "help", "ls"].into_iter().map(String::from).collect(),
        };
        let values: Vec<_> = completer
            .complete("h", 1)
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["help", "history"]);

        let values: Vec<_> = completer
            .complete("echo a | l", 10)
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["ls"]);
    }

    #[test]
    fn later_words_complete_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let mut completer = ShellCompleter {
            commands: BTreeSet::new(),
        };
        let line = format!("cat {}/n", dir.path().display());
        let values: Vec<_> = completer
            .complete(&line, line.len())
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["nested/", "notes.txt"]);
    }
}

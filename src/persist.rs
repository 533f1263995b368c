//! Load-at-startup / save-at-exit hooks for aliases, exported variables and
//! display settings.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::{
    error::{Result, ShellError},
    settings::ShellSettings,
    store::Store,
};

lazy_static! {
    static ref ALIAS_LINE: Regex = Regex::new(r"^alias\s+([^=\s]+)=(.*)$").unwrap();
    static ref VAR_LINE: Regex = Regex::new(r"^([^=\s]+)=(.*)$").unwrap();
}

pub trait Persistence: Send + Sync {
    fn load(&self, store: &Store);
    fn save(&self, store: &Store) -> Result<()>;
}

/// Does nothing. Used when the engine is embedded or under test.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn load(&self, _store: &Store) {}

    fn save(&self, _store: &Store) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Alias(String, String),
    Var(String, String),
}

/// Strips any run of quote characters from both ends.
pub fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '\'' || c == '"')
}

/// Parses one line of an alias file. Bare `NAME=VALUE` lines are variables.
pub fn parse_line(line: &str) -> Option<Entry> {
    if let Some(caps) = ALIAS_LINE.captures(line) {
        return Some(Entry::Alias(caps[1].to_string(), unquote(&caps[2]).to_string()));
    }
    VAR_LINE
        .captures(line)
        .map(|caps| Entry::Var(caps[1].to_string(), caps[2].to_string()))
}

pub fn format_aliases(aliases: &[(String, String)]) -> String {
    aliases
        .iter()
        .map(|(name, value)| format!("alias {name}='{value}'\n"))
        .collect()
}

pub fn format_vars(vars: &[(String, String)]) -> String {
    vars.iter()
        .map(|(name, value)| format!("{name}={value}\n"))
        .collect()
}

fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("could not read {}: {e}", path.display());
            None
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ShellError::path(parent, e))?;
    }
    let mut file = fs::File::create(path).map_err(|e| ShellError::path(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ShellError::path(path, e))
}

/// Plain-text files in the user's home plus a JSON settings file.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub aliases: PathBuf,
    pub vars: PathBuf,
    pub settings: PathBuf,
}

impl FileStore {
    pub fn new(aliases: PathBuf, vars: PathBuf, settings: PathBuf) -> Self {
        Self {
            aliases,
            vars,
            settings,
        }
    }
}

impl Persistence for FileStore {
    fn load(&self, store: &Store) {
        for path in [&self.aliases, &self.vars] {
            let Some(content) = read_optional(path) else {
                continue;
            };
            for entry in content.lines().filter_map(parse_line) {
                match entry {
                    Entry::Alias(name, value) => store.set_alias(&name, &value),
                    Entry::Var(name, value) => store.set_var(&name, &value),
                }
            }
            debug!("loaded {}", path.display());
        }

        if let Some(content) = read_optional(&self.settings) {
            match serde_json::from_str::<ShellSettings>(&content) {
                Ok(settings) => store.replace_settings(settings),
                Err(e) => warn!("ignoring {}: {e}", self.settings.display()),
            }
        }
    }

    fn save(&self, store: &Store) -> Result<()> {
        write_file(&self.aliases, &format_aliases(&store.aliases()))?;
        write_file(&self.vars, &format_vars(&store.vars()))?;
        let settings = serde_json::to_string_pretty(&store.settings())
            .map_err(|e| ShellError::Io(e.into()))?;
        write_file(&self.settings, &settings)
    }
}

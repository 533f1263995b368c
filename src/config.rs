use std::{
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::warn;

use crate::{path::DEFAULT_CACHE_TTL, persist::FileStore, tokens::Tokenizer};

const DEFAULT_CONFIG: &str = "\
# prompt = \"dyshell> \"
# cache_ttl = 300
# tokenizer = whitespace
#startup
";

pub struct Config {
    pub prompt: Option<String>,
    pub startup: Vec<String>,
    pub cache_ttl: Duration,
    pub tokenizer: Tokenizer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: None,
            startup: vec![],
            cache_ttl: DEFAULT_CACHE_TTL,
            tokenizer: Tokenizer::Whitespace,
        }
    }
}

/// Directory holding `dyshell.conf` and `settings.json`.
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("", "", "dyshell")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| dirs::home_dir().map(|home| home.join(".config/dyshell")))
        .unwrap_or_else(|| PathBuf::from(".dyshell"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("dyshell.conf")
}

pub fn history_file_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dyshell/history"))
        .unwrap_or_else(|| config_dir().join("history"))
}

/// Alias, variable and settings files for a user whose home is `home`.
pub fn session_files(home: &Path) -> FileStore {
    FileStore::new(
        home.join(".dyshell_aliases"),
        home.join(".dyshell_env"),
        config_dir().join("settings.json"),
    )
}

/// Reads the config file, writing a commented default first if none exists.
pub fn init() -> Config {
    let config_path = config_file_path();

    if let Some(parent) = config_path.parent() {
        let _ = create_dir_all(parent);
    }
    if !config_path.exists() {
        if let Err(e) = fs::write(&config_path, DEFAULT_CONFIG) {
            warn!("could not write {}: {e}", config_path.display());
        }
    }
    load_config(&config_path)
}

pub fn load_config(path: &Path) -> Config {
    let content = fs::read_to_string(path).unwrap_or_default();
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Config {
    let mut config = Config::default();
    let mut in_startup = false;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(comment) = line.strip_prefix('#') {
            if comment.trim().eq_ignore_ascii_case("startup") {
                in_startup = true;
            }
            continue;
        }
        if in_startup {
            config.startup.push(line.to_string());
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "prompt" => config.prompt = Some(value.to_string()),
            "cache_ttl" => match value.parse::<u64>() {
                Ok(secs) => config.cache_ttl = Duration::from_secs(secs),
                Err(_) => warn!("config: cache_ttl must be whole seconds, got {value:?}"),
            },
            "tokenizer" => match Tokenizer::from_name(value) {
                Some(tokenizer) => config.tokenizer = tokenizer,
                None => warn!("config: unknown tokenizer {value:?}"),
            },
            _ => {}
        }
    }
    config
}

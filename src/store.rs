//! Session-wide tables behind one lock.
//!
//! Aliases, exported variables, the path cache, history, background jobs and
//! display settings all live in [`Store`]. Each method takes the lock for
//! exactly one table operation, so no caller ever holds it across a process
//! wait or a filesystem scan.

use std::{
    collections::HashMap,
    env,
    path::PathBuf,
    process::Child,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::debug;

use crate::settings::ShellSettings;

/// A background process started with a trailing `&`.
#[derive(Debug, Clone)]
pub struct Job {
    /// 1-based position in the job list, fixed when the job was added.
    pub index: usize,
    pub pid: u32,
    pub argv: Vec<String>,
    pub child: Arc<Mutex<Child>>,
}

impl Job {
    /// Non-blocking check for whether the process has exited.
    pub fn is_running(&self) -> bool {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(child.try_wait(), Ok(None))
    }
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    created: Instant,
}

#[derive(Debug, Default)]
struct Tables {
    aliases: HashMap<String, String>,
    vars: HashMap<String, String>,
    paths: HashMap<String, CacheEntry>,
    history: Vec<String>,
    jobs: Vec<Job>,
    settings: ShellSettings,
}

#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // aliases

    pub fn set_alias(&self, name: &str, value: &str) {
        self.lock()
            .aliases
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_alias(&self, name: &str) -> bool {
        self.lock().aliases.remove(name).is_some()
    }

    pub fn alias(&self, name: &str) -> Option<String> {
        self.lock().aliases.get(name).cloned()
    }

    /// All aliases sorted by name.
    pub fn aliases(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .lock()
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort();
        all
    }

    // exported variables

    /// Records `name=value` and mirrors it into the live process environment
    /// so spawned children inherit it.
    pub fn set_var(&self, name: &str, value: &str) {
        let mut tables = self.lock();
        tables.vars.insert(name.to_string(), value.to_string());
        // SAFETY: the engine is the only writer of the environment and
        // dispatch is serial; the write happens while the table lock is held.
        unsafe { env::set_var(name, value) };
    }

    pub fn unset_var(&self, name: &str) {
        let mut tables = self.lock();
        tables.vars.remove(name);
        // SAFETY: see `set_var`.
        unsafe { env::remove_var(name) };
    }

    pub fn vars(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .lock()
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort();
        all
    }

    // path cache

    /// Returns the cached path for `name` if it was stored less than `ttl` ago.
    /// A stale entry is evicted on the way out.
    pub fn cached_path(&self, name: &str, ttl: Duration) -> Option<PathBuf> {
        let mut tables = self.lock();
        let entry = tables.paths.get(name)?;
        if entry.created.elapsed() < ttl {
            return Some(entry.path.clone());
        }
        debug!("path cache: evicting stale entry for {name}");
        tables.paths.remove(name);
        None
    }

    pub fn cache_path(&self, name: &str, path: PathBuf) {
        self.lock().paths.insert(
            name.to_string(),
            CacheEntry {
                path,
                created: Instant::now(),
            },
        );
    }

    /// Drops every entry older than `ttl`, returning how many went.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let mut tables = self.lock();
        let before = tables.paths.len();
        tables.paths.retain(|_, entry| entry.created.elapsed() < ttl);
        before - tables.paths.len()
    }

    // history

    pub fn record(&self, line: &str) {
        self.lock().history.push(line.to_string());
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    // jobs

    /// Appends a job and returns it. Jobs are never removed, so the index
    /// handed out here stays valid for the whole session.
    pub fn add_job(&self, child: Child, argv: Vec<String>) -> Job {
        let mut tables = self.lock();
        let job = Job {
            index: tables.jobs.len() + 1,
            pid: child.id(),
            argv,
            child: Arc::new(Mutex::new(child)),
        };
        tables.jobs.push(job.clone());
        job
    }

    pub fn job(&self, index: usize) -> Option<Job> {
        let tables = self.lock();
        index
            .checked_sub(1)
            .and_then(|i| tables.jobs.get(i))
            .cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    // settings

    pub fn settings(&self) -> ShellSettings {
        self.lock().settings.clone()
    }

    pub fn replace_settings(&self, settings: ShellSettings) {
        self.lock().settings = settings;
    }

    pub fn with_settings<R>(&self, f: impl FnOnce(&mut ShellSettings) -> R) -> R {
        f(&mut self.lock().settings)
    }
}

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use log::debug;

use crate::store::Store;

/// How long a resolved path is trusted before the search path is scanned again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Where a name was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Cached(PathBuf),
    Scanned(PathBuf),
}

impl Resolution {
    pub fn path(&self) -> &Path {
        match self {
            Resolution::Cached(p) | Resolution::Scanned(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Resolution::Cached(p) | Resolution::Scanned(p) => p,
        }
    }
}

/// Resolves bare command names against `PATH`, memoizing hits in the
/// store's path cache for `ttl`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    store: Arc<Store>,
    ttl: Duration,
}

impl PathResolver {
    pub fn new(store: Arc<Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolves against the current `PATH` of the process.
    pub fn resolve(&self, name: &str) -> Option<Resolution> {
        let search = env::var_os("PATH").unwrap_or_default();
        self.resolve_in(name, &search)
    }

    /// Resolves `name` against an explicit search path.
    ///
    /// Names containing a `/` are taken as paths and never cached. Missing
    /// from the cache only means "not resolved yet", so a miss falls through
    /// to a full scan.
    pub fn resolve_in(&self, name: &str, search: &OsString) -> Option<Resolution> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            let path = PathBuf::from(name);
            return path.is_file().then_some(Resolution::Scanned(path));
        }
        if let Some(path) = self.store.cached_path(name, self.ttl) {
            debug!("path cache hit: {name} -> {}", path.display());
            return Some(Resolution::Cached(path));
        }
        debug!("path cache miss: {name}");
        let found = env::split_paths(search)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())?;
        self.store.cache_path(name, found.clone());
        Some(Resolution::Scanned(found))
    }

    /// Drops stale cache entries. Lookups already ignore them, this just
    /// frees the memory.
    pub fn sweep(&self) -> usize {
        let evicted = self.store.evict_expired(self.ttl);
        if evicted > 0 {
            debug!("path cache: swept {evicted} stale entries");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, thread};

    fn fake_bin(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        path
    }

    #[test]
    fn scan_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_bin(dir.path(), "frob");
        let resolver = PathResolver::new(Arc::new(Store::new()), DEFAULT_CACHE_TTL);
        let search = OsString::from(dir.path());

        let first = resolver.resolve_in("frob", &search).unwrap();
        assert_eq!(first, Resolution::Scanned(bin.clone()));
        let second = resolver.resolve_in("frob", &search).unwrap();
        assert_eq!(second, Resolution::Cached(bin));
    }

    #[test]
    fn rescan_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_bin(dir.path(), "frob");
        let resolver = PathResolver::new(Arc::new(Store::new()), Duration::from_millis(40));
        let search = OsString::from(dir.path());

        resolver.resolve_in("frob", &search).unwrap();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(
            resolver.resolve_in("frob", &search),
            Some(Resolution::Scanned(bin))
        );
    }

    #[test]
    fn first_directory_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let first = fake_bin(a.path(), "dup");
        fake_bin(b.path(), "dup");
        let search = env::join_paths([a.path(), b.path()]).unwrap();
        let resolver = PathResolver::new(Arc::new(Store::new()), DEFAULT_CACHE_TTL);
        assert_eq!(resolver.resolve_in("dup", &search).unwrap().into_path(), first);
    }

    #[test]
    fn missing_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new());
        let resolver = PathResolver::new(store.clone(), DEFAULT_CACHE_TTL);
        assert!(resolver
            .resolve_in("doesnotexist123", &OsString::from(dir.path()))
            .is_none());
        assert!(store.cached_path("doesnotexist123", DEFAULT_CACHE_TTL).is_none());
    }

    #[test]
    fn directories_do_not_resolve() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let resolver = PathResolver::new(Arc::new(Store::new()), DEFAULT_CACHE_TTL);
        assert!(resolver
            .resolve_in("sub", &OsString::from(dir.path()))
            .is_none());
    }
}

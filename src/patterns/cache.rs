//! Cached policy, rebuilt when a pattern file changes.
//!
//! Readers take a shared `Arc` to the current snapshot and never observe a
//! half-built policy. Failures are cached too, so a broken file is reported
//! on every evaluation until it is fixed.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use super::{MergedPolicy, PolicySource};
use crate::error::ConfigError;
use crate::normalize::Normalizer;

type Stamps = Vec<(PathBuf, Option<SystemTime>)>;

#[derive(Debug)]
struct Snapshot {
    stamps: Stamps,
    result: Result<Arc<MergedPolicy>, ConfigError>,
}

#[derive(Debug)]
pub struct PolicyCache {
    source: PolicySource,
    normalizer: Normalizer,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl PolicyCache {
    pub fn new(source: PolicySource, normalizer: Normalizer) -> Self {
        Self {
            source,
            normalizer,
            current: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// The current policy, rebuilding it first if any file changed.
    pub fn get(&self) -> Result<Arc<MergedPolicy>, ConfigError> {
        let stamps = self.source.stamps(self.normalizer.platform());
        {
            let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(snapshot) = guard.as_ref()
                && snapshot.stamps == stamps
            {
                return snapshot.result.clone();
            }
        }
        self.rebuild(stamps)
    }

    /// Rebuild unconditionally.
    pub fn reload(&self) -> Result<Arc<MergedPolicy>, ConfigError> {
        let stamps = self.source.stamps(self.normalizer.platform());
        self.rebuild(stamps)
    }

    fn rebuild(&self, stamps: Stamps) -> Result<Arc<MergedPolicy>, ConfigError> {
        let result = self.source.load(&self.normalizer).map(Arc::new);
        match &result {
            Ok(policy) => log::debug!(
                "loaded policy from {} ({} sources)",
                self.source.describe(),
                policy.sources.len()
            ),
            Err(e) => log::error!("policy from {} failed to load: {e}", self.source.describe()),
        }
        let snapshot = Arc::new(Snapshot {
            stamps,
            result: result.clone(),
        });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Environment;
    use crate::patterns::store::BASE_FILE;
    use crate::platform::Platform;

    fn cache_for(dir: &std::path::Path) -> PolicyCache {
        PolicyCache::new(
            PolicySource::directory(dir),
            Normalizer::new(Platform::Unix, Environment::new().with_home("/home/tester")),
        )
    }

    fn write_rules(dir: &std::path::Path, reason: &str) {
        std::fs::write(
            dir.join(BASE_FILE),
            format!("[[bashToolPatterns]]\npattern = 'x'\nreason = \"{reason}\"\n"),
        )
        .unwrap();
        std::fs::write(dir.join("patterns-unix.toml"), "").unwrap();
    }

    fn first_reason(policy: &MergedPolicy) -> String {
        policy.patterns.as_ref().unwrap().rules()[0].reason.clone()
    }

    #[test]
    fn unchanged_files_share_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "one");
        let cache = cache_for(dir.path());
        let a = cache.get().unwrap();
        let b = cache.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "one");
        let cache = cache_for(dir.path());
        assert_eq!(first_reason(&cache.get().unwrap()), "one");
        write_rules(dir.path(), "two");
        assert_eq!(first_reason(&cache.reload().unwrap()), "two");
        assert_eq!(first_reason(&cache.get().unwrap()), "two");
    }

    #[test]
    fn failure_is_cached_until_fixed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BASE_FILE), "").unwrap();
        let cache = cache_for(dir.path());
        assert!(matches!(cache.get(), Err(ConfigError::Missing { .. })));
        assert!(matches!(cache.get(), Err(ConfigError::Missing { .. })));
        std::fs::write(dir.path().join("patterns-unix.toml"), "").unwrap();
        assert!(cache.get().is_ok());
    }

    #[test]
    fn concurrent_readers_see_complete_policy() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(dir.path(), "shared");
        let cache = Arc::new(cache_for(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || first_reason(&cache.get().unwrap()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), "shared");
        }
    }
}

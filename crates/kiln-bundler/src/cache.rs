//! In-memory transformation cache.
//!
//! Keys are BLAKE3 digests of everything a transformation reads (source
//! bytes, options, and per-module context such as its directory), so a hit
//! always returns exactly what a fresh transformation would. Failed
//! transformations are never stored.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::hash::cache_key;
use crate::script::CompiledScript;
use crate::style::CompiledStyle;

/// Digest identifying one transformation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(blake3::Hash);

impl CacheKey {
    pub fn new<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        Self(cache_key(parts))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Concurrent memo table shared by every build of one bundler.
#[derive(Debug)]
pub struct TransformCache<V> {
    entries: DashMap<CacheKey, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TransformCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Two workers racing on the same key may both compute; the results are
    /// identical so either may win.
    pub fn get_or_try_insert<E>(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: Clone> Default for TransformCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Caches kept by a [`crate::Bundler`] across builds.
#[derive(Debug, Default)]
pub struct BuildCaches {
    pub scripts: TransformCache<CompiledScript>,
    pub styles: TransformCache<CompiledStyle>,
}

impl BuildCaches {
    pub fn clear(&self) {
        self.scripts.clear();
        self.styles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(source: &str, options: &str) -> CacheKey {
        CacheKey::new([source.as_bytes(), options.as_bytes()])
    }

    #[test]
    fn second_lookup_hits() {
        let cache: TransformCache<String> = TransformCache::new();
        let calls = Cell::new(0);
        let compile = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>("out".to_string())
        };

        assert_eq!(cache.get_or_try_insert(key("a", "es2015"), compile).unwrap(), "out");
        assert_eq!(cache.get_or_try_insert(key("a", "es2015"), compile).unwrap(), "out");
        assert_eq!(calls.get(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn options_are_part_of_the_key() {
        assert_ne!(key("a", "es2015"), key("a", "es2017"));
        assert_eq!(key("a", "es2015").to_hex().len(), 64);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: TransformCache<u32> = TransformCache::new();
        assert!(cache.get_or_try_insert(key("bad", ""), || Err("syntax")).is_err());
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.get_or_try_insert(key("bad", ""), || Ok::<_, &str>(7)), Ok(7));
    }
}

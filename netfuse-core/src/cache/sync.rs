use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use super::{Artifact, CacheKey, MemoryLayer};
use crate::types::FusionResult;

/// Snapshot of cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from memory
    pub hits: u64,
    /// Requests that found no published entry on the fast path
    pub misses: u64,
    /// Loader invocations
    pub loads: u64,
    /// Loader invocations that returned an error
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
}

/// Memo with at-most-once loading per key.
///
/// Each key gets its own flight lock, so a slow load only blocks callers of
/// the same key. A loader error is handed to the caller that ran it and
/// nothing is stored; the next caller of that key runs the loader again.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use netfuse_core::cache::{Artifact, ArtifactCache, ArtifactKind, CacheKey};
/// use netfuse_core::matrix::SymMatrix;
/// use netfuse_core::types::OrganismRef;
///
/// let cache = ArtifactCache::new();
/// let key = CacheKey::new(&OrganismRef::core(1), ArtifactKind::Kernel, "7");
/// let loaded = cache.acquire(&key, || Ok(Artifact::Kernel(Arc::new(SymMatrix::identity(3)))))?;
/// let again = cache.acquire(&key, || unreachable!())?;
/// assert_eq!(cache.stats().loads, 1);
/// # let _ = (loaded, again);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Default)]
pub struct ArtifactCache {
    memory: MemoryLayer,
    flights: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl ArtifactCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Published artifact for `key`, without loading
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Artifact> {
        let found = self.memory.get(key);
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Return the artifact for `key`, running `loader` if it is not cached.
    ///
    /// Concurrent callers of the same uncached key wait for a single loader
    /// run and all receive its result.
    ///
    /// The flight lock is held while `loader` runs, and callers reach this
    /// from rayon workers. A loader must therefore stay sequential: a rayon
    /// join inside it lets the waiting worker steal a job that blocks on the
    /// very lock it holds.
    ///
    /// # Errors
    ///
    /// Returns the loader's error to the caller whose loader failed.
    pub fn acquire<F>(&self, key: &CacheKey, loader: F) -> FusionResult<Artifact>
    where
        F: FnOnce() -> FusionResult<Artifact>,
    {
        if let Some(artifact) = self.get(key) {
            return Ok(artifact);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let flight = Arc::clone(
            self.flights
                .lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );

        let result = {
            let _guard = flight.lock();
            // another caller may have published while we waited
            if let Some(artifact) = self.get(key) {
                Ok(artifact)
            } else {
                self.load(key, loader)
            }
        };

        self.release(key, flight);
        result
    }

    /// Drop one holder of a flight lock, removing the map entry once the map
    /// is its only owner. Clones are only made and dropped under the map
    /// lock, so the count seen here is exact.
    fn release(&self, key: &CacheKey, flight: Arc<Mutex<()>>) {
        let mut flights = self.flights.lock();
        drop(flight);
        let idle = flights.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1);
        if idle {
            flights.remove(key);
        }
    }

    /// Keys with a flight lock currently registered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    fn load<F>(&self, key: &CacheKey, loader: F) -> FusionResult<Artifact>
    where
        F: FnOnce() -> FusionResult<Artifact>,
    {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        match loader() {
            Ok(artifact) => {
                self.memory.insert(key.clone(), artifact.clone());
                debug!(key = %key, elapsed = ?start.elapsed(), "cached artifact");
                Ok(artifact)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, error = %e, "artifact load failed");
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.memory.contains(key)
    }

    /// Number of published entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactKind;
    use crate::matrix::SymMatrix;
    use crate::types::{FusionError, OrganismRef};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn key(id: &str) -> CacheKey {
        CacheKey::new(&OrganismRef::core(1), ArtifactKind::Kernel, id)
    }

    fn kernel(dim: usize) -> FusionResult<Artifact> {
        Ok(Artifact::Kernel(Arc::new(SymMatrix::identity(dim))))
    }

    #[test]
    fn test_loader_runs_once_under_contention() {
        let cache = Arc::new(ArtifactCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .acquire(&key("shared"), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            kernel(4)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().kind(), ArtifactKind::Kernel);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().loads, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn test_flight_locks_released_after_failed_loads() {
        let cache = Arc::new(ArtifactCache::new());
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.acquire(&key("down"), || {
                        thread::sleep(Duration::from_millis(5));
                        Err(FusionError::DataStore("offline".into()))
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_err());
        }
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().failures, cache.stats().loads);
    }

    #[test]
    fn test_failed_load_is_not_stored() {
        let cache = ArtifactCache::new();
        let failed = cache.acquire(&key("flaky"), || Err(FusionError::DataStore("offline".into())));
        assert!(matches!(failed, Err(FusionError::DataStore(_))));
        assert!(!cache.contains(&key("flaky")));

        assert!(cache.acquire(&key("flaky"), || kernel(2)).is_ok());
        let stats = cache.stats();
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_unrelated_keys_do_not_block() {
        let cache = Arc::new(ArtifactCache::new());
        let slow_started = Arc::new(Barrier::new(2));

        let slow = {
            let cache = Arc::clone(&cache);
            let slow_started = Arc::clone(&slow_started);
            thread::spawn(move || {
                cache.acquire(&key("slow"), || {
                    slow_started.wait();
                    thread::sleep(Duration::from_millis(200));
                    kernel(2)
                })
            })
        };

        slow_started.wait();
        let start = Instant::now();
        cache.acquire(&key("fast"), || kernel(3)).unwrap();
        assert!(start.elapsed() < Duration::from_millis(150));
        assert!(slow.join().unwrap().is_ok());
    }

    #[test]
    fn test_hits_are_counted() {
        let cache = ArtifactCache::new();
        cache.acquire(&key("a"), || kernel(1)).unwrap();
        cache.acquire(&key("a"), || kernel(1)).unwrap();
        assert!(cache.get(&key("a")).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.loads, 1);
    }
}

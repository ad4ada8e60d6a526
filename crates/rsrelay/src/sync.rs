//! Per-key async locking.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Default interval between sweeps (1 hour).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Default idle age after which an unused lock is dropped (2 hours).
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(7200);

struct LockEntry {
    lock: Arc<Mutex<()>>,
    last_access: Instant,
}

/// Async mutexes keyed by string.
///
/// Work on the same key is serialized; different keys proceed in parallel.
/// The relay keys these by session id so two inbound requests never load,
/// renew and save the same session at once.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    entries: Arc<DashMap<String, LockEntry>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lock set with a background sweeper using the default intervals.
    pub fn with_sweeper(name: &'static str) -> Self {
        let locks = Self::new();
        locks
            .clone()
            .spawn_sweeper(DEFAULT_SWEEP_INTERVAL, DEFAULT_MAX_IDLE, name);
        locks
    }

    /// Get or create the mutex for `key` and refresh its access time.
    pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| LockEntry {
                lock: Arc::new(Mutex::new(())),
                last_access: now,
            });
        entry.last_access = now;
        Arc::clone(&entry.lock)
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get(key).lock_owned().await
    }

    /// Drop entries idle for longer than `max_idle` that nobody holds or waits on.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            Arc::strong_count(&entry.lock) > 1 || now.duration_since(entry.last_access) <= max_idle
        });
        before.saturating_sub(self.entries.len())
    }

    /// Sweep periodically until the runtime shuts down.
    pub fn spawn_sweeper(self, interval: Duration, max_idle: Duration, name: &'static str) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep(max_idle);
                if removed > 0 {
                    debug!(
                        removed,
                        remaining = self.len(),
                        locks = name,
                        "Swept idle locks"
                    );
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

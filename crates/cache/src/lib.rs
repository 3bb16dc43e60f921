use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cache is a sharded in-memory map with per-entry absolute expiry.
///
/// Keys are dispersed over `n` shards by FNV-1a so that unrelated keys do not
/// contend on a lock. Expired entries read as absent immediately; physical
/// removal is deferred to a background sweeper which runs on its own
/// interval, independent of entry TTLs.
#[derive(Clone)]
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    shards: Vec<RwLock<HashMap<String, Entry<V>>>>,
    stop: CancellationToken,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

const FNV_OFFSET: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

fn fnv1a32(key: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    /// Build a cache of `num_shards` shards and start its sweeper on
    /// `sweep_interval`. Must be called within a tokio runtime.
    pub fn new(num_shards: usize, sweep_interval: Duration) -> Self {
        let shards = (0..num_shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        let inner = Arc::new(Inner {
            shards,
            stop: CancellationToken::new(),
            sweeper: Mutex::new(None),
        });

        let handle = tokio::spawn(sweep_loop(inner.clone(), sweep_interval));
        *inner.sweeper.lock().unwrap() = Some(handle);

        Self { inner }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Entry<V>>> {
        let index = fnv1a32(key) as usize % self.inner.shards.len();
        &self.inner.shards[index]
    }

    /// Fetch a live entry. Expired entries are treated as absent without
    /// being removed here; the sweeper reclaims them.
    pub fn get(&self, key: &str) -> Option<V> {
        let shard = self.shard(key).read().unwrap();
        let entry = shard.get(key)?;

        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Record `value` under `key`, expiring `ttl` from now. Last writer wins.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.shard(key).write().unwrap().insert(key.to_string(), entry);
    }

    /// Remove `key` if present.
    pub fn remove(&self, key: &str) {
        self.shard(key).write().unwrap().remove(key);
    }

    /// Number of physically-present entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|s| s.read().unwrap().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-shard entry counts, for diagnostics.
    pub fn shard_lens(&self) -> Vec<usize> {
        self.inner
            .shards
            .iter()
            .map(|s| s.read().unwrap().len())
            .collect()
    }

    /// Stop the background sweeper and wait for it to exit.
    pub async fn stop(&self) {
        self.inner.stop.cancel();
        let handle = self.inner.sweeper.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn sweep_loop<V: Send + Sync + 'static>(inner: Arc<Inner<V>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = inner.stop.cancelled() => return,
            _ = ticker.tick() => (),
        }

        let now = Instant::now();
        let mut swept = 0;

        for shard in &inner.shards {
            let mut shard = shard.write().unwrap();
            let before = shard.len();
            shard.retain(|_, entry| entry.expires_at > now);
            swept += before - shard.len();
        }

        if swept != 0 {
            tracing::debug!(swept, "removed expired cache entries");
        }
    }
}

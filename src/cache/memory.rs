use crate::cache::CacheBackend;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum time between sweeps of expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// In-process cache backend with per-key expiry.
///
/// Selected with `REDIS_URL=memory://` for single-node deployments. Expired
/// entries are dropped on read and swept on write, at most once per
/// `SWEEP_INTERVAL`. Availability can be toggled to simulate an outage.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    last_sweep: Mutex<Instant>,
    available: AtomicBool,
    sets: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
            available: AtomicBool::new(true),
            sets: AtomicU64::new(0),
        }
    }

    /// Make every subsequent operation fail (`false`) or succeed again (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn set_count(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    /// Live keys currently stored
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Keys held in the map, expired or not
    pub fn stored(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of a key, `None` when absent or without expiry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key).filter(|e| e.is_live(now))?;
        entry.expires_at.map(|deadline| deadline.saturating_duration_since(now))
    }

    fn check_available(&self) -> GatewayResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Cache("memory backend unavailable".to_string()))
        }
    }

    fn sweep_due(&self, now: Instant) -> bool {
        match self.last_sweep.lock() {
            Ok(mut last) if now.saturating_duration_since(*last) >= SWEEP_INTERVAL => {
                *last = now;
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> GatewayResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Cache("memory backend lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn connect(&self) -> GatewayResult<()> {
        self.check_available()
    }

    async fn disconnect(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> GatewayResult<()> {
        self.check_available()?;
        let now = Instant::now();
        let expires_at = if ttl_secs > 0 {
            Some(now + Duration::from_secs(ttl_secs))
        } else {
            None
        };
        let mut entries = self.lock()?;
        if self.sweep_due(now) {
            entries.retain(|_, entry| entry.is_live(now));
        }
        entries.insert(key.to_string(), Entry { value, expires_at });
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, key: &str) -> GatewayResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        Ok(self.lock()?.get(key).map_or(false, |e| e.is_live(now)))
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.check_available()
    }
}

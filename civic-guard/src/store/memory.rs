//! In-process ephemeral store
//!
//! Each key lives in a `DashMap` shard; all mutations go through the entry
//! API, which holds the shard lock for the whole read-modify-write. Expiry is
//! lazy and measured with `tokio::time::Instant`, so tests running on a paused
//! clock can advance time deterministically. Keys that are never read again
//! are reclaimed by the task started with [`MemoryStore::spawn_purger`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::EphemeralStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Value {
    Counter(u64),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local [`EphemeralStore`]
///
/// Suitable for single-instance deployments and tests. Multi-instance
/// deployments must share state through [`RedisStore`](super::RedisStore).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, returning how many were removed
    ///
    /// Expired entries are already invisible to readers; this only reclaims
    /// memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired entries every `period` in a background task
    ///
    /// The task holds only a weak reference and ends once the store is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_purger(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(purge_loop(store, period))
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Slot> {
        let now = Instant::now();
        let slot = self.entries.get(key).map(|s| s.clone())?;
        if slot.is_expired(now) {
            self.entries.remove_if(key, |_, s| s.is_expired(now));
            return None;
        }
        Some(slot)
    }
}

async fn purge_loop(store: Weak<MemoryStore>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let removed = store.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "Purged expired lockout entries");
        }
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = Instant::now();
        let mut slot = self.entries.entry(key.to_string()).or_insert_with(|| Slot {
            value: Value::Counter(0),
            expires_at: now + ttl,
        });

        if slot.is_expired(now) {
            slot.value = Value::Counter(0);
        }

        let count = match &mut slot.value {
            Value::Counter(n) => {
                *n += 1;
                *n
            }
            Value::Text(_) => {
                return Err(Error::Internal(format!("Key '{}' does not hold a counter", key)))
            }
        };
        slot.expires_at = now + ttl;

        Ok(count)
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let slot = Slot {
            value: Value::Text(value.to_string()),
            expires_at: now + ttl,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(slot);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        match self.live(key) {
            Some(Slot {
                value: Value::Counter(n),
                ..
            }) => Ok(Some(n)),
            Some(Slot {
                value: Value::Text(text),
                ..
            }) => text
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Error::Internal(format!("Key '{}' does not hold a counter", key))),
            None => Ok(None),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key).map(|slot| match slot.value {
            Value::Counter(n) => n.to_string(),
            Value::Text(text) => text,
        }))
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .live(key)
            .map(|slot| slot.expires_at.saturating_duration_since(now)))
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}

//! A small time-boxed memoisation map.
//!
//! Entries expire `ttl` after insertion and are evicted lazily on the next
//! read. Expiry uses tokio's clock so paused-time tests can drive it.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{Mutex, PoisonError},
  time::Duration,
};

use tokio::time::Instant;

/// Default lifetime of a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
pub struct TtlCache<K, V> {
  ttl:     Duration,
  entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, entries: Mutex::new(HashMap::new()) }
  }

  /// Return the cached value if it has not expired. An expired entry is
  /// removed.
  pub fn get(&self, key: &K) -> Option<V> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    match entries.get(key) {
      Some((at, value)) if at.elapsed() < self.ttl => Some(value.clone()),
      Some(_) => {
        entries.remove(key);
        None
      }
      None => None,
    }
  }

  pub fn insert(&self, key: K, value: V) {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, (Instant::now(), value));
  }

  pub fn remove(&self, key: &K) {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
  }

  pub fn clear(&self) {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }
}

impl<K, V> Default for TtlCache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  fn default() -> Self { Self::new(DEFAULT_TTL) }
}

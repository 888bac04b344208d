use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use lru::LruCache;

use crate::clock::Clock;
use crate::proxy_error::ProxyError;
use crate::proxy_service::cache_key::CacheKey;
use crate::proxy_service::response_mapper::MappedResponse;

#[derive(Clone)]
pub struct CacheEntry {
  pub data: MappedResponse,
  pub expire_at: DateTime<Utc>,
}

/// In-memory response store with lazy TTL expiry and an LRU capacity bound.
pub struct ResponseCache {
  entries: Mutex<LruCache<CacheKey, CacheEntry>>,
  clock: Arc<dyn Clock>,
}

impl ResponseCache {
  pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

    Self {
      entries: Mutex::new(LruCache::new(capacity)),
      clock,
    }
  }

  pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, ProxyError> {
    let now = self.clock.now();
    let mut entries = self.lock()?;

    let expired = match entries.get(key) {
      Some(entry) if entry.expire_at > now => return Ok(Some(entry.clone())),
      Some(_) => true,
      None => false,
    };

    if expired {
      debug!("Cache entry expired {}", key);
      entries.pop(key);
    }

    Ok(None)
  }

  pub fn put(&self, key: CacheKey, data: MappedResponse, ttl_seconds: u64) -> Result<(), ProxyError> {
    let ttl = Duration::try_seconds(i64::try_from(ttl_seconds).unwrap_or(i64::MAX))
      .unwrap_or(Duration::MAX);
    let expire_at = self
      .clock
      .now()
      .checked_add_signed(ttl)
      .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let mut entries = self.lock()?;
    if let Some((evicted, _)) = entries.push(key.clone(), CacheEntry { data, expire_at }) {
      if evicted != key {
        debug!("Cache full, evicted {}", evicted);
      }
    }

    Ok(())
  }

  pub fn len(&self) -> usize {
    self.lock().map(|entries| entries.len()).unwrap_or(0)
  }

  fn lock(&self) -> Result<MutexGuard<'_, LruCache<CacheKey, CacheEntry>>, ProxyError> {
    self
      .entries
      .lock()
      .map_err(|_| ProxyError::Internal("response cache lock poisoned".into()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use actix_web::http::StatusCode;
  use bytes::Bytes;

  fn response(body: &'static str) -> MappedResponse {
    MappedResponse {
      status: StatusCode::OK,
      headers: Vec::new(),
      body: Bytes::from_static(body.as_bytes()),
    }
  }

  fn key(raw: &str) -> CacheKey {
    CacheKey::from(raw.to_string())
  }

  #[test]
  fn entry_is_served_until_ttl_elapses() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResponseCache::new(16, clock.clone());

    cache.put(key("GET:a"), response("one"), 10).unwrap();
    clock.advance(Duration::seconds(9));
    let hit = cache.get(&key("GET:a")).unwrap().unwrap();
    assert_eq!(hit.data.body, Bytes::from_static(b"one"));

    clock.advance(Duration::seconds(1));
    assert!(cache.get(&key("GET:a")).unwrap().is_none());
    assert_eq!(cache.len(), 0);
  }

  #[test]
  fn put_overwrites_existing_entry() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResponseCache::new(16, clock);

    cache.put(key("GET:a"), response("one"), 60).unwrap();
    cache.put(key("GET:a"), response("two"), 60).unwrap();

    let hit = cache.get(&key("GET:a")).unwrap().unwrap();
    assert_eq!(hit.data.body, Bytes::from_static(b"two"));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn zero_ttl_is_never_served() {
    let cache = ResponseCache::new(16, Arc::new(ManualClock::new()));

    cache.put(key("GET:a"), response("one"), 0).unwrap();
    assert!(cache.get(&key("GET:a")).unwrap().is_none());
  }

  #[test]
  fn least_recently_used_entry_is_evicted_at_capacity() {
    let cache = ResponseCache::new(2, Arc::new(ManualClock::new()));

    cache.put(key("GET:a"), response("a"), 60).unwrap();
    cache.put(key("GET:b"), response("b"), 60).unwrap();
    assert!(cache.get(&key("GET:a")).unwrap().is_some());
    cache.put(key("GET:c"), response("c"), 60).unwrap();

    assert!(cache.get(&key("GET:b")).unwrap().is_none());
    assert!(cache.get(&key("GET:a")).unwrap().is_some());
    assert!(cache.get(&key("GET:c")).unwrap().is_some());
  }
}

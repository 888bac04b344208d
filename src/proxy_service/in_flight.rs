use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::debug;

use crate::proxy_error::ProxyError;
use crate::proxy_service::cache_key::CacheKey;
use crate::proxy_service::response_mapper::MappedResponse;

pub type Outcome = Result<MappedResponse, ProxyError>;

type PendingCall = Shared<BoxFuture<'static, Outcome>>;

/// Registry of upstream calls still running, one per cache key.
///
/// A call removes itself from the registry when it completes, so callers that
/// go away early never leave a stale result behind.
#[derive(Default)]
pub struct InFlight {
  pending: Mutex<HashMap<CacheKey, PendingCall>>,
}

impl InFlight {
  pub async fn run<F, Fut>(self: &Arc<Self>, key: CacheKey, start: F) -> Outcome
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Outcome> + Send + 'static,
  {
    let pending_call = {
      let mut pending = self.lock()?;

      match pending.entry(key) {
        Entry::Occupied(entry) => {
          debug!("Joining in-flight call {}", entry.key());
          entry.get().clone()
        }
        Entry::Vacant(entry) => {
          let registry = Arc::clone(self);
          let key = entry.key().clone();
          let call = start();

          let shared = async move {
            let outcome = call.await;
            registry.release(&key);
            outcome
          }
          .boxed()
          .shared();

          entry.insert(shared.clone());
          shared
        }
      }
    };

    pending_call.await
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.lock().map(|pending| pending.len()).unwrap_or(0)
  }

  fn release(&self, key: &CacheKey) {
    if let Ok(mut pending) = self.lock() {
      pending.remove(key);
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, PendingCall>>, ProxyError> {
    self
      .pending
      .lock()
      .map_err(|_| ProxyError::Internal("in-flight registry lock poisoned".into()))
  }
}

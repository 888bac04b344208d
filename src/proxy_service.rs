use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, info, warn};
use reqwest::Client;

use crate::clock::Clock;
use crate::proxy_error::ProxyError;
use crate::proxy_service::cache_key::CacheKey;
use crate::proxy_service::delay_injector::DelayInjector;
use crate::proxy_service::forwarder::Forwarder;
use crate::proxy_service::in_flight::{InFlight, Outcome};
use crate::proxy_service::inbound_request::InboundRequest;
use crate::proxy_service::proxy_config::ProxyConfig;
use crate::proxy_service::response_mapper::MappedResponse;
use crate::response_cache::ResponseCache;

pub mod cache_key;
pub mod delay_injector;
pub mod forwarder;
pub mod in_flight;
pub mod inbound_request;
pub mod proxy_config;
pub mod proxy_factory;
pub mod proxy_route_service;
pub mod response_mapper;

/// Shared by every worker: forwarding client, response cache and in-flight calls.
pub struct ProxyState {
  pub config: Arc<ProxyConfig>,
  pub clock: Arc<dyn Clock>,
  forwarder: Forwarder,
  cache: ResponseCache,
  in_flight: Arc<InFlight>,
  delay: DelayInjector,
}

impl ProxyState {
  pub fn new(config: ProxyConfig, http_client: Client, clock: Arc<dyn Clock>) -> Self {
    let forwarder = Forwarder::new(http_client, &config.target_base_url);
    let cache = ResponseCache::new(config.cache_max_entries, clock.clone());
    let delay = DelayInjector::new(config.mode, config.enable_delay, config.request_delay_ms);

    ProxyState {
      config: Arc::new(config),
      clock,
      forwarder,
      cache,
      in_flight: Arc::new(InFlight::default()),
      delay,
    }
  }

  pub fn delay(&self) -> &DelayInjector {
    &self.delay
  }

  pub async fn handle(self: Arc<Self>, request: InboundRequest) -> HttpResponse {
    let uri = request.uri();
    info!("Received {} {}", request.method, uri);

    let target_url = self.forwarder.target_url(&request.path);
    let key = CacheKey::build(&request, &target_url);

    match self.cache.get(&key) {
      Ok(Some(entry)) => {
        info!("Cache hit {} {}", request.method, uri);
        return entry.data.to_http_response();
      }
      Ok(None) => {}
      Err(err) => {
        error!("Cache lookup failed for {}: {}", key, err);
        return err.error_response();
      }
    }

    info!("Forwarding {} {} -> {}", request.method, uri, target_url);
    let method = request.method.clone();

    let outcome = if self.config.coalesce_requests {
      let state = self.clone();
      let call_key = key.clone();
      self
        .in_flight
        .run(key, move || state.fetch(call_key, target_url, request))
        .await
    } else {
      self.clone().fetch(key, target_url, request).await
    };

    match outcome {
      Ok(mapped) => mapped.to_http_response(),
      Err(err) => {
        match &err {
          ProxyError::Upstream { status, .. } => warn!("Upstream error for {} {}: {}", method, uri, status),
          ProxyError::Transport(message) => error!("Forwarding {} {} failed: {}", method, uri, message),
          ProxyError::Internal(message) => error!("Internal error on {} {}: {}", method, uri, message),
        }
        err.error_response()
      }
    }
  }

  async fn fetch(self: Arc<Self>, key: CacheKey, target_url: String, request: InboundRequest) -> Outcome {
    let upstream = self.forwarder.forward(&target_url, &request).await?;
    self.delay.apply().await;

    let mapped = MappedResponse::new(upstream.status, &upstream.headers, upstream.body);
    info!("Upstream responded {}", mapped.status);

    if mapped.status == StatusCode::OK {
      self.cache.put(key, mapped.clone(), self.config.cache_ttl)?;
      info!(
        "Cached {} {} for {}s ({} entries)",
        request.method,
        request.uri(),
        self.config.cache_ttl,
        self.cache.len()
      );
    }

    Ok(mapped)
  }

  #[cfg(test)]
  pub(crate) fn cached_entries(&self) -> usize {
    self.cache.len()
  }
}

use std::sync::Arc;
use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse};
use actix_web::web::BytesMut;
use actix_web::{HttpRequest, ResponseError};
use futures_util::future::LocalBoxFuture;
use futures_util::StreamExt;
use log::error;
use crate::proxy_service::inbound_request::InboundRequest;
use crate::proxy_service::ProxyState;

/// Catch-all service: every path that is not a local route ends up here.
pub struct ProxyRouteService {
  pub(super) state: Arc<ProxyState>,
}

impl Service<ServiceRequest> for ProxyRouteService {
  type Response = ServiceResponse;
  type Error = actix_web::Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  dev::always_ready!();

  fn call(&self, req: ServiceRequest) -> Self::Future {
    let (http_request, payload) = req.into_parts();

    Box::pin(ProxyRouteService::exec(self.state.clone(), http_request, payload))
  }
}

impl ProxyRouteService {
  async fn exec(state: Arc<ProxyState>, http: HttpRequest, mut payload: Payload) -> Result<ServiceResponse, actix_web::Error> {
    let mut body_buffer = BytesMut::new();

    while let Some(chunk) = payload.next().await {
      match chunk {
        Ok(bytes) => body_buffer.extend_from_slice(&bytes),
        Err(err) => {
          error!("Reading request body failed {}", err);
          let error_response = err.error_response();
          return Ok(ServiceResponse::new(http, error_response));
        }
      }
    }

    let inbound = InboundRequest::from_parts(&http, body_buffer.freeze());
    let response = state.handle(inbound).await;

    Ok(ServiceResponse::new(http, response))
  }
}

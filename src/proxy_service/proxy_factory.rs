use std::sync::Arc;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use futures_util::future::LocalBoxFuture;
use crate::proxy_service::proxy_route_service::ProxyRouteService;
use crate::proxy_service::ProxyState;

pub struct ProxyRouteServiceFactory {
  pub state: Arc<ProxyState>,
}

impl ServiceFactory<ServiceRequest> for ProxyRouteServiceFactory {
  type Response = ServiceResponse;
  type Error = actix_web::Error;
  type Config = ();
  type Service = ProxyRouteService;
  type InitError = ();
  type Future = LocalBoxFuture<'static, Result<Self::Service, Self::InitError>>;

  fn new_service(&self, _: Self::Config) -> Self::Future {
    let service = ProxyRouteService {
      state: self.state.clone(),
    };

    Box::pin(async move { Ok(service) })
  }
}

impl ProxyRouteServiceFactory {
  pub fn create(state: Arc<ProxyState>) -> Self {
    Self { state }
  }
}

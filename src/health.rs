use actix_web::{web, HttpResponse, Responder};
use chrono::SecondsFormat;
use log::info;
use serde::Serialize;

use crate::proxy_service::ProxyState;

#[derive(Serialize)]
struct HealthStatus<'a> {
  status: &'a str,
  message: &'a str,
  timestamp: String,
  target: &'a str,
}

/// Liveness probe. Never touches the cache or the upstream.
pub async fn health(state: web::Data<ProxyState>) -> impl Responder {
  info!("Health check");

  HttpResponse::Ok().json(HealthStatus {
    status: "ok",
    message: "forwarding proxy is running",
    timestamp: state.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
    target: &state.config.target_base_url,
  })
}

mod app_config;
mod clock;
mod health;
mod http_client;
mod proxy_error;
mod proxy_service;
mod response_cache;
mod std_logger;

use std::io::{ErrorKind, Result};
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::info;

use crate::app_config::AppConfig;
use crate::clock::SystemClock;
use crate::proxy_service::proxy_factory::ProxyRouteServiceFactory;
use crate::proxy_service::ProxyState;
use crate::std_logger::StdLogger;

#[actix_web::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  let config = AppConfig::parse();

  let _log_guards = StdLogger::init(config.log_level(), config.log_dir.as_deref())
    .map_err(|error| std::io::Error::new(ErrorKind::Other, error))?;

  let http_client = config
    .http_client_config()
    .to_client()
    .map_err(|error| std::io::Error::new(ErrorKind::Other, error))?;

  let state = Arc::new(ProxyState::new(config.proxy_config(), http_client, Arc::new(SystemClock)));
  log_startup(&config, &state);

  HttpServer::new(move || {
    App::new()
      .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
      .app_data(web::Data::from(state.clone()))
      .route("/health", web::get().to(health::health))
      .default_service(ProxyRouteServiceFactory::create(state.clone()))
  })
    .workers(config.worker_count)
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await
}

fn log_startup(config: &AppConfig, state: &ProxyState) {
  info!("Forwarding proxy listening on http://{}:{}", config.bind, config.port);
  info!("Forwarding target: {}", config.target_base_url);
  info!("Example: /hs is forwarded to {}/hs", config.target_base_url);
  info!("Health check: http://{}:{}/health", config.bind, config.port);
  info!("Mode: {}", config.mode());
  info!("Cache TTL: {}s, capacity {} entries", config.cache_ttl, config.cache_max_entries);

  match state.delay().delay() {
    Some(delay) => info!("Simulated latency: enabled ({}ms)", delay.as_millis()),
    None => info!("Simulated latency: disabled"),
  }
}

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

use crate::http_client::HttpClientConfig;
use crate::proxy_service::proxy_config::ProxyConfig;

pub const DEFAULT_TARGET_BASE_URL: &str = "http://web.juhe.cn/finance";

#[derive(ValueEnum, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum RunMode {
  #[default]
  Development,
  Production,
  Test,
}

impl Display for RunMode {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RunMode::Development => f.write_str("development"),
      RunMode::Production => f.write_str("production"),
      RunMode::Test => f.write_str("test"),
    }
  }
}

/// Forwarding proxy with a short-lived response cache.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct AppConfig {
  /// Upstream base address every request is forwarded to.
  #[arg(long, env = "TARGET_BASE_URL", default_value = DEFAULT_TARGET_BASE_URL)]
  pub target_base_url: String,

  /// Seconds a 200 response stays in the cache.
  #[arg(long, env = "CACHE_TTL", default_value_t = 3600)]
  pub cache_ttl: u64,

  #[arg(long, env = "CACHE_MAX_ENTRIES", default_value_t = 10_000)]
  pub cache_max_entries: usize,

  /// Artificial latency switch, honoured in development mode only.
  #[arg(long, env = "ENABLE_DELAY", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  pub enable_delay: bool,

  #[arg(long = "request-delay", env = "REQUEST_DELAY", default_value_t = 300)]
  pub request_delay_ms: u64,

  /// Deadline for one upstream call, body included.
  #[arg(long = "upstream-timeout", env = "UPSTREAM_TIMEOUT", default_value_t = 30_000)]
  pub upstream_timeout_ms: u64,

  /// Let concurrent identical cache misses share one upstream call.
  #[arg(long, env = "COALESCE_REQUESTS", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  pub coalesce_requests: bool,

  /// Run mode; falls back to `NODE_ENV`, then development.
  #[arg(long, env = "APP_ENV", value_enum)]
  pub mode: Option<RunMode>,

  #[arg(long, env = "NODE_ENV", hide = true)]
  pub node_env: Option<String>,

  #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
  pub bind: String,

  #[arg(long, env = "PORT", default_value_t = 8808)]
  pub port: u16,

  #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
  pub worker_count: usize,

  /// Overrides the mode-derived log level.
  #[arg(long, env = "LOG_LEVEL")]
  pub log_level: Option<String>,

  /// Directory for daily log files; console only when unset.
  #[arg(long, env = "LOG_DIR")]
  pub log_dir: Option<PathBuf>,

  /// Outbound proxy for upstream calls.
  #[arg(long, env = "HTTP_PROXY_URL")]
  pub proxy_url: Option<String>,

  #[arg(long, env = "HTTP_PROXY_USER")]
  pub proxy_auth_user: Option<String>,

  #[arg(long, env = "HTTP_PROXY_PASS")]
  pub proxy_auth_pass: Option<String>,
}

impl AppConfig {
  /// Unrecognised `NODE_ENV` values count as test: no delay, info logging.
  pub fn mode(&self) -> RunMode {
    match (self.mode, self.node_env.as_deref()) {
      (Some(mode), _) => mode,
      (None, Some(node_env)) => RunMode::from_str(node_env.trim(), true).unwrap_or(RunMode::Test),
      (None, None) => RunMode::Development,
    }
  }

  pub fn log_level(&self) -> LevelFilter {
    let by_mode = match self.mode() {
      RunMode::Development => LevelFilter::Debug,
      RunMode::Production | RunMode::Test => LevelFilter::Info,
    };

    self
      .log_level
      .as_deref()
      .and_then(|level| level.parse::<LevelFilter>().ok())
      .unwrap_or(by_mode)
  }

  pub fn proxy_config(&self) -> ProxyConfig {
    ProxyConfig {
      target_base_url: Box::from(self.target_base_url.as_str()),
      cache_ttl: self.cache_ttl,
      cache_max_entries: self.cache_max_entries,
      mode: self.mode(),
      enable_delay: self.enable_delay,
      request_delay_ms: self.request_delay_ms,
      coalesce_requests: self.coalesce_requests,
    }
  }

  pub fn http_client_config(&self) -> HttpClientConfig {
    HttpClientConfig {
      http_proxy: self.proxy_url.clone(),
      user: self.proxy_auth_user.clone(),
      pass: self.proxy_auth_pass.clone(),
      timeout: Duration::from_millis(self.upstream_timeout_ms),
    }
  }
}

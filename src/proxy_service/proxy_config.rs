use crate::app_config::RunMode;

/// Forwarding and caching settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
  pub target_base_url: Box<str>,
  pub cache_ttl: u64,
  pub cache_max_entries: usize,
  pub mode: RunMode,
  pub enable_delay: bool,
  pub request_delay_ms: u64,
  pub coalesce_requests: bool,
}

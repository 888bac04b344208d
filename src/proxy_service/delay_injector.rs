use std::time::Duration;

use log::debug;

use crate::app_config::RunMode;

/// Artificial upstream latency for local development.
#[derive(Debug, Clone, Copy)]
pub struct DelayInjector {
  delay: Option<Duration>,
}

impl DelayInjector {
  pub fn new(mode: RunMode, enabled: bool, delay_ms: u64) -> Self {
    let delay = (mode == RunMode::Development && enabled).then(|| Duration::from_millis(delay_ms));
    Self { delay }
  }

  pub fn delay(&self) -> Option<Duration> {
    self.delay
  }

  pub async fn apply(&self) {
    if let Some(delay) = self.delay {
      debug!("Simulating upstream latency of {}ms", delay.as_millis());
      actix_web::rt::time::sleep(delay).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Instant;

  #[test]
  fn only_active_in_development_when_enabled() {
    assert_eq!(
      DelayInjector::new(RunMode::Development, true, 300).delay(),
      Some(Duration::from_millis(300))
    );
    assert_eq!(DelayInjector::new(RunMode::Development, false, 300).delay(), None);
    assert_eq!(DelayInjector::new(RunMode::Production, true, 300).delay(), None);
    assert_eq!(DelayInjector::new(RunMode::Test, true, 300).delay(), None);
  }

  #[actix_web::test]
  async fn apply_suspends_for_the_configured_time() {
    let injector = DelayInjector::new(RunMode::Development, true, 20);
    let started = Instant::now();
    injector.apply().await;
    assert!(started.elapsed() >= Duration::from_millis(20));
  }
}

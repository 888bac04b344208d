use std::fmt::{Display, Formatter};

use actix_web::http::Method;

use crate::proxy_service::inbound_request::InboundRequest;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Box<str>);

impl CacheKey {
  /// `GET:<url>?<query>` for GET, `<METHOD>:<url>?<query>:<body>` for everything else.
  pub fn build(request: &InboundRequest, target_url: &str) -> Self {
    let query = request.query.canonical();

    let key = if request.method == Method::GET {
      format!("GET:{}?{}", target_url, query)
    } else {
      let body = request
        .body
        .as_ref()
        .map(|body| body.canonical())
        .unwrap_or_else(|| String::from("{}"));

      format!("{}:{}?{}:{}", request.method, target_url, query, body)
    };

    CacheKey(key.into_boxed_str())
  }
}

impl From<String> for CacheKey {
  fn from(value: String) -> Self {
    CacheKey(value.into_boxed_str())
  }
}

impl Display for CacheKey {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

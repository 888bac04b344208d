use actix_web::http::header::{
  HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST,
};
use bytes::Bytes;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::proxy_error::ProxyError;
use crate::proxy_service::inbound_request::InboundRequest;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Headers that never leave the proxy on the outbound call.
const STRIPPED: [HeaderName; 5] = [HOST, X_FORWARDED_FOR, X_FORWARDED_PROTO, CONTENT_TYPE, CONTENT_LENGTH];

pub struct UpstreamResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Bytes,
}

pub struct Forwarder {
  http_client: Client,
  target_base_url: Box<str>,
}

impl Forwarder {
  pub fn new(http_client: Client, target_base_url: &str) -> Self {
    Self {
      http_client,
      target_base_url: Box::from(target_base_url),
    }
  }

  pub fn target_url(&self, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", self.target_base_url, path)
  }

  /// One attempt, no retries. Non-2xx answers come back as `ProxyError::Upstream`.
  pub async fn forward(&self, target_url: &str, request: &InboundRequest) -> Result<UpstreamResponse, ProxyError> {
    let builder = self.init_request(target_url, request);
    let response = builder.send().await.map_err(ProxyError::transport)?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(ProxyError::transport)?;

    debug!("Upstream answered {} with {} bytes", status, body.len());

    if !status.is_success() {
      return Err(ProxyError::Upstream {
        status,
        content_type: headers.get(CONTENT_TYPE).cloned(),
        body,
      });
    }

    Ok(UpstreamResponse { status, headers, body })
  }

  fn init_request(&self, target_url: &str, request: &InboundRequest) -> RequestBuilder {
    let url = if request.raw_query.is_empty() {
      target_url.to_string()
    } else {
      format!("{}?{}", target_url, request.raw_query)
    };

    let mut builder = self
      .http_client
      .request(request.method.clone(), url)
      .headers(outbound_headers(request));

    if let Some(body) = &request.body {
      builder = builder.body(body.outbound());
    }

    builder
  }
}

fn outbound_headers(request: &InboundRequest) -> HeaderMap {
  let mut header_map = HeaderMap::new();

  for (name, value) in request.headers.iter() {
    if !STRIPPED.contains(name) {
      header_map.append(name.clone(), value.clone());
    }
  }

  header_map.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
  header_map
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::test::TestRequest;

  fn forwarder(base: &str) -> Forwarder {
    Forwarder::new(Client::new(), base)
  }

  #[test]
  fn target_url_strips_one_leading_slash() {
    let forwarder = forwarder("http://web.juhe.cn/finance");
    assert_eq!(forwarder.target_url("/hs"), "http://web.juhe.cn/finance/hs");
    assert_eq!(forwarder.target_url("stock/hs"), "http://web.juhe.cn/finance/stock/hs");
    assert_eq!(forwarder.target_url("/"), "http://web.juhe.cn/finance/");
  }

  #[test]
  fn proxy_topology_headers_are_not_forwarded() {
    let http = TestRequest::post()
      .uri("/hs")
      .insert_header(("host", "proxy.local"))
      .insert_header(("x-forwarded-for", "10.0.0.1"))
      .insert_header(("x-forwarded-proto", "https"))
      .insert_header(("content-type", "application/json"))
      .insert_header(("content-length", "2"))
      .insert_header(("x-api-trace", "abc"))
      .to_http_request();
    let inbound = InboundRequest::from_parts(&http, Bytes::from_static(b"{}"));

    let headers = outbound_headers(&inbound);
    assert!(headers.get(HOST).is_none());
    assert!(headers.get("x-forwarded-for").is_none());
    assert!(headers.get("x-forwarded-proto").is_none());
    assert!(headers.get(CONTENT_LENGTH).is_none());
    assert_eq!(headers.get(CONTENT_TYPE).unwrap(), FORM_URLENCODED);
    assert_eq!(headers.get("x-api-trace").unwrap(), "abc");
  }

  #[test]
  fn content_type_is_forced_even_without_a_body() {
    let http = TestRequest::get().uri("/hs").to_http_request();
    let inbound = InboundRequest::from_parts(&http, Bytes::new());

    assert_eq!(outbound_headers(&inbound).get(CONTENT_TYPE).unwrap(), FORM_URLENCODED);
  }
}

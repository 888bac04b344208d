use actix_web::http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_ENCODING, TRANSFER_ENCODING};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use bytes::Bytes;
use reqwest::header::HeaderMap;

/// Upstream framing headers; the proxy frames its own response.
const HOP_BY_HOP: [HeaderName; 3] = [CONTENT_ENCODING, TRANSFER_ENCODING, CONNECTION];

#[derive(Debug, Clone)]
pub struct MappedResponse {
  pub status: StatusCode,
  pub headers: Vec<(HeaderName, HeaderValue)>,
  pub body: Bytes,
}

impl MappedResponse {
  pub fn new(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes) -> Self {
    let headers = upstream_headers
      .iter()
      .filter(|(name, _)| !HOP_BY_HOP.contains(*name))
      .map(|(name, value)| (name.clone(), value.clone()))
      .collect();

    MappedResponse { status, headers, body }
  }

  pub fn to_http_response(&self) -> HttpResponse {
    let mut http_response = HttpResponse::new(self.status);
    let headers = http_response.headers_mut();

    for (name, value) in self.headers.iter() {
      headers.append(name.clone(), value.clone());
    }

    http_response.set_body(actix_web::body::BoxBody::new(self.body.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;
  use actix_web::http::header::{CONTENT_TYPE, SET_COOKIE};

  fn upstream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
    headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
    headers
  }

  #[test]
  fn framing_headers_are_dropped() {
    let mapped = MappedResponse::new(StatusCode::OK, &upstream_headers(), Bytes::new());
    let names: Vec<&HeaderName> = mapped.headers.iter().map(|(name, _)| name).collect();

    assert!(!names.contains(&&CONTENT_ENCODING));
    assert!(!names.contains(&&TRANSFER_ENCODING));
    assert!(!names.contains(&&CONNECTION));
    assert!(names.contains(&&CONTENT_TYPE));
  }

  #[actix_web::test]
  async fn status_body_and_repeated_headers_are_kept() {
    let mapped = MappedResponse::new(
      StatusCode::OK,
      &upstream_headers(),
      Bytes::from_static(br#"{"value":1}"#),
    );
    let response = mapped.to_http_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get_all(SET_COOKIE).count(), 2);
    assert!(response.headers().get(CONTENT_ENCODING).is_none());

    let body = to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body, Bytes::from_static(br#"{"value":1}"#));
  }
}

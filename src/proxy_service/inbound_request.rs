use std::collections::BTreeMap;

use actix_web::http::header::{HeaderMap, CONTENT_TYPE};
use actix_web::http::Method;
use actix_web::web::Query;
use actix_web::HttpRequest;
use bytes::Bytes;
use log::error;
use serde_json::{Map, Value};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Everything the pipeline needs from one inbound call.
pub struct InboundRequest {
  pub method: Method,
  pub path: String,
  pub raw_query: String,
  pub query: QueryParams,
  pub headers: HeaderMap,
  pub body: Option<RequestBody>,
}

impl InboundRequest {
  pub fn from_parts(http: &HttpRequest, payload: Bytes) -> Self {
    let method = http.method().clone();
    let body = if carries_body(&method) {
      let content_type = http
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

      Some(RequestBody::new(payload, content_type))
    } else {
      None
    };

    InboundRequest {
      method,
      path: http.path().to_string(),
      raw_query: http.query_string().to_string(),
      query: QueryParams::parse(http.query_string()),
      headers: http.headers().clone(),
      body,
    }
  }

  pub fn uri(&self) -> String {
    if self.raw_query.is_empty() {
      self.path.clone()
    } else {
      format!("{}?{}", self.path, self.raw_query)
    }
  }
}

#[inline]
pub fn carries_body(method: &Method) -> bool {
  matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Query pairs kept sorted, so equality ignores the order they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
  pub fn parse(query_string: &str) -> Self {
    let pairs = match Query::<Vec<(String, String)>>::from_query(query_string) {
      Ok(query_params) => query_params.into_inner(),
      Err(err) => {
        error!("Unable to parse query parameters {}", err);
        Vec::new()
      }
    };

    QueryParams::from(pairs)
  }

  pub fn canonical(&self) -> String {
    serde_urlencoded::to_string(&self.0).unwrap_or_default()
  }
}

impl From<Vec<(String, String)>> for QueryParams {
  fn from(mut pairs: Vec<(String, String)>) -> Self {
    pairs.sort();
    QueryParams(pairs)
  }
}

#[derive(Debug, Clone)]
pub struct RequestBody {
  raw: Bytes,
  content_type: Option<String>,
}

enum BodyKind {
  Json(Value),
  Form(Vec<(String, String)>),
  Opaque,
}

impl RequestBody {
  pub fn new(raw: Bytes, content_type: Option<String>) -> Self {
    Self { raw, content_type }
  }

  fn kind(&self) -> BodyKind {
    let mime = self
      .content_type
      .as_deref()
      .and_then(|value| value.split(';').next())
      .map(|value| value.trim().to_ascii_lowercase())
      .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
      if let Ok(value) = serde_json::from_slice::<Value>(&self.raw) {
        return BodyKind::Json(value);
      }
    } else if mime == FORM_CONTENT_TYPE {
      if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.raw) {
        return BodyKind::Form(pairs);
      }
    }

    BodyKind::Opaque
  }

  /// Stable text for the cache key.
  ///
  /// JSON and form bodies both become sorted JSON, so the same fields key the
  /// same way whichever encoding carried them. Anything else is hex-encoded
  /// behind a `raw:` tag, which no JSON text can start with.
  pub fn canonical(&self) -> String {
    if self.raw.is_empty() {
      return String::from("{}");
    }

    match self.kind() {
      BodyKind::Json(value) => sort_keys(value).to_string(),
      BodyKind::Form(pairs) => sort_keys(form_object(pairs)).to_string(),
      BodyKind::Opaque => {
        let mut canonical = String::with_capacity(4 + self.raw.len() * 2);
        canonical.push_str("raw:");
        for byte in self.raw.iter() {
          canonical.push_str(&format!("{:02x}", byte));
        }
        canonical
      }
    }
  }

  /// Payload sent upstream under the forced form content type.
  pub fn outbound(&self) -> Bytes {
    match self.kind() {
      BodyKind::Json(Value::Object(fields)) => {
        let pairs: Vec<(String, String)> = fields
          .into_iter()
          .map(|(name, value)| (name, form_value(value)))
          .collect();

        match serde_urlencoded::to_string(&pairs) {
          Ok(encoded) => Bytes::from(encoded),
          Err(err) => {
            error!("Unable to form-encode JSON body {}", err);
            self.raw.clone()
          }
        }
      }
      _ => self.raw.clone(),
    }
  }
}

fn sort_keys(value: Value) -> Value {
  match value {
    Value::Object(fields) => {
      let sorted: BTreeMap<String, Value> = fields
        .into_iter()
        .map(|(name, value)| (name, sort_keys(value)))
        .collect();

      Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
    }
    Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
    other => other,
  }
}

/// Repeated names collect into an array, in arrival order.
fn form_object(pairs: Vec<(String, String)>) -> Value {
  let mut fields = Map::new();

  for (name, value) in pairs {
    match fields.get_mut(&name) {
      Some(Value::Array(values)) => values.push(Value::String(value)),
      Some(existing) => {
        let first = existing.take();
        *existing = Value::Array(vec![first, Value::String(value)]);
      }
      None => {
        fields.insert(name, Value::String(value));
      }
    }
  }

  Value::Object(fields)
}

fn form_value(value: Value) -> String {
  match value {
    Value::String(text) => text,
    Value::Null => String::new(),
    other => sort_keys(other).to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::test::TestRequest;

  fn json_body(text: &'static str) -> RequestBody {
    RequestBody::new(Bytes::from_static(text.as_bytes()), Some("application/json".into()))
  }

  #[test]
  fn query_equality_ignores_order() {
    assert_eq!(QueryParams::parse("b=2&a=1"), QueryParams::parse("a=1&b=2"));
    assert_ne!(QueryParams::parse("a=1&b=2"), QueryParams::parse("a=1&b=3"));
    assert_eq!(QueryParams::parse("b=2&a=1").canonical(), "a=1&b=2");
  }

  #[test]
  fn json_canonical_form_sorts_nested_keys() {
    let left = json_body(r#"{"b":{"y":1,"x":2},"a":[{"d":1,"c":2}]}"#);
    let right = json_body(r#"{"a":[{"c":2,"d":1}],"b":{"x":2,"y":1}}"#);

    assert_eq!(left.canonical(), right.canonical());
    assert_eq!(left.canonical(), r#"{"a":[{"c":2,"d":1}],"b":{"x":2,"y":1}}"#);
  }

  #[test]
  fn empty_body_canonicalises_to_empty_object() {
    let body = RequestBody::new(Bytes::new(), None);
    assert_eq!(body.canonical(), "{}");
  }

  #[test]
  fn form_body_canonical_form_is_sorted() {
    let body = RequestBody::new(
      Bytes::from_static(b"z=1&a=2&a=3"),
      Some("application/x-www-form-urlencoded; charset=utf-8".into()),
    );
    assert_eq!(body.canonical(), r#"{"a":["2","3"],"z":"1"}"#);
  }

  #[test]
  fn form_and_json_with_the_same_fields_agree() {
    let form = RequestBody::new(
      Bytes::from_static(b"type=1&key=abc"),
      Some("application/x-www-form-urlencoded".into()),
    );
    let json = json_body(r#"{"key":"abc","type":"1"}"#);

    assert_eq!(form.canonical(), json.canonical());
    assert_eq!(form.outbound(), Bytes::from_static(b"type=1&key=abc"));
  }

  #[test]
  fn binary_bodies_are_encoded_without_loss() {
    let octets = Some("application/octet-stream".to_string());
    let first = RequestBody::new(Bytes::from_static(&[0xff]), octets.clone());
    let second = RequestBody::new(Bytes::from_static(&[0xfe]), octets);

    assert_eq!(first.canonical(), "raw:ff");
    assert_ne!(first.canonical(), second.canonical());
  }

  #[test]
  fn json_object_is_sent_upstream_as_form() {
    let body = json_body(r#"{"key":"abc","page":2,"empty":null}"#);
    let sent = body.outbound();

    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&sent).unwrap();
    pairs.sort();
    assert_eq!(
      pairs,
      vec![
        ("empty".to_string(), String::new()),
        ("key".to_string(), "abc".to_string()),
        ("page".to_string(), "2".to_string()),
      ]
    );
  }

  #[test]
  fn opaque_body_passes_through() {
    let body = RequestBody::new(Bytes::from_static(b"raw text"), Some("text/plain".into()));
    assert_eq!(body.outbound(), Bytes::from_static(b"raw text"));
    assert_eq!(body.canonical(), "raw:7261772074657874");
  }

  #[test]
  fn only_mutating_methods_carry_a_body() {
    let get = TestRequest::get().uri("/hs?key=abc").to_http_request();
    let inbound = InboundRequest::from_parts(&get, Bytes::from_static(b"ignored"));
    assert!(inbound.body.is_none());
    assert_eq!(inbound.uri(), "/hs?key=abc");

    let post = TestRequest::post().uri("/hs").to_http_request();
    let inbound = InboundRequest::from_parts(&post, Bytes::from_static(b"a=1"));
    assert!(inbound.body.is_some());
  }
}

use std::error::Error as StdError;

use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use bytes::Bytes;
use serde::Serialize;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ProxyError {
  /// Upstream answered, but not with a 2xx status.
  #[error("upstream responded with {status}")]
  Upstream {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
  },

  /// No upstream status is known: connect, DNS, timeout or body read failure.
  #[error("upstream call failed: {0}")]
  Transport(String),

  #[error("internal proxy failure: {0}")]
  Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
  error: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  message: Option<&'a str>,
}

impl ProxyError {
  pub fn transport(err: reqwest::Error) -> Self {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
      message.push_str(": ");
      message.push_str(&cause.to_string());
      source = cause.source();
    }

    ProxyError::Transport(message)
  }
}

impl ResponseError for ProxyError {
  fn status_code(&self) -> StatusCode {
    match self {
      ProxyError::Upstream { status, .. } => *status,
      ProxyError::Transport(_) | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self {
      ProxyError::Upstream { status, content_type, body } if !body.is_empty() => {
        let mut response = HttpResponse::build(*status);

        if let Some(content_type) = content_type {
          response.insert_header((header::CONTENT_TYPE, content_type.clone()));
        }

        response.body(body.clone())
      }
      ProxyError::Upstream { status, .. } => HttpResponse::build(*status).json(ErrorBody {
        error: "upstream error",
        message: None,
      }),
      ProxyError::Transport(message) | ProxyError::Internal(message) => {
        HttpResponse::InternalServerError().json(ErrorBody {
          error: "internal server error",
          message: Some(message),
        })
      }
    }
  }
}

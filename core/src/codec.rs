//! Request composition and response classification.
//!
//! # Design
//! Both halves are pure: `build_request` turns a path plus `RequestOptions`
//! into an `HttpRequest`, and `parse_payload` / `parse_json` turn an
//! `HttpResponse` into a value or a classified `ApiError`. `ApiClient` wires
//! them to a transport and the token store; everything here is testable
//! without I/O.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Payload};
use crate::token::SessionToken;

const CONTENT_TYPE: &str = "content-type";
const AUTHORIZATION: &str = "authorization";
const JSON: &str = "application/json";

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    /// Falls back to the configured default when `None`.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::Post)
    }

    pub fn patch() -> Self {
        Self::new(HttpMethod::Patch)
    }

    pub fn put() -> Self {
        Self::new(HttpMethod::Put)
    }

    /// Attach `body`, serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Add a header. A header named `Content-Type` or `Authorization`
    /// replaces the default one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Compose the full request for `path`.
pub fn build_request(
    config: &ClientConfig,
    path: &str,
    options: &RequestOptions,
    token: Option<&SessionToken>,
) -> Result<HttpRequest> {
    let mut headers = vec![(CONTENT_TYPE.to_string(), JSON.to_string())];
    if let Some(token) = token {
        headers.push((AUTHORIZATION.to_string(), token.authorization()));
    }
    for (name, value) in &options.headers {
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }

    let body = options
        .body
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Serialization(e.to_string()))?;

    Ok(HttpRequest {
        method: options.method,
        url: config.url_for(path),
        headers,
        body,
        timeout: options.timeout.unwrap_or_else(|| config.default_timeout()),
    })
}

/// Classify a response without assuming anything about its body's shape.
pub fn parse_payload(response: &HttpResponse) -> Result<Payload> {
    if !(200..300).contains(&response.status) {
        return Err(ApiError::from_status(response.status, &response.body));
    }
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(Payload::NoContent);
    }
    serde_json::from_str(&response.body)
        .map(Payload::Json)
        .map_err(|e| ApiError::MalformedResponse {
            status: response.status,
            reason: e.to_string(),
            body: response.body.clone(),
        })
}

/// Classify a response whose body must decode as `T`.
pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    match parse_payload(response)? {
        Payload::Json(value) => {
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
        }
        Payload::NoContent => Err(ApiError::MalformedResponse {
            status: response.status,
            reason: "expected a JSON body, got none".to_string(),
            body: String::new(),
        }),
    }
}

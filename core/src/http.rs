//! HTTP transport types.
//!
//! # Design
//! Requests and responses are described as plain data. The codec builds
//! `HttpRequest` values and classifies `HttpResponse` values without touching
//! the network; a `Transport` implementation performs the actual round-trip.
//! Keeping that seam explicit lets tests script responses (or never answer)
//! without a socket.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// A successfully classified response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204, or a 2xx with a zero-length body.
    NoContent,
    Json(serde_json::Value),
}

/// The transport failed before a status line was received.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Executes one HTTP round-trip.
///
/// Implementations must not apply their own status handling: every status
/// code comes back as an `HttpResponse`. The returned future must be
/// cancel-safe to drop; the client drops it to abort a timed-out request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

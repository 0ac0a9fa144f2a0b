//! Request/session layer for the Allawee loan API.
//!
//! # Overview
//! Every backend call made by the app goes through `ApiClient`: it attaches
//! the session token, bounds each request by a timeout, classifies failures
//! into `ApiError` kinds, and memoizes slow-changing reads in a TTL cache.
//!
//! # Design
//! - Request composition and response classification (`codec`) are pure;
//!   the network sits behind the `Transport` trait.
//! - The session token lives behind `TokenStore`; an authentication failure
//!   from any endpoint clears it.
//! - `ResponseCache` evaluates freshness on read against an injected `Clock`.
//! - Nothing is global: tests build a fresh client per case.

mod api;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod token;
pub mod transport;
pub mod types;

pub use cache::{Clock, ManualClock, ResponseCache, SystemClock};
pub use client::ApiClient;
pub use codec::RequestOptions;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Payload, Transport, TransportError};
pub use token::{FileTokenStore, MemoryTokenStore, SessionToken, TokenStore};
pub use transport::ReqwestTransport;
pub use types::*;

//! The request/session layer every backend call goes through.
//!
//! # Design
//! `ApiClient` owns no globals: configuration, transport, token store and
//! cache are injected, and clones share the same store and cache. Each call
//! reads the token, composes the request with `codec::build_request`, races
//! the transport against the request's timeout, and classifies the response.
//! On timeout the transport future is dropped, which aborts the underlying
//! request. Authentication failures clear the token store before the error
//! is returned, whichever operation triggered them.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::codec::{self, RequestOptions};
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind, Result};
use crate::http::{HttpResponse, Payload, Transport};
use crate::token::{FileTokenStore, MemoryTokenStore, SessionToken, TokenStore};
use crate::transport::ReqwestTransport;

#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    cache: Arc<ResponseCache>,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            tokens,
            cache: Arc::new(ResponseCache::new()),
        }
    }

    /// Client over reqwest, persisting the token in the platform data
    /// directory (or in memory where the platform has none).
    pub fn connect(config: ClientConfig) -> Self {
        let tokens: Arc<dyn TokenStore> = match FileTokenStore::default_location() {
            Some(store) => Arc::new(store),
            None => {
                warn!("no data directory available, session token will not persist");
                Arc::new(MemoryTokenStore::new())
            }
        };
        Self::new(config, Arc::new(ReqwestTransport::new()), tokens)
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn token_store(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.tokens.get().await?.is_some())
    }

    /// Issue a request and classify the response without assuming a schema.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Payload> {
        self.dispatch(path, &options, codec::parse_payload).await
    }

    /// Issue a request whose success body must decode as `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.dispatch(path, &options, codec::parse_json::<T>).await
    }

    async fn dispatch<T>(
        &self,
        path: &str,
        options: &RequestOptions,
        parse: impl FnOnce(&HttpResponse) -> Result<T>,
    ) -> Result<T> {
        let token = self.tokens.get().await?;
        let request = codec::build_request(&self.config, path, options, token.as_ref())?;
        let timeout = request.timeout;
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(path, error = %e, "transport failed");
                return Err(ApiError::Network(e.0));
            }
            Err(_) => {
                debug!(path, timeout_ms = timeout.as_millis() as u64, "request timed out");
                return Err(ApiError::Timeout(timeout));
            }
        };
        debug!(path, status = response.status, "response received");

        let result = parse(&response);
        if let Err(err) = &result {
            if err.kind() == ErrorKind::Auth {
                warn!(path, status = response.status, "authentication rejected, clearing session token");
                if let Err(clear_err) = self.tokens.clear().await {
                    warn!(error = %clear_err, "failed to clear session token");
                }
            }
        }
        result
    }

    /// Persist the token from an auth response and reset per-session state.
    pub(crate) async fn start_session(&self, raw_token: &str) -> Result<()> {
        let token = SessionToken::new(raw_token)
            .ok_or_else(|| ApiError::Decode("auth response carried an empty token".to_string()))?;
        self.tokens.set(&token).await?;
        self.cache.clear();
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

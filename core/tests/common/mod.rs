//! In-process transports for driving `ApiClient` without a socket.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use allawee_core::{
    ApiClient, ApiError, ClientConfig, HttpRequest, HttpResponse, ManualClock, MemoryTokenStore,
    ResponseCache, SessionToken, TokenStore, Transport, TransportError,
};
use async_trait::async_trait;

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(TransportError(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request to {}", request.url))
    }
}

/// Never answers. `aborted` flips once the in-flight future is dropped.
#[derive(Default)]
pub struct StalledTransport {
    pub aborted: Arc<AtomicBool>,
}

struct AbortFlag(Arc<AtomicBool>);

impl Drop for AbortFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let _flag = AbortFlag(Arc::clone(&self.aborted));
        std::future::pending().await
    }
}

/// A token store whose reads always fail. Counts `clear` calls.
#[derive(Default)]
pub struct UnreadableTokenStore {
    pub clears: AtomicUsize,
}

#[async_trait]
impl TokenStore for UnreadableTokenStore {
    async fn get(&self) -> allawee_core::Result<Option<SessionToken>> {
        Err(ApiError::Storage("keychain locked".to_string()))
    }

    async fn set(&self, _token: &SessionToken) -> allawee_core::Result<()> {
        Ok(())
    }

    async fn clear(&self) -> allawee_core::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub client: ApiClient,
    pub transport: Arc<ScriptedTransport>,
    pub tokens: MemoryTokenStore,
    pub clock: ManualClock,
}

pub fn harness() -> Harness {
    harness_with_tokens(MemoryTokenStore::new())
}

pub fn harness_with_tokens(tokens: MemoryTokenStore) -> Harness {
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let cache = Arc::new(ResponseCache::with_clock(Arc::new(clock.clone())));
    let client = ApiClient::new(
        ClientConfig::new("http://backend.test").unwrap(),
        transport.clone(),
        Arc::new(tokens.clone()),
    )
    .with_cache(cache);
    Harness {
        client,
        transport,
        tokens,
        clock,
    }
}

pub const DASHBOARD_JSON: &str = r#"{
    "total_applications": 3,
    "pending_applications": 0,
    "approved_applications": 2,
    "active_loans": 1,
    "total_borrowed": 250000,
    "total_paid": 70000,
    "outstanding_balance": 180000,
    "next_payment_due": { "due_date": "2026-11-01" }
}"#;

pub const PROFILE_JSON: &str = r#"{
    "full_name": "Jane Doe",
    "email": "jane@x.com",
    "phone": "08011112222"
}"#;

pub const UPDATED_PROFILE_JSON: &str = r#"{
    "full_name": "Jane Doe",
    "email": "jane@x.com",
    "phone": "0800000000"
}"#;

//! Session token persistence.
//!
//! # Design
//! A `TokenStore` holds at most one token. Absence is `None`; an empty token
//! cannot be constructed, so "logged out" has exactly one representation.
//! Stores never track expiry: the server decides whether a token is valid and
//! the client clears it when told otherwise.

mod file;
mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

/// Well-known storage key the token is persisted under.
pub const TOKEN_STORAGE_KEY: &str = "auth.token";

/// Opaque bearer token. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Returns `None` for an empty or whitespace-only value.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header for this token.
    pub fn authorization(&self) -> String {
        format!("Token {}", self.0)
    }
}

// Tokens end up in tracing output through `Debug`; keep them out of it.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Result<Option<SessionToken>>;

    /// Persist `token`, replacing any previous one. Durable once this returns.
    async fn set(&self, token: &SessionToken) -> Result<()>;

    /// Remove the token. Clearing an empty store is a no-op.
    async fn clear(&self) -> Result<()>;
}

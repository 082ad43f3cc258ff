//! Bearer credentials for outgoing requests.
//!
//! Where the token lives (cookie jar, keychain, environment) is the caller's
//! business; the client only asks for it right before each request.

use crate::config::TOKEN_ENV;

/// Source of the optional bearer token attached to stream requests.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the current token, or `None` to send the request unauthenticated.
    async fn bearer_token(&self) -> Option<String>;
}

/// Sends every request without an `Authorization` header.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

#[async_trait::async_trait]
impl CredentialStore for NoCredentials {
    async fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// A fixed token. Blank tokens are treated as absent.
#[derive(Clone, Debug)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads `FOUNDRY_API_TOKEN`, if set and non-blank.
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Self::new)
    }
}

#[async_trait::async_trait]
impl CredentialStore for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        let token = self.0.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

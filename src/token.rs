//! Transient channel-authorization tokens.
//!
//! The channel capability asks a token provider for a credential right
//! before every engine join. A provider may legitimately answer "no
//! token required" (open projects, test environments).

use async_trait::async_trait;

use crate::engine::ClientRole;
use crate::errors::TokenError;

/// Parameters of a token request.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub channel_name: String,
    pub uid: u32,
    pub role: ClientRole,
    /// Requested token lifetime. `None` lets the provider pick.
    pub token_expiry_secs: Option<u32>,
    /// Requested privilege lifetime. `None` lets the provider pick.
    pub privilege_expiry_secs: Option<u32>,
}

impl TokenRequest {
    pub fn new(channel_name: impl Into<String>, uid: u32, role: ClientRole) -> Self {
        Self {
            channel_name: channel_name.into(),
            uid,
            role,
            token_expiry_secs: None,
            privilege_expiry_secs: None,
        }
    }
}

/// Token-provider collaborator.
///
/// `Ok(None)` means no token is required for this channel. A soft
/// [`TokenError::Unavailable`] lets the join proceed tokenless; a hard
/// [`TokenError::Rejected`] aborts it.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, request: TokenRequest) -> Result<Option<String>, TokenError>;
}

/// Provider for channels that require no authorization.
pub struct NoTokenProvider;

#[async_trait]
impl TokenProvider for NoTokenProvider {
    async fn fetch_token(&self, _request: TokenRequest) -> Result<Option<String>, TokenError> {
        Ok(None)
    }
}

/// Provider handing out one fixed token, for tests and closed setups.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, _request: TokenRequest) -> Result<Option<String>, TokenError> {
        Ok(Some(self.token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_token_provider_returns_absent() {
        let provider = NoTokenProvider;
        let req = TokenRequest::new("room", 7, ClientRole::Broadcaster);
        assert_eq!(provider.fetch_token(req).await.unwrap(), None);
    }

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new("t0k3n");
        let req = TokenRequest::new("room", 7, ClientRole::Broadcaster);
        assert_eq!(
            provider.fetch_token(req).await.unwrap().as_deref(),
            Some("t0k3n")
        );
    }
}

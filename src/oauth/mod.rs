//! OAuth2 federation adapters.
//!
//! Every provider implements one capability: resolve an access token
//! into a [`NormalizedClaim`]. Adapters never touch the credential
//! store; account creation and token issuance stay in the identity
//! core, so adding a provider means adding one resolver and one enum
//! variant.

pub mod facebook;
pub mod google;

use crate::identeco::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported provider: {0}")]
    Unsupported(String),
    #[error("user info request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status from provider: {0}")]
    Status(StatusCode),
    #[error("provider returned no email")]
    MissingEmail,
}

/// Wire payload of a federated sign-in request. `token` is the access
/// token the external client already obtained from the provider.
#[derive(Debug, Deserialize, ToSchema)]
pub struct Oauth2Payload {
    pub state: String,
    pub token: String,
}

/// Normalized identity claim produced by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedClaim {
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }
}

impl Provider {
    /// Resolve an access token into a normalized claim by calling the
    /// provider's user-info endpoint. Timeouts come from the client
    /// and surface as [`ProviderError::Request`].
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status or a
    /// response without an email.
    pub async fn resolve(
        self,
        client: &Client,
        access_token: &str,
    ) -> Result<NormalizedClaim, ProviderError> {
        match self {
            Self::Google => google::resolve(client, access_token).await,
            Self::Facebook => facebook::resolve(client, access_token).await,
        }
    }
}

/// Resolves provider access tokens into normalized claims. The
/// identity core only sees this trait; [`HttpResolver`] talks to the
/// real user-info endpoints.
#[async_trait]
pub trait ClaimResolver: Send + Sync {
    async fn resolve(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<NormalizedClaim, ProviderError>;
}

/// Production resolver backed by the shared HTTP client.
#[derive(Clone, Debug)]
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: client(timeout)?,
        })
    }
}

#[async_trait]
impl ClaimResolver for HttpResolver {
    async fn resolve(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<NormalizedClaim, ProviderError> {
        provider.resolve(&self.client, access_token).await
    }
}

/// Shared HTTP client for provider calls. The timeout bounds every
/// user-info request so a slow provider never hangs a sign-in.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub fn client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_str() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("facebook".parse::<Provider>().unwrap(), Provider::Facebook);
        assert!(matches!(
            "github".parse::<Provider>(),
            Err(ProviderError::Unsupported(name)) if name == "github"
        ));
    }

    #[test]
    fn payload_deserializes() {
        let payload: Oauth2Payload =
            serde_json::from_str(r#"{"state":"xyz","token":"ya29.a0"}"#).unwrap();
        assert_eq!(payload.state, "xyz");
        assert_eq!(payload.token, "ya29.a0");
    }
}

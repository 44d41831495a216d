//! Credential lifecycle core.
//!
//! Owns the [`Account`] entity and every lifecycle operation:
//! registration, confirmation, password sign-in, stateless password
//! reset and federated sign-in. All mutable state lives behind the
//! [`CredentialStore`] trait; the core itself is stateless per call.

pub mod account;
pub mod error;
pub mod password;
pub mod store;

pub use account::{email_domain_allowed, Account, AccountView};
pub use error::Error;
pub use store::{CredentialStore, MemoryStore, PgCredentialStore, StoreError};

use crate::oauth::{ClaimResolver, HttpResolver, Oauth2Payload, Provider};
use crate::token::{reset, session};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Values the core consumes from the configuration surface.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub allowed_domains: Vec<String>,
    pub secret: SecretString,
    pub session_ttl_hours: i64,
    pub reset_ttl: Duration,
    pub session_role: String,
    pub oauth_state: String,
    pub provider_timeout: Duration,
}

/// A signed session token plus the public view of its account.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account: AccountView,
}

pub struct Identity {
    store: Arc<dyn CredentialStore>,
    resolver: Arc<dyn ClaimResolver>,
    config: IdentityConfig,
}

fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

impl Identity {
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client cannot be built.
    pub fn new(store: Arc<dyn CredentialStore>, config: IdentityConfig) -> Result<Self, Error> {
        let resolver = Arc::new(HttpResolver::new(config.provider_timeout)?);
        Ok(Self::with_resolver(store, resolver, config))
    }

    /// Build an identity core with a caller-supplied claim resolver.
    #[must_use]
    pub fn with_resolver(
        store: Arc<dyn CredentialStore>,
        resolver: Arc<dyn ClaimResolver>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    /// Create a new unconfirmed account. The returned account carries
    /// the confirmation token the caller must deliver by email.
    ///
    /// # Errors
    ///
    /// `DomainNotAllowed`, `EmailTaken` or `HashFailure`.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, Error> {
        if !email_domain_allowed(email, &self.config.allowed_domains) {
            return Err(Error::DomainNotAllowed);
        }

        let password_hash = password::hash(password)?;
        let account = Account::new(email, password_hash);

        self.store.insert(&account).await?;

        info!(id = %account.id, "account registered");

        Ok(account)
    }

    /// Verify a password and issue a session token. A wrong password
    /// and an unknown email both come back as `NotFound`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotConfirmed` or `HashFailure`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, Error> {
        let account = self.store.find_by_email(email).await?;

        if !password::verify(&account.password_hash, password) {
            debug!("password mismatch");
            return Err(Error::NotFound);
        }

        if !account.confirmed {
            return Err(Error::NotConfirmed);
        }

        self.issue_session(&account)
    }

    /// Flip the account to confirmed, clearing the token in the same
    /// store call. Succeeds at most once per account.
    ///
    /// # Errors
    ///
    /// `NotFound` or `InvalidToken` (mismatch or already confirmed).
    #[instrument(skip(self, presented_token))]
    pub async fn confirm(&self, id: uuid::Uuid, presented_token: &str) -> Result<(), Error> {
        let account = self.store.find_by_id(id).await?;

        match account.confirmation_token.as_deref() {
            Some(token) if !account.confirmed && token == presented_token => {
                match self.store.update_confirmation(id, true, None).await {
                    Ok(()) => {
                        info!(%id, "account confirmed");
                        Ok(())
                    }
                    // a concurrent confirmation got there first
                    Err(StoreError::Conflict | StoreError::NotFound) => Err(Error::InvalidToken),
                    Err(other) => Err(other.into()),
                }
            }
            _ => Err(Error::InvalidToken),
        }
    }

    /// Issue a reset token bound to the account's current password
    /// hash. No reset state is persisted; the token invalidates itself
    /// the moment the password changes.
    ///
    /// # Errors
    ///
    /// `NotFound` or `HashFailure`.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<String, Error> {
        let account = self.store.find_by_email(email).await?;

        let token = reset::issue(
            &account.email,
            &account.password_hash,
            self.config.reset_ttl,
            self.config.secret.expose_secret().as_bytes(),
            now_unix_seconds(),
        )
        .map_err(|_| Error::HashFailure)?;

        Ok(token)
    }

    /// Validate a reset token against the *current* password hash and
    /// set the new password.
    ///
    /// # Errors
    ///
    /// `InvalidToken`, `Expired` or `HashFailure`.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
        let claims = reset::parse(token).map_err(|_| Error::InvalidToken)?;

        // Unknown subjects map to InvalidToken so the reset endpoint
        // cannot be used to probe registered emails.
        let account = match self.store.find_by_email(&claims.sub).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(Error::InvalidToken),
            Err(other) => return Err(other.into()),
        };

        reset::validate(
            token,
            self.config.secret.expose_secret().as_bytes(),
            now_unix_seconds(),
            |subject| {
                (subject == account.email).then(|| account.password_hash.clone())
            },
        )
        .map_err(|err| match err {
            reset::Error::Expired => Error::Expired,
            _ => Error::InvalidToken,
        })?;

        let password_hash = password::hash(new_password)?;
        self.store
            .update_password(account.id, &password_hash)
            .await?;

        info!(id = %account.id, "password reset");

        Ok(())
    }

    /// Sign in with a federated identity provider: check the anti-replay
    /// state, resolve the provider claim, create or reuse the account,
    /// then issue a session token exactly as `authenticate` would. A
    /// verified claim confirms a still-pending account on reuse.
    ///
    /// # Errors
    ///
    /// `StateMismatch`, `ProviderError`, `EmailTaken` or `HashFailure`.
    #[instrument(skip(self, payload))]
    pub async fn federated_sign_in(
        &self,
        provider: Provider,
        payload: &Oauth2Payload,
    ) -> Result<Session, Error> {
        // state must match before any network call
        if payload.state != self.config.oauth_state {
            return Err(Error::StateMismatch);
        }

        let claim = self.resolver.resolve(provider, &payload.token).await?;

        let account = match self.store.find_by_email(&claim.email).await {
            Ok(mut account) => {
                // a verified claim confirms a still-pending account, the
                // provider has proven ownership of the email
                if !account.confirmed && claim.email_verified {
                    match self.store.update_confirmation(account.id, true, None).await {
                        Ok(()) | Err(StoreError::Conflict) => {}
                        Err(other) => return Err(other.into()),
                    }
                    account.confirmed = true;
                    account.confirmation_token = None;
                    info!(id = %account.id, ?provider, "account confirmed by provider claim");
                }
                account
            }
            Err(StoreError::NotFound) => {
                // password-capable hash of a random value never told to anyone
                let mut bytes = [0u8; 32];
                OsRng
                    .try_fill_bytes(&mut bytes)
                    .map_err(|_| Error::HashFailure)?;
                let password_hash =
                    password::hash(&Base64UrlUnpadded::encode_string(&bytes))?;

                let account =
                    Account::from_claim(&claim.email, password_hash, claim.email_verified);
                self.store.insert(&account).await?;

                info!(id = %account.id, ?provider, "account created from provider claim");

                account
            }
            Err(other) => return Err(other.into()),
        };

        self.issue_session(&account)
    }

    fn issue_session(&self, account: &Account) -> Result<Session, Error> {
        let claims = session::SessionClaims::new(
            account.id.to_string(),
            &account.email,
            &self.config.session_role,
            self.config.session_ttl_hours,
            now_unix_seconds(),
        );

        let token = session::sign(&claims, self.config.secret.expose_secret().as_bytes())
            .map_err(|_| Error::HashFailure)?;

        Ok(Session {
            token,
            account: account.view(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity(allowed_domains: Vec<String>) -> Identity {
        let config = IdentityConfig {
            allowed_domains,
            secret: SecretString::from("supersecret".to_string()),
            session_ttl_hours: 24,
            reset_ttl: Duration::from_secs(3600),
            session_role: "normal_user".to_string(),
            oauth_state: "expected-state".to_string(),
            provider_timeout: Duration::from_secs(1),
        };
        Identity::new(Arc::new(MemoryStore::new()), config).unwrap()
    }

    #[tokio::test]
    async fn register_rejects_disallowed_domain() {
        let identity = test_identity(vec!["example.org".to_string()]);
        let result = identity.register("a@example.com", "hunter2hunter2").await;
        assert!(matches!(result, Err(Error::DomainNotAllowed)));
    }

    #[tokio::test]
    async fn register_allows_listed_domain() {
        let identity = test_identity(vec!["example.com".to_string()]);
        let account = identity
            .register("a@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert!(!account.confirmed);
        assert!(account.confirmation_token.is_some());
    }

    #[tokio::test]
    async fn state_mismatch_fails_before_any_network_call() {
        let identity = test_identity(vec![]);
        let payload = Oauth2Payload {
            state: "wrong-state".to_string(),
            token: "access-token".to_string(),
        };

        // no provider endpoint is reachable in tests; a mismatch must
        // short-circuit before resolve is ever attempted
        let result = identity
            .federated_sign_in(Provider::Google, &payload)
            .await;
        assert!(matches!(result, Err(Error::StateMismatch)));
    }
}

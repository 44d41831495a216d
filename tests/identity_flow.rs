use async_trait::async_trait;
use chrono::Utc;
use identeco::identity::{
    password, CredentialStore, Error, Identity, IdentityConfig, MemoryStore,
};
use identeco::oauth::{
    ClaimResolver, NormalizedClaim, Oauth2Payload, Provider, ProviderError,
};
use identeco::token::session;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "supersecret";

fn test_config() -> IdentityConfig {
    IdentityConfig {
        allowed_domains: vec![],
        secret: SecretString::from(SECRET.to_string()),
        session_ttl_hours: 24,
        reset_ttl: Duration::from_secs(3600),
        session_role: "normal_user".to_string(),
        oauth_state: "expected-state".to_string(),
        provider_timeout: Duration::from_secs(1),
    }
}

fn identity_over(store: Arc<MemoryStore>) -> Identity {
    Identity::new(store, test_config()).unwrap()
}

/// Resolver returning one canned claim, standing in for a provider's
/// user-info endpoint.
struct StaticResolver {
    claim: NormalizedClaim,
}

#[async_trait]
impl ClaimResolver for StaticResolver {
    async fn resolve(
        &self,
        _provider: Provider,
        _access_token: &str,
    ) -> Result<NormalizedClaim, ProviderError> {
        Ok(self.claim.clone())
    }
}

fn identity_with_claim(store: Arc<MemoryStore>, claim: NormalizedClaim) -> Identity {
    Identity::with_resolver(store, Arc::new(StaticResolver { claim }), test_config())
}

fn oauth_payload() -> Oauth2Payload {
    Oauth2Payload {
        state: "expected-state".to_string(),
        token: "access-token".to_string(),
    }
}

#[tokio::test]
async fn signup_then_signin_requires_confirmation() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    let account = identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    assert!(!account.confirmed);

    let result = identity
        .authenticate("alice@example.com", "hunter2hunter2")
        .await;
    assert!(matches!(result, Err(Error::NotConfirmed)));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    let result = identity
        .register("alice@example.com", "other-password")
        .await;
    assert!(matches!(result, Err(Error::EmailTaken)));
}

#[tokio::test]
async fn confirmation_succeeds_exactly_once() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    let account = identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    let token = account.confirmation_token.clone().unwrap();

    assert!(matches!(
        identity.confirm(account.id, "wrong-token").await,
        Err(Error::InvalidToken)
    ));

    identity.confirm(account.id, &token).await.unwrap();

    // token was cleared by the first confirmation
    assert!(matches!(
        identity.confirm(account.id, &token).await,
        Err(Error::InvalidToken)
    ));
}

#[tokio::test]
async fn signin_issues_a_valid_session_token() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    let account = identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    let token = account.confirmation_token.clone().unwrap();
    identity.confirm(account.id, &token).await.unwrap();

    let session = identity
        .authenticate("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    assert_eq!(session.account.email, "alice@example.com");

    let claims = session::verify(
        &session.token,
        SECRET.as_bytes(),
        Utc::now().timestamp(),
    )
    .unwrap();
    assert_eq!(claims.userid, account.id.to_string());
    assert_eq!(claims.email, "alice@example.com");
    assert_eq!(claims.role, "normal_user");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    let account = identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    let token = account.confirmation_token.clone().unwrap();
    identity.confirm(account.id, &token).await.unwrap();

    let wrong_password = identity
        .authenticate("alice@example.com", "wrong-password")
        .await;
    let unknown_email = identity
        .authenticate("nobody@example.com", "hunter2hunter2")
        .await;

    assert!(matches!(wrong_password, Err(Error::NotFound)));
    assert!(matches!(unknown_email, Err(Error::NotFound)));
}

#[tokio::test]
async fn reset_token_round_trip_is_single_use() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    identity
        .register("alice@example.com", "old-password-123")
        .await
        .unwrap();

    let token = identity
        .request_password_reset("alice@example.com")
        .await
        .unwrap();

    identity
        .reset_password(&token, "new-password-456")
        .await
        .unwrap();

    // the binding secret changed with the password, so the same token
    // no longer validates
    let reuse = identity.reset_password(&token, "sneaky-password").await;
    assert!(matches!(reuse, Err(Error::InvalidToken)));
}

#[tokio::test]
async fn reset_updates_the_stored_password() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    let account = identity
        .register("alice@example.com", "old-password-123")
        .await
        .unwrap();
    let confirm_token = account.confirmation_token.clone().unwrap();
    identity.confirm(account.id, &confirm_token).await.unwrap();

    let token = identity
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    identity
        .reset_password(&token, "new-password-456")
        .await
        .unwrap();

    assert!(matches!(
        identity
            .authenticate("alice@example.com", "old-password-123")
            .await,
        Err(Error::NotFound)
    ));
    identity
        .authenticate("alice@example.com", "new-password-456")
        .await
        .unwrap();
}

#[tokio::test]
async fn unrelated_password_change_invalidates_reset_token() {
    let store = Arc::new(MemoryStore::new());
    let identity = identity_over(store.clone());

    let account = identity
        .register("alice@example.com", "old-password-123")
        .await
        .unwrap();

    let token = identity
        .request_password_reset("alice@example.com")
        .await
        .unwrap();

    // password changed through another path, not via this token
    let new_hash = password::hash("changed-elsewhere").unwrap();
    store.update_password(account.id, &new_hash).await.unwrap();

    let result = identity.reset_password(&token, "new-password-456").await;
    assert!(matches!(result, Err(Error::InvalidToken)));
}

#[tokio::test]
async fn reset_token_for_unknown_account_is_invalid() {
    let identity = identity_over(Arc::new(MemoryStore::new()));

    assert!(matches!(
        identity.reset_password("garbage", "new-password").await,
        Err(Error::InvalidToken)
    ));

    let unknown = identity.request_password_reset("nobody@example.com").await;
    assert!(matches!(unknown, Err(Error::NotFound)));
}

#[tokio::test]
async fn federated_sign_in_creates_a_confirmed_account() {
    let store = Arc::new(MemoryStore::new());
    let identity = identity_with_claim(
        store.clone(),
        NormalizedClaim {
            email: "alice@example.com".to_string(),
            email_verified: true,
        },
    );

    let session = identity
        .federated_sign_in(Provider::Google, &oauth_payload())
        .await
        .unwrap();
    assert_eq!(session.account.email, "alice@example.com");

    let account = store.find_by_email("alice@example.com").await.unwrap();
    assert!(account.confirmed);
    assert!(account.confirmation_token.is_none());

    let claims = session::verify(&session.token, SECRET.as_bytes(), Utc::now().timestamp())
        .unwrap();
    assert_eq!(claims.email, "alice@example.com");
    assert_eq!(claims.role, "normal_user");
}

#[tokio::test]
async fn federated_sign_in_confirms_a_pending_account() {
    let store = Arc::new(MemoryStore::new());
    let identity = identity_over(store.clone());

    let account = identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
    assert!(!account.confirmed);

    let federated = identity_with_claim(
        store.clone(),
        NormalizedClaim {
            email: "alice@example.com".to_string(),
            email_verified: true,
        },
    );
    let session = federated
        .federated_sign_in(Provider::Google, &oauth_payload())
        .await
        .unwrap();
    assert_eq!(session.account.id, account.id);

    // the provider proved ownership of the email, so the pending
    // confirmation is done and the token is gone
    let stored = store.find_by_email("alice@example.com").await.unwrap();
    assert!(stored.confirmed);
    assert!(stored.confirmation_token.is_none());

    // password sign-in no longer reports an unconfirmed account
    identity
        .authenticate("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();
}

#[tokio::test]
async fn federated_sign_in_with_unverified_claim_keeps_account_pending() {
    let store = Arc::new(MemoryStore::new());
    let identity = identity_over(store.clone());

    identity
        .register("alice@example.com", "hunter2hunter2")
        .await
        .unwrap();

    let federated = identity_with_claim(
        store.clone(),
        NormalizedClaim {
            email: "alice@example.com".to_string(),
            email_verified: false,
        },
    );
    federated
        .federated_sign_in(Provider::Google, &oauth_payload())
        .await
        .unwrap();

    let stored = store.find_by_email("alice@example.com").await.unwrap();
    assert!(!stored.confirmed);
    assert!(stored.confirmation_token.is_some());
}

#[tokio::test]
async fn federated_sign_in_reuses_an_existing_account() {
    let store = Arc::new(MemoryStore::new());
    let federated = identity_with_claim(
        store.clone(),
        NormalizedClaim {
            email: "alice@example.com".to_string(),
            email_verified: true,
        },
    );

    let first = federated
        .federated_sign_in(Provider::Google, &oauth_payload())
        .await
        .unwrap();
    let second = federated
        .federated_sign_in(Provider::Facebook, &oauth_payload())
        .await
        .unwrap();

    // one account serves both sign-ins
    assert_eq!(first.account.id, second.account.id);
}

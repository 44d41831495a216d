use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// The persisted identity record.
///
/// `confirmation_token` is present only while `confirmed` is false and
/// is cleared in the same store call that flips the flag. There is no
/// reset-token field: reset tokens are derived from the password hash,
/// not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub confirmation_token: Option<String>,
}

impl Account {
    /// New unconfirmed account with a fresh confirmation token.
    #[must_use]
    pub fn new(email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash,
            confirmed: false,
            confirmation_token: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Account created from a federation claim: confirmed state comes
    /// from the provider's verified-email flag, a token is only needed
    /// when confirmation is still pending.
    #[must_use]
    pub fn from_claim(email: impl Into<String>, password_hash: String, verified: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash,
            confirmed: verified,
            confirmation_token: if verified {
                None
            } else {
                Some(Uuid::new_v4().to_string())
            },
        }
    }

    #[must_use]
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

/// Public representation of an account, without secret material.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
}

/// Check an email's domain against the signup allow-list. An empty
/// list allows every domain; matching is case-insensitive on the part
/// after `@`.
#[must_use]
pub fn email_domain_allowed(email: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }

    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };

    allowed_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
}

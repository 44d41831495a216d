use crate::oauth::{NormalizedClaim, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const USERINFO_URL: &str = "https://graph.facebook.com/me";

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: Option<String>,
    email: Option<String>,
}

pub(super) async fn resolve(
    client: &Client,
    access_token: &str,
) -> Result<NormalizedClaim, ProviderError> {
    let response = client
        .get(USERINFO_URL)
        .query(&[("fields", "email"), ("access_token", access_token)])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status()));
    }

    let user: FacebookUser = response.json().await?;

    debug!(id = ?user.id, "facebook user info");

    let email = user.email.ok_or(ProviderError::MissingEmail)?;

    // The Graph API only returns emails Facebook has already verified.
    Ok(NormalizedClaim {
        email,
        email_verified: true,
    })
}

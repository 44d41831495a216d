use crate::oauth::{NormalizedClaim, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
}

pub(super) async fn resolve(
    client: &Client,
    access_token: &str,
) -> Result<NormalizedClaim, ProviderError> {
    let response = client
        .get(USERINFO_URL)
        .query(&[("access_token", access_token)])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status()));
    }

    let user: GoogleUser = response.json().await?;

    debug!(verified_email = user.verified_email, "google user info");

    // email missing usually means the token lacks the email scope
    let email = user.email.ok_or(ProviderError::MissingEmail)?;

    Ok(NormalizedClaim {
        email,
        email_verified: user.verified_email,
    })
}

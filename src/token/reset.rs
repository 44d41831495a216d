//! Password-reset tokens.
//!
//! A reset token is self-contained: it carries the subject (the account
//! email) and an absolute expiry, and its MAC is keyed by the server
//! secret over the payload plus the account's *current* password hash.
//! Changing the password changes the binding secret, so every token
//! issued before the change stops validating. Nothing is persisted.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid mac key")]
    MacKey,
    #[error("unknown subject")]
    UnknownSubject,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Decoded but not yet verified token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetClaims {
    pub sub: String,
    pub exp: i64,
}

fn mac_for(payload_b64: &str, binding_secret: &str, server_secret: &[u8]) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(server_secret).map_err(|_| Error::MacKey)?;
    mac.update(payload_b64.as_bytes());
    mac.update(b".");
    mac.update(binding_secret.as_bytes());
    Ok(mac)
}

/// Issue a reset token for `subject`, bound to `binding_secret` (the
/// account's current password hash).
///
/// # Errors
///
/// Returns an error if the payload cannot be encoded or the secret
/// cannot key the MAC.
pub fn issue(
    subject: &str,
    binding_secret: &str,
    ttl: Duration,
    server_secret: &[u8],
    now_unix_seconds: i64,
) -> Result<String, Error> {
    let claims = ResetClaims {
        sub: subject.to_string(),
        exp: now_unix_seconds + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
    };
    let payload_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claims)?);

    let mac = mac_for(&payload_b64, binding_secret, server_secret)?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{payload_b64}.{signature_b64}"))
}

/// Decode the payload of a token without verifying it. Used to learn
/// which account's binding secret to fetch before calling [`validate`].
///
/// # Errors
///
/// Returns an error if the token is malformed.
pub fn parse(token: &str) -> Result<ResetClaims, Error> {
    let mut parts = token.split('.');
    let payload_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let _sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Validate a reset token and return its subject.
///
/// Expiry is checked first, then the MAC is recomputed with the binding
/// secret returned by `lookup` for the embedded subject. A stale
/// binding secret (password changed since issuance) fails with
/// [`Error::InvalidSignature`].
///
/// # Errors
///
/// Returns an error if the token is malformed, expired, the subject is
/// unknown to `lookup`, or the MAC does not match.
pub fn validate<F>(
    token: &str,
    server_secret: &[u8],
    now_unix_seconds: i64,
    lookup: F,
) -> Result<String, Error>
where
    F: FnOnce(&str) -> Option<String>,
{
    let mut parts = token.split('.');
    let payload_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| Error::Base64)?;
    let claims: ResetClaims = serde_json::from_slice(&bytes)?;

    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    let binding_secret = lookup(&claims.sub).ok_or(Error::UnknownSubject)?;

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mac = mac_for(payload_b64, &binding_secret, server_secret)?;
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    Ok(claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"supersecret";
    const HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA";

    #[test]
    fn round_trip() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(3600),
            SECRET,
            now,
        )
        .unwrap();

        let subject = validate(&token, SECRET, now, |sub| {
            assert_eq!(sub, "alice@example.com");
            Some(HASH.to_string())
        })
        .unwrap();
        assert_eq!(subject, "alice@example.com");
    }

    #[test]
    fn expired_even_if_password_unchanged() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(3600),
            SECRET,
            now,
        )
        .unwrap();

        let result = validate(&token, SECRET, now + 3601, |_| Some(HASH.to_string()));
        assert!(matches!(result, Err(Error::Expired)));
    }

    #[test]
    fn password_change_invalidates_token() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(3600),
            SECRET,
            now,
        )
        .unwrap();

        // binding secret rotated since issuance
        let result = validate(&token, SECRET, now, |_| Some("$argon2id$other".to_string()));
        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn wrong_server_secret_is_invalid() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(3600),
            SECRET,
            now,
        )
        .unwrap();

        let result = validate(&token, b"othersecret", now, |_| Some(HASH.to_string()));
        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(3600),
            SECRET,
            now,
        )
        .unwrap();

        let result = validate(&token, SECRET, now, |_| None);
        assert!(matches!(result, Err(Error::UnknownSubject)));
    }

    #[test]
    fn parse_exposes_subject_and_expiry() {
        let now = 1_700_000_000;
        let token = issue(
            "alice@example.com",
            HASH,
            Duration::from_secs(60),
            SECRET,
            now,
        )
        .unwrap();

        let claims = parse(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.exp, now + 60);
        assert!(parse("garbage").is_err());
    }
}

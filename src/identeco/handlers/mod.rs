pub mod health;
pub use self::health::health;

pub mod signup;
pub use self::signup::signup;

pub mod signin;
pub use self::signin::signin;

pub mod confirm;
pub use self::confirm::confirm;

pub mod reset;
pub use self::reset::{request_reset, reset};

pub mod provider;
pub use self::provider::provider_sign_in;

// common functions for the handlers
use crate::identity::Error;
use axum::{http::StatusCode, Json};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Link builder for outbound emails. Templates come from the
/// configuration surface, `{id}` and `{token}` placeholders are
/// substituted, so front-ends with their own routing keep control of
/// the final URL shape.
#[derive(Clone, Debug)]
pub struct Links {
    confirm_template: String,
    reset_template: String,
}

impl Links {
    #[must_use]
    pub fn new(confirm_template: &str, reset_template: &str) -> Self {
        Self {
            confirm_template: confirm_template.to_string(),
            reset_template: reset_template.to_string(),
        }
    }

    #[must_use]
    pub fn confirm_url(&self, id: Uuid, token: &str) -> String {
        self.confirm_template
            .replace("{id}", &id.to_string())
            .replace("{token}", token)
    }

    #[must_use]
    pub fn reset_url(&self, token: &str) -> String {
        self.reset_template.replace("{token}", token)
    }
}

/// Map a core error to a generic boundary response. The real cause is
/// logged here; the caller only ever sees the collapsed message.
pub(crate) fn error_response(err: &Error) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        Error::NotFound => (StatusCode::NOT_FOUND, "Unable to find your account"),
        Error::EmailTaken => (
            StatusCode::CONFLICT,
            "An account with this email already exists",
        ),
        Error::DomainNotAllowed => (
            StatusCode::BAD_REQUEST,
            "You're not allowed to create an account with the provided email address",
        ),
        Error::NotConfirmed => (StatusCode::UNAUTHORIZED, "Please confirm your account"),
        Error::InvalidToken | Error::Expired => {
            (StatusCode::FORBIDDEN, "Invalid or expired token")
        }
        Error::StateMismatch => (StatusCode::BAD_REQUEST, "Invalid oauth state"),
        Error::Provider(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An error occurred while contacting the identity provider",
        ),
        Error::HashFailure | Error::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred",
        ),
    };

    if status.is_server_error() {
        error!("request failed: {err}");
    } else {
        debug!("request rejected: {err}");
    }

    (status, Json(json!({ "message": message })))
}

use crate::identeco::{
    email::{confirm_email_body, EmailSendRequest, Mailer},
    handlers::{error_response, valid_email, Links},
};
use crate::identity::Identity;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Signup {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = Signup,
    responses(
        (status = 201, description = "Account created, confirmation email queued"),
        (status = 400, description = "Invalid email, password or disallowed domain"),
        (status = 409, description = "An account with this email already exists"),
    ),
    tag = "signup"
)]
#[instrument(skip_all)]
pub async fn signup(
    identity: Extension<Arc<Identity>>,
    mailer: Extension<Mailer>,
    links: Extension<Links>,
    payload: Option<Json<Signup>>,
) -> impl IntoResponse {
    let Some(Json(signup)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing payload" })),
        );
    };

    if !valid_email(&signup.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid email" })),
        );
    }

    if signup.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid password" })),
        );
    }

    match identity.register(&signup.email, &signup.password).await {
        Ok(account) => {
            let token = account.confirmation_token.clone().unwrap_or_default();
            let link = links.confirm_url(account.id, &token);

            mailer.enqueue(EmailSendRequest {
                to: account.email.clone(),
                subject: "Please confirm your account".to_string(),
                body_html: confirm_email_body(&link),
            });

            (
                StatusCode::CREATED,
                Json(json!({ "id": account.id, "success": true })),
            )
        }
        Err(err) => error_response(&err),
    }
}

use crate::identeco::{
    email::{reset_email_body, EmailSendRequest, Mailer},
    handlers::{error_response, valid_email, Links},
};
use crate::identity::Identity;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetRequest {
    email: String,
}

#[utoipa::path(
    post,
    path = "/reset",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Reset email queued"),
        (status = 404, description = "Unknown account"),
    ),
    tag = "reset"
)]
#[instrument(skip_all)]
pub async fn request_reset(
    identity: Extension<Arc<Identity>>,
    mailer: Extension<Mailer>,
    links: Extension<Links>,
    payload: Option<Json<ResetRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing payload" })),
        );
    };

    if !valid_email(&request.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid email" })),
        );
    }

    match identity.request_password_reset(&request.email).await {
        Ok(token) => {
            mailer.enqueue(EmailSendRequest {
                to: request.email.clone(),
                subject: "Here is your reset link".to_string(),
                body_html: reset_email_body(&links.reset_url(&token)),
            });

            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(err) => error_response(&err),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetSubmit {
    password: String,
}

#[utoipa::path(
    post,
    path = "/reset/{token}",
    request_body = ResetSubmit,
    params(
        ("token" = String, Path, description = "Reset token from the email link"),
    ),
    responses(
        (status = 200, description = "Password updated"),
        (status = 403, description = "Invalid or expired token"),
    ),
    tag = "reset"
)]
#[instrument(skip_all)]
pub async fn reset(
    identity: Extension<Arc<Identity>>,
    Path(token): Path<String>,
    payload: Option<Json<ResetSubmit>>,
) -> impl IntoResponse {
    let Some(Json(submit)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing payload" })),
        );
    };

    if submit.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid password" })),
        );
    }

    match identity.reset_password(&token, &submit.password).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(err) => error_response(&err),
    }
}

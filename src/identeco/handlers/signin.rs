use crate::identeco::handlers::{error_response, valid_email};
use crate::identity::Identity;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Signin {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/signin",
    request_body = Signin,
    responses(
        (status = 200, description = "Login successful, session token issued"),
        (status = 401, description = "Account not confirmed"),
        (status = 404, description = "Unknown email or wrong password"),
    ),
    tag = "signin"
)]
#[instrument(skip_all)]
pub async fn signin(
    identity: Extension<Arc<Identity>>,
    payload: Option<Json<Signin>>,
) -> impl IntoResponse {
    let Some(Json(signin)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing payload" })),
        );
    };

    if !valid_email(&signin.email) || signin.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid email or password" })),
        );
    }

    match identity.authenticate(&signin.email, &signin.password).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({ "user": session.account, "token": session.token })),
        ),
        Err(err) => error_response(&err),
    }
}

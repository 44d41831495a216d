use crate::identeco::handlers::error_response;
use crate::identity::Identity;
use crate::oauth::{Oauth2Payload, Provider};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/provider/{provider}",
    request_body = Oauth2Payload,
    params(
        ("provider" = String, Path, description = "Identity provider tag, e.g. google"),
    ),
    responses(
        (status = 200, description = "Sign-in successful, session token issued"),
        (status = 400, description = "Unsupported provider or oauth state mismatch"),
    ),
    tag = "provider"
)]
#[instrument(skip_all, fields(provider = %provider))]
pub async fn provider_sign_in(
    identity: Extension<Arc<Identity>>,
    Path(provider): Path<String>,
    payload: Option<Json<Oauth2Payload>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing payload" })),
        );
    };

    let Ok(provider) = provider.parse::<Provider>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("{provider} provider is not supported") })),
        );
    };

    match identity.federated_sign_in(provider, &payload).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({ "user": session.account, "token": session.token })),
        ),
        Err(err) => error_response(&err),
    }
}

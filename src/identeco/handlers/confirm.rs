use crate::identeco::handlers::error_response;
use crate::identity::Identity;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConfirmParams {
    token: String,
}

#[utoipa::path(
    get,
    path = "/confirm/{id}",
    params(
        ("id" = Uuid, Path, description = "Account id"),
        ConfirmParams,
    ),
    responses(
        (status = 200, description = "Account confirmed"),
        (status = 403, description = "Token mismatch or already confirmed"),
        (status = 404, description = "Unknown account"),
    ),
    tag = "confirm"
)]
#[instrument(skip_all, fields(id = %id))]
pub async fn confirm(
    identity: Extension<Arc<Identity>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ConfirmParams>,
) -> impl IntoResponse {
    match identity.confirm(id, &params.token).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(err) => error_response(&err),
    }
}

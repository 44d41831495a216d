use crate::{
    cli::globals::Config,
    identeco::email::{spawn_sender_worker, LogEmailSender, Mailer},
    identeco::handlers::Links,
    identity::{Identity, IdentityConfig, PgCredentialStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod email;
pub(crate) mod handlers;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::signup::signup,
        handlers::signin::signin,
        handlers::confirm::confirm,
        handlers::reset::request_reset,
        handlers::reset::reset,
        handlers::provider::provider_sign_in,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::signup::Signup,
        handlers::signin::Signin,
        handlers::reset::ResetRequest,
        handlers::reset::ResetSubmit,
        crate::identity::AccountView,
        crate::oauth::Oauth2Payload,
    )),
    tags(
        (name = "identeco", description = "Authentication API for PostgREST backends")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: Config) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgCredentialStore::new(pool);
    store
        .ensure_schema(&config.role_anonymous, &config.role_user)
        .await
        .context("Failed to bootstrap the auth schema")?;

    let identity = Arc::new(Identity::new(
        Arc::new(store),
        IdentityConfig {
            allowed_domains: config.allowed_domains.clone(),
            secret: config.secret.clone(),
            session_ttl_hours: config.session_ttl_hours,
            reset_ttl: config.reset_ttl,
            session_role: config.role_user.clone(),
            oauth_state: config.oauth_state.clone(),
            provider_timeout: config.provider_timeout,
        },
    )?);

    let (mailer, mail_worker) = spawn_sender_worker(Arc::new(LogEmailSender), 100);

    let links = Links::new(&config.link_confirm, &config.link_reset);

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    let app = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/signin", post(handlers::signin))
        .route("/confirm/:id", get(handlers::confirm))
        .route("/reset", post(handlers::request_reset))
        .route("/reset/:token", post(handlers::reset))
        .route("/provider/:provider", post(handlers::provider_sign_in))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(identity))
                .layer(Extension(mailer.clone()))
                .layer(Extension(links)),
        )
        .route("/health", get(handlers::health).options(handlers::health));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    // closing the queue lets the worker drain and stop
    drop(mailer);
    mail_worker.await.ok();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

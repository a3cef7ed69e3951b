//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod auth;
mod contracts;
mod dashboard;
mod harvests;
mod qa;
mod sources;
mod voting;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Everything below needs a bearer token
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/role/{user_id}", put(auth::update_role))
        // Sources
        .route(
            "/api/sources",
            get(sources::list_sources).post(sources::propose_source),
        )
        .route(
            "/api/sources/{id}",
            get(sources::get_source).put(sources::update_source),
        )
        .route("/api/sources/{id}/seeds", post(sources::add_seed))
        .route("/api/seeds/{id}", put(sources::update_seed))
        // Voting
        .route("/api/sources/{id}/voting-rounds", post(voting::reopen_round))
        .route("/api/voting-rounds/{id}", get(voting::get_round))
        .route("/api/voting-rounds/{id}/votes", post(voting::cast_vote))
        .route("/api/voting-rounds/{id}/resolve", post(voting::resolve_round))
        // Contracts
        .route("/api/sources/{id}/contracts", post(contracts::create_contract))
        .route("/api/contracts", get(contracts::list_contracts))
        .route(
            "/api/contracts/{id}",
            get(contracts::get_contract).put(contracts::edit_contract),
        )
        .route("/api/contracts/{id}/drafts", get(contracts::email_drafts))
        .route("/api/contracts/{id}/emails", put(contracts::save_schedule))
        // QA
        .route(
            "/api/sources/{id}/qa",
            get(sources::list_qa).post(qa::open_check),
        )
        .route("/api/qa/{id}/close", post(qa::close_check))
        // Harvests
        .route(
            "/api/harvests",
            get(harvests::list_harvests).post(harvests::create_harvest),
        )
        .route("/api/harvests/{id}", get(harvests::get_harvest))
        // Dashboard
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/dashboard/{card}", get(dashboard::card))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/refresh", post(auth::refresh))
        .merge(protected)
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = Settings::default();
        let state = AppState::new(Arc::new(MemoryStore::new()), &settings).unwrap();
        create_router(Arc::new(state), &settings)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/api/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_then_dashboard() {
        let app = app();
        let register = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"email":"jana@archive.example","password":"correct horse","name":"Jana"}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(register).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let token = json["tokens"]["accessToken"].as_str().unwrap().to_string();

        let dashboard = Request::builder()
            .uri("/api/dashboard")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(dashboard).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_curator_cannot_plan_harvest() {
        let app = app();
        let register = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"email":"petr@archive.example","password":"correct horse","name":"Petr"}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(register).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let token = json["tokens"]["accessToken"].as_str().unwrap().to_string();

        let plan = Request::builder()
            .method(Method::POST)
            .uri("/api/harvests")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"title":"Weekly crawl","scheduledOn":"2999-01-01","targetFrequency":52}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(plan).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let list = Request::builder()
            .uri("/api/harvests")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(list).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

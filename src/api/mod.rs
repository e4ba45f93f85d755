//! HTTP API.
//!
//! The [`router`] wires the resource routes to the shared [`AppState`] and
//! wraps them in tracing, CORS, request counting, API-key and rate-limit
//! middleware (outermost first). Trailing slashes are trimmed before routing,
//! so `/accounts/` and `/accounts` reach the same handler.

mod error;
pub mod middleware;
mod routes;
mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{middleware as axum_middleware, Router};
use tower::Layer;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::{ApiError, ApiResult, ValidJson, ValidPath, ValidQuery};
pub use state::{AppState, LiveMailbox, TokenFileMailbox};

/// The application service returned by [`router`].
pub type App = NormalizePath<Router>;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> App {
    let routes = Router::new()
        .merge(routes::system::routes())
        .nest("/accounts", routes::accounts::routes())
        .nest("/categories", routes::categories::routes())
        .nest("/templates", routes::templates::routes())
        .nest("/categorize", routes::categorize::routes())
        .nest("/gmail", routes::gmail::routes())
        .nest("/threads", routes::threads::routes())
        .nest("/scheduler", routes::scheduler::routes())
        .nest("/assistant", routes::assistant::routes())
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::require_api_key,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::track_metrics,
        ))
        .layer(cors_layer(&state.settings.server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    NormalizePathLayer::trim_trailing_slash().layer(routes)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

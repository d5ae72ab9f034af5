use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::server::routes;
use crate::server::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.server_config.body_limit_bytes();
    let cors_layer = build_cors_layer(state.server_config.cors.as_ref());

    Router::new()
        .route("/api/v1/notifications", post(routes::ingest))
        .route("/health/liveness", get(routes::liveness))
        .route("/health/readiness", get(routes::readiness))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(cors_layer)
}

pub fn bind_address(state: &AppState) -> Result<SocketAddr, std::net::AddrParseError> {
    state.server_config.bind().parse()
}

fn build_cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
    let Some(config) = config else {
        return CorsLayer::new().allow_origin(Any);
    };
    if config.allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(Any);
    }
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(origins)
}

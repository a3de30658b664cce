mod market_data;

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, error::ApiError, main_lib::AppState};

pub async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {}", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .merge(market_data::router())
        .fallback(not_found);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}

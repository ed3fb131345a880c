// handlers/mod.rs - HTTP surface of the binary
//
// Only health and sign-up are routed here; everything else reaches the repositories
// through callers outside this crate.

pub mod health;
pub mod signup;
pub mod state;

pub use health::health;
pub use signup::signup;
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .with_state(state);

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    if config.security.enable_cors {
        router.layer(cors_layer(&config.security))
    } else {
        router
    }
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

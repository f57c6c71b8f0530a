pub mod health;
pub mod scripts;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                 liveness (GET)
/// /scripts                list processors (GET)
/// /execute                upload + run (POST, multipart)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(scripts::router(config.max_upload_bytes))
}

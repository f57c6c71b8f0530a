//! Route definitions for processor listing and execution.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::scripts;
use crate::state::AppState;

/// Room for multipart boundaries, headers and the `script` field on top of
/// the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// ```text
/// GET    /scripts   -> list_scripts
/// POST   /execute   -> execute_script  (multipart: file, script)
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/scripts", get(scripts::list_scripts))
        .route(
            "/execute",
            post(scripts::execute_script).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
}

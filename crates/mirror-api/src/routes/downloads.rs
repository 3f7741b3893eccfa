//! Download routes.
//!
//! Route parameters only select a handler; the file itself is identified
//! from the full request path and query, so every pattern shares one
//! handler.

use axum::extract::State;
use axum::http::Uri;
use axum::routing::get;
use axum::Router;
use mirror_core::identify;

use crate::error::AppError;
use crate::orchestrator::Download;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{file}", get(download))
        .route("/plugin/{file}", get(download))
        .route("/theme/{file}", get(download))
        .route("/{slug}/assets/{file}", get(download))
}

/// GET a mirrored file: a stored copy, or the origin's bytes proxied live.
async fn download(State(state): State<AppState>, uri: Uri) -> Result<Download, AppError> {
    let descriptor = identify(uri.path(), uri.query())?;
    state.orchestrator.download(descriptor).await
}

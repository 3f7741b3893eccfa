//! # mirror-api: HTTP Service for the Asset Mirror
//!
//! Serves core, plugin, theme and plugin-asset files. A cached file is
//! streamed from the storage backend; a missing one is proxied live from the
//! origin while a population task is enqueued for the worker pool.
//!
//! ## API Surface
//!
//! | Pattern | Module | Auth |
//! |---------|--------|------|
//! | `/{name}-{version}.zip`, `/plugin/*`, `/theme/*`, `/{slug}/assets/*` | [`routes::downloads`] | bearer (optional) |
//! | `/plugins/info/1.2` | [`routes::plugins`] | bearer (optional) |
//! | `/health/liveness`, `/health/readiness` | this module | none |
//! | `/metrics` | this module | none |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::config::LogFormat;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the auth middleware so
/// they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics_on = state.config.metrics_enabled;

    let mut api = routes::router().layer(from_fn(auth::auth_middleware));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(axum::Extension(state.metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated =
            unauthenticated.route("/metrics", axum::routing::get(prometheus_metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready" when the registry answers, else 503.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.registry.health_check().await {
        tracing::warn!("Registry health check failed: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "registry unreachable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

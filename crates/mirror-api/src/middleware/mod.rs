//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics.
//!
//! Request tracing uses `tower_http::trace::TraceLayer` directly; bearer
//! authentication lives in [`crate::auth`].

pub mod metrics;

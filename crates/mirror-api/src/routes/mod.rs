//! # Route Modules
//!
//! | Pattern | Module |
//! |---------|--------|
//! | `/{name}-{version}.(zip\|tar.gz)` | [`downloads`] (core) |
//! | `/plugin/{file}.zip`, `/theme/{file}.zip` | [`downloads`] |
//! | `/{slug}/assets/{file}` | [`downloads`] (images) |
//! | `/plugins/info/1.2` | [`plugins`] |

pub mod downloads;
pub mod plugins;

use axum::Router;

use crate::state::AppState;

/// All authenticated routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(downloads::router())
        .merge(plugins::router())
}

//! # Plugin Information API
//!
//! A thin `plugins/info/1.2` endpoint answered from the registry: it only
//! knows the versions this mirror has cached, not the origin's full plugin
//! metadata.
//!
//! | `action` | Response |
//! |----------|----------|
//! | `plugin_information` | one plugin with its cached versions |
//! | `query_plugins` | paginated list of cached plugins |
//! | `hot_tags`, `popular_tags` | `{}` (tags are not mirrored) |
//!
//! Errors use the flat `{"error": "..."}` body that API clients of this
//! endpoint expect.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use mirror_core::{compare_versions, AssetKind, AssetRecord};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 24;
const MAX_PER_PAGE: u32 = 250;

pub fn router() -> Router<AppState> {
    Router::new().route("/plugins/info/1.2", get(plugin_info))
}

/// Query parameters for `GET /plugins/info/1.2`.
#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    pub action: Option<String>,
    pub slug: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

/// `plugin_information` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginInformation {
    pub name: String,
    pub slug: String,
    /// Highest cached version, if any cached archive carries one.
    pub version: Option<String>,
    pub download_link: String,
    pub versions: BTreeMap<String, String>,
    pub last_updated: DateTime<Utc>,
}

/// One entry of a `query_plugins` page.
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginSummary {
    pub slug: String,
    pub version: Option<String>,
    pub download_link: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub pages: u64,
    pub results: u64,
}

/// `query_plugins` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryPluginsResponse {
    pub info: PageInfo,
    pub plugins: Vec<PluginSummary>,
}

async fn plugin_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Response, AppError> {
    match query.action.as_deref() {
        Some("plugin_information") => plugin_information(&state, query.slug.as_deref()).await,
        Some("query_plugins") => query_plugins(&state, &query).await,
        Some("hot_tags") | Some("popular_tags") => Ok(Json(serde_json::json!({})).into_response()),
        _ => Ok(info_error(StatusCode::BAD_REQUEST, "Invalid action")),
    }
}

async fn plugin_information(state: &AppState, slug: Option<&str>) -> Result<Response, AppError> {
    let Some(slug) = slug.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(info_error(StatusCode::BAD_REQUEST, "Slug is required"));
    };

    let records = state.registry.list_by_slug(AssetKind::PluginZip, slug).await?;
    let Some(info) = summarize(state, slug, &records) else {
        return Ok(info_error(StatusCode::NOT_FOUND, "Plugin not found"));
    };
    Ok(Json(info).into_response())
}

async fn query_plugins(state: &AppState, query: &InfoQuery) -> Result<Response, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let offset = (page - 1).saturating_mul(per_page);
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let slug_page = state
        .registry
        .list_slugs(AssetKind::PluginZip, search, per_page, offset)
        .await?;

    let mut plugins = Vec::with_capacity(slug_page.slugs.len());
    for slug in &slug_page.slugs {
        let records = state.registry.list_by_slug(AssetKind::PluginZip, slug).await?;
        if let Some(info) = summarize(state, slug, &records) {
            plugins.push(PluginSummary {
                slug: info.slug,
                version: info.version,
                download_link: info.download_link,
                last_updated: info.last_updated,
            });
        }
    }

    let response = QueryPluginsResponse {
        info: PageInfo {
            page,
            pages: slug_page.total.div_ceil(u64::from(per_page)),
            results: slug_page.total,
        },
        plugins,
    };
    Ok(Json(response).into_response())
}

/// Fold a slug's cached archives into one plugin entry. `None` when empty.
fn summarize(state: &AppState, slug: &str, records: &[AssetRecord]) -> Option<PluginInformation> {
    let newest = records.iter().max_by_key(|r| r.updated_at)?;
    let link = |record: &AssetRecord| state.config.public_link(&format!("plugin/{}", record.file_name));

    let versions: BTreeMap<String, String> = records
        .iter()
        .filter_map(|r| r.version.as_ref().map(|v| (v.clone(), link(r))))
        .collect();

    let highest = records
        .iter()
        .filter(|r| r.version.is_some())
        .max_by(|a, b| match (&a.version, &b.version) {
            (Some(a), Some(b)) => compare_versions(a, b),
            _ => Ordering::Equal,
        });

    let latest = highest.unwrap_or(newest);
    Some(PluginInformation {
        name: slug.to_string(),
        slug: slug.to_string(),
        version: latest.version.clone(),
        download_link: link(latest),
        versions,
        last_updated: newest.updated_at,
    })
}

fn info_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

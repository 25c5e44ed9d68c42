use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::documents::DocumentFilter;
use crate::error::{ApiError, ApiResult};
use crate::models::Document;
use crate::pagination::{Page, PageParams, DEFAULT_PER_PAGE};
use crate::search::{self, SearchScope};
use crate::server::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub scope: Option<String>,
    pub category: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Flat query string: `filters[type]=loi&filters[date_from]=...` arrive as
/// bracketed keys.
#[derive(Debug, Deserialize, Default)]
pub struct AdvancedQuery {
    pub q: Option<String>,
    #[serde(rename = "filters[type]")]
    pub doc_type: Option<String>,
    #[serde(rename = "filters[category_id]")]
    pub category_id: Option<i64>,
    #[serde(rename = "filters[date_from]")]
    pub date_from: Option<String>,
    #[serde(rename = "filters[date_to]")]
    pub date_to: Option<String>,
    #[serde(rename = "filters[status]")]
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Ok(Json(json!({
            "documents": [],
            "articles": [],
            "message": "Veuillez saisir un terme de recherche",
        })));
    }

    let scope = SearchScope::parse(params.scope.as_deref())
        .map_err(|e| ApiError::invalid("type", e.to_string()))?;
    let (page, per_page) = PageParams::new(params.page, params.per_page).resolve(DEFAULT_PER_PAGE);
    let results =
        search::search(&state.pool, &query, scope, params.category, page, per_page).await?;

    Ok(Json(json!({
        "data": results,
        "query": query,
        "message": "Recherche effectuée avec succès",
    })))
}

async fn handle_suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let query = params.q.unwrap_or_default();
    match search::suggestions(&state.pool, &query).await? {
        Some(suggestions) => Ok(Json(json!({ "data": suggestions }))),
        None => Ok(Json(json!({ "data": [] }))),
    }
}

async fn handle_advanced(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdvancedQuery>,
) -> ApiResult<Json<Page<Document>>> {
    let (page, per_page) = PageParams::new(params.page, params.per_page).resolve(DEFAULT_PER_PAGE);
    let filter = DocumentFilter {
        doc_type: params.doc_type,
        category_id: params.category_id,
        date_from: params.date_from,
        date_to: params.date_to,
        status: params.status,
        ..Default::default()
    };
    let documents = search::advanced(
        &state.pool,
        params.q.as_deref().unwrap_or_default(),
        filter,
        page,
        per_page,
    )
    .await?;
    Ok(Json(documents))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(handle_search))
        .route("/search/suggestions", get(handle_suggestions))
        .route("/search/advanced", get(handle_advanced))
}

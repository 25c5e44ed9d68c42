use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::with_message;
use crate::categories;
use crate::documents::{self, DocumentFilter};
use crate::error::{ApiError, ApiResult};
use crate::models::{Document, DOCUMENT_TYPES};
use crate::pagination::{Page, PageParams, DEFAULT_PER_PAGE};
use crate::server::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct DocumentListQuery {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
}

async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let roots = categories::list_roots(&state.pool).await?;
    Ok(with_message(roots, "Catégories récupérées avec succès"))
}

async fn category_tree(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let roots = categories::list_roots(&state.pool).await?;
    Ok(with_message(roots, "Arbre des catégories récupéré avec succès"))
}

async fn show_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    let category = categories::get_by_slug(&state.pool, &slug)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(with_message(category, "Catégorie récupérée avec succès"))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentListQuery>,
) -> ApiResult<Json<Page<Document>>> {
    let (page, per_page) = PageParams::new(query.page, query.per_page).resolve(DEFAULT_PER_PAGE);
    let filter = DocumentFilter {
        doc_type: query.doc_type.filter(|t| !t.is_empty()),
        category_id: query.category_id,
        search: query.search,
        ..Default::default()
    };
    let documents = documents::list_public(&state.pool, &filter, page, per_page).await?;
    Ok(Json(documents))
}

async fn show_document(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    let document = documents::show_by_slug(&state.pool, &slug)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(with_message(document, "Document récupéré avec succès"))
}

async fn featured_documents(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let documents = documents::featured(&state.pool).await?;
    Ok(with_message(documents, "Documents vedettes récupérés avec succès"))
}

async fn recent_documents(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let documents = documents::recent(&state.pool).await?;
    Ok(with_message(documents, "Documents récents récupérés avec succès"))
}

async fn documents_by_type(
    State(state): State<Arc<AppState>>,
    Path(doc_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Document>>> {
    if !DOCUMENT_TYPES.contains(&doc_type.as_str()) {
        return Err(ApiError::invalid("type", "Le type de document est invalide."));
    }
    let page = query.page.unwrap_or(1).max(1);
    let documents = documents::by_type(&state.pool, &doc_type, page).await?;
    Ok(Json(documents))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/tree", get(category_tree))
        .route("/categories/{slug}", get(show_category))
        .route("/documents", get(list_documents))
        .route("/documents/featured", get(featured_documents))
        .route("/documents/recent", get(recent_documents))
        .route("/documents/type/{doc_type}", get(documents_by_type))
        .route("/documents/{slug}", get(show_document))
}

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::with_message;
use crate::admin::{self, DocumentForm, UploadedPdf};
use crate::analysis::analyze_pdf;
use crate::documents::admin_index;
use crate::error::{ApiError, ApiResult};
use crate::extract::MIME_PDF;
use crate::server::AppState;

const PDF_FIELD: &str = "pdf_file";

#[derive(Debug, Deserialize, Default)]
pub struct IndexQuery {
    pub page: Option<i64>,
}

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::BadRequest(err.body_text())
}

/// Collects a multipart body. An empty file field counts as no file.
async fn read_form(mut multipart: Multipart) -> ApiResult<DocumentForm> {
    let mut form = DocumentForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == PDF_FIELD {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "document.pdf".to_string());
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            if !bytes.is_empty() {
                form.pdf_file = Some(UploadedPdf {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            form.set(&name, value);
        }
    }
    Ok(form)
}

async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> ApiResult<Json<Value>> {
    let page = admin_index(&state.pool, query.page.unwrap_or(1).max(1)).await?;
    Ok(Json(json!({
        "data": page.data,
        "total": page.total,
        "current_page": page.current_page,
        "last_page": page.last_page,
    })))
}

async fn store(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = read_form(multipart).await?;
    let document = admin::create_document(
        &state.pool,
        &state.config.storage.root,
        state.config.storage.max_pdf_bytes,
        &form,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Document créé avec succès", "data": document })),
    ))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let document = admin::show_document(&state.pool, id).await?;
    Ok(Json(json!({ "data": document })))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_form(multipart).await?;
    let document = admin::update_document(
        &state.pool,
        &state.config.storage.root,
        state.config.storage.max_pdf_bytes,
        id,
        &form,
    )
    .await?;
    Ok(with_message(document, "Document modifié avec succès"))
}

async fn destroy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    admin::delete_document(&state.pool, &state.config.storage.root, id).await?;
    Ok(Json(json!({ "message": "Document supprimé avec succès" })))
}

async fn duplicate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let document = admin::duplicate_document(&state.pool, id).await?;
    Ok(with_message(document, "Document dupliqué avec succès"))
}

async fn import(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = read_form(multipart).await?;
    let imported = admin::import_document(
        &state.pool,
        state.model.as_ref(),
        &state.config.llm,
        &state.config.storage.root,
        state.config.storage.max_pdf_bytes,
        &form,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": imported.message,
            "data": imported.document,
            "analysis": imported.analysis,
        })),
    ))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_form(multipart).await?;
    let pdf = admin::require_pdf(
        form.pdf_file.as_ref(),
        "Un fichier PDF est requis.",
        state.config.storage.max_pdf_bytes,
    )?;
    let analysis = analyze_pdf(
        state.model.as_ref(),
        &state.config.llm,
        &pdf.bytes,
        &pdf.file_name,
    )
    .await;
    Ok(Json(json!({
        "success": true,
        "data": analysis,
        "message": "Document analysé avec succès",
    })))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_form(multipart).await?;
    let pdf = admin::require_pdf(
        form.pdf_file.as_ref(),
        "Un fichier PDF est requis.",
        state.config.storage.max_pdf_bytes,
    )?;
    let analysis = analyze_pdf(
        state.model.as_ref(),
        &state.config.llm,
        &pdf.bytes,
        &pdf.file_name,
    )
    .await;
    Ok(Json(json!({
        "success": true,
        "analysis": analysis,
        "file_info": {
            "original_name": pdf.file_name,
            "size": pdf.size(),
            "mime_type": pdf.content_type.as_deref().unwrap_or(MIME_PDF),
        },
        "message": "Prévisualisation générée",
    })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index).post(store))
        .route("/import", post(import))
        .route("/analyze", post(analyze))
        .route("/preview", post(preview))
        .route("/{id}", get(show).put(update).post(update).delete(destroy))
        .route("/{id}/duplicate", post(duplicate))
}

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::with_message;
use crate::analytics::{self, DateRange, ExportKind};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::server::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub format: Option<String>,
}

impl RangeQuery {
    /// Blank dates are ignored; malformed ones are a 422.
    fn range(&self) -> ApiResult<DateRange> {
        let mut errors = ValidationErrors::new();
        let mut day = |field: &str, raw: Option<&str>| {
            let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
            let parsed = DateRange::parse_day(raw);
            if parsed.is_none() {
                errors.add(field, "La date doit être au format AAAA-MM-JJ.");
            }
            parsed
        };
        let range = DateRange {
            start: day("start_date", self.start_date.as_deref()),
            end: day("end_date", self.end_date.as_deref()),
        };
        errors.into_result()?;
        Ok(range)
    }
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let overview = analytics::overview(&state.pool, &query.range()?).await?;
    Ok(with_message(overview, "Statistiques récupérées avec succès"))
}

async fn countries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let stats = analytics::country_stats(&state.pool, &query.range()?).await?;
    Ok(with_message(stats, "Statistiques par pays récupérées avec succès"))
}

async fn devices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let stats = analytics::device_stats(&state.pool, &query.range()?).await?;
    Ok(with_message(stats, "Statistiques par appareil récupérées avec succès"))
}

async fn browsers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let stats = analytics::browser_stats(&state.pool, &query.range()?).await?;
    Ok(with_message(stats, "Statistiques par navigateur récupérées avec succès"))
}

async fn general(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let stats = analytics::general_stats(&state.pool, &query.range()?).await?;
    Ok(with_message(stats, "Statistiques générales récupérées avec succès"))
}

async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Response> {
    if query.format.as_deref().unwrap_or("csv") != "csv" {
        return Err(ApiError::BadRequest("Format non supporté".to_string()));
    }
    let kind = ExportKind::from_name(query.kind.as_deref());
    let csv = analytics::export_csv(&state.pool, kind, &query.range()?).await?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=UTF-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", kind.file_name()),
            ),
        ],
        csv,
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/countries", get(countries))
        .route("/devices", get(devices))
        .route("/browsers", get(browsers))
        .route("/general", get(general))
        .route("/export", get(export))
}

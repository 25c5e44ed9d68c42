//! JSON API mounted under `/api`.
//!
//! | Prefix | Module | Access |
//! |--------|--------|--------|
//! | `/legal` | [`legal`], [`search`] | public |
//! | `/ai/chat` | [`chat`] | public, deletion needs a login |
//! | `/auth`, `/user` | [`auth`] | public / logged in |
//! | `/dashboard` | [`dashboard`] | logged in |
//! | `/admin/documents` | [`admin`] | administrators |
//! | `/admin/analytics` | [`analytics`] | administrators |

use std::sync::Arc;

use axum::{middleware, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::server::AppState;

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod legal;
pub mod search;

/// `{"data": ..., "message": ...}`, the envelope most endpoints answer with.
pub fn with_message<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({ "data": data, "message": message }))
}

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .nest("/documents", admin::router())
        .nest("/analytics", analytics::router())
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .nest("/legal", legal::router().merge(search::router()))
        .nest("/ai", chat::router())
        .nest("/admin", admin)
        .merge(auth::router())
        .merge(dashboard::router())
}

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::auth::CurrentUser;
use crate::dashboard::{self, Dashboard};
use crate::error::ApiResult;
use crate::server::AppState;

async fn show(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Dashboard>> {
    Ok(Json(dashboard::build(&state.pool, &user).await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(show))
}

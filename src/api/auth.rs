use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{
    authenticate, clear_cookie, issue_token, request_token, revoke_token, session_cookie,
    CurrentUser,
};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    let mut errors = ValidationErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "L'adresse e-mail est obligatoire.");
    }
    if request.password.is_empty() {
        errors.add("password", "Le mot de passe est obligatoire.");
    }
    errors.into_result()?;

    let Some(user) = authenticate(&state.pool, &request.email, &request.password).await? else {
        tracing::info!(email = %request.email, "failed login");
        return Err(ApiError::invalid(
            "email",
            "Ces identifiants ne correspondent à aucun compte.",
        ));
    };

    let auth = &state.config.auth;
    let token = issue_token(&state.pool, user.id, auth.session_ttl_hours).await?;
    let cookie = session_cookie(
        &auth.cookie_name,
        &token,
        auth.session_ttl_hours,
        auth.secure_cookies,
    );
    tracing::info!(user_id = user.id, "user logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "data": user, "token": token })),
    )
        .into_response())
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = request_token(&headers, cookie_name) {
        revoke_token(&state.pool, &token).await?;
    }
    Ok((
        AppendHeaders([(SET_COOKIE, clear_cookie(cookie_name))]),
        Json(json!({ "message": "Déconnexion réussie" })),
    )
        .into_response())
}

async fn current_user(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!(user))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/user", get(current_user))
}

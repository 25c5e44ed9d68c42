use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::with_message;
use crate::auth::{CurrentUser, MaybeUser};
use crate::chat::{self, MAX_MESSAGE_CHARS};
use crate::error::{ApiError, ApiResult};
use crate::models::ChatSession;
use crate::server::AppState;
use crate::tracking::{self, ClientData, CONSENT_HEADER};

/// Socket peer, when the server was started with connect info.
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S: Send + Sync> FromRequestParts<S> for PeerAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
        ))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub client_data: ClientData,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<Value>,
}

async fn load_session(state: &AppState, session_id: &str) -> ApiResult<ChatSession> {
    chat::find_session(&state.pool, session_id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
    body: Option<Json<CreateSessionRequest>>,
) -> ApiResult<Response> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let consent = tracking::has_consent(&headers);
    if !consent {
        tracing::info!(
            user_id = user.as_ref().map(|u| u.id),
            "chat session created without tracking consent"
        );
    }

    let data = tracking::collect(&headers, peer, &request.client_data);
    let session = chat::create_session(&state.pool, user.map(|u| u.id), &data).await?;

    let consent_value = if consent { "granted" } else { "required" };
    let mut response = (
        StatusCode::OK,
        with_message(session, "Session créée avec succès"),
    )
        .into_response();
    response
        .headers_mut()
        .insert(CONSENT_HEADER, HeaderValue::from_static(consent_value));
    Ok(response)
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = chat::session_with_messages(&state.pool, &session_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(with_message(session, "Session récupérée avec succès"))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> ApiResult<Json<Value>> {
    let sessions = chat::list_sessions(&state.pool, user.map(|u| u.id)).await?;
    Ok(with_message(sessions, "Sessions récupérées avec succès"))
}

fn validate_content(content: Option<Value>) -> ApiResult<String> {
    match content {
        None | Some(Value::Null) => Err(ApiError::invalid(
            "content",
            "Le champ content est obligatoire.",
        )),
        Some(Value::String(text)) if text.trim().is_empty() => Err(ApiError::invalid(
            "content",
            "Le champ content est obligatoire.",
        )),
        Some(Value::String(text)) if text.chars().count() > MAX_MESSAGE_CHARS => {
            Err(ApiError::invalid(
                "content",
                "Le champ content ne peut pas dépasser 2000 caractères.",
            ))
        }
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(ApiError::invalid(
            "content",
            "Le champ content doit être une chaîne de caractères.",
        )),
    }
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<Value>> {
    let session = load_session(&state, &session_id).await?;
    let content = validate_content(request.content)?;

    let message = chat::send_message(
        &state.pool,
        state.model.as_ref(),
        &state.config.llm,
        &session,
        &content,
    )
    .await?;
    Ok(with_message(message, "Message envoyé avec succès"))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = load_session(&state, &session_id).await?;
    let messages = chat::messages(&state.pool, session.id).await?;
    Ok(with_message(messages, "Messages récupérés avec succès"))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = load_session(&state, &session_id).await?;
    if session.user_id != Some(user.id) {
        return Err(ApiError::Forbidden("Non autorisé".to_string()));
    }
    chat::delete_session(&state.pool, session.id).await?;
    Ok(Json(json!({ "message": "Session supprimée avec succès" })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/sessions", post(create_session).get(list_sessions))
        .route(
            "/chat/sessions/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route(
            "/chat/sessions/{session_id}/messages",
            post(send_message).get(list_messages),
        )
}

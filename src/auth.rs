//! Users, login sessions and the request extractors guarding routes.
//!
//! Passwords are hashed with argon2. A login issues a random 32-byte token
//! (hex) that the client presents either as the session cookie or as an
//! `Authorization: Bearer` header; only its sha256 is stored.

use std::sync::Arc;

use anyhow::Result;
use argon2::{
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, header::COOKIE, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::db::now_ts;
use crate::error::ApiError;
use crate::models::User;
use crate::server::AppState;

pub const ADMIN_ONLY_MESSAGE: &str = "Accès non autorisé. Vous devez être administrateur.";

const USER_COLUMNS: &str = "id, name, email, is_admin, created_at, updated_at";

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` for a wrong password; malformed stored hashes are errors.
pub fn verify_password(candidate: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Invalid stored password hash: {e}"))?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(other) => Err(anyhow::anyhow!("Password verification failed: {other}")),
    }
}

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> Result<User> {
    let now = now_ts();
    let hash = hash_password(password)?;
    let sql = format!(
        "INSERT INTO users (name, email, password_hash, is_admin, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(name)
        .bind(email.trim().to_lowercase())
        .bind(hash)
        .bind(is_admin)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
    Ok(User::from_row(&row))
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(User::from_row))
}

/// The user owning `email` when `password` matches.
pub async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {}, password_hash FROM users WHERE email = ?",
        USER_COLUMNS
    );
    let Some(row) = sqlx::query(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let stored: String = row.get("password_hash");
    if verify_password(password, &stored)? {
        Ok(Some(User::from_row(&row)))
    } else {
        Ok(None)
    }
}

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues a new login token valid for `ttl_hours`. Expired tokens of every
/// user are purged first.
pub async fn issue_token(pool: &SqlitePool, user_id: i64, ttl_hours: i64) -> Result<String> {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    let now = now_ts();
    let purged = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();
    if purged > 0 {
        tracing::debug!(purged, "expired login tokens removed");
    }

    sqlx::query(
        "INSERT INTO auth_sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash(&token))
    .bind(user_id)
    .bind(now + ttl_hours * 3600)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(token)
}

pub async fn user_for_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT u.id, u.name, u.email, u.is_admin, u.created_at, u.updated_at
         FROM auth_sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ? AND s.expires_at > ?",
    )
    .bind(token_hash(token))
    .bind(now_ts())
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(User::from_row))
}

pub async fn revoke_token(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
        .bind(token_hash(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Value of cookie `name` from the `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Login token from the bearer header, else from the session cookie.
pub fn request_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| {
            let mut parts = header.splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("Bearer") => {
                    Some(token.trim().to_string())
                }
                _ => None,
            }
        })
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_value(headers, cookie_name).filter(|t| !t.is_empty()))
}

/// `Set-Cookie` value carrying a fresh token.
pub fn session_cookie(name: &str, token: &str, ttl_hours: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name,
        token,
        ttl_hours * 3600
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(token) = request_token(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };
    Ok(user_for_token(&state.pool, &token).await?)
}

// ============ Extractors ============

/// The authenticated user; 401 otherwise.
pub struct CurrentUser(pub User);

/// The authenticated user, if any.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(CurrentUser(user.clone()));
        }
        resolve_user(state, &parts.headers)
            .await?
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(MaybeUser(Some(user.clone())));
        }
        Ok(MaybeUser(resolve_user(state, &parts.headers).await?))
    }
}

/// Rejects anonymous (401) and non-admin (403) requests. The admin is made
/// available to handlers as a request extension.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, request.headers())
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if !user.is_admin {
        tracing::warn!(user_id = user.id, path = %request.uri().path(), "admin route refused");
        return Err(ApiError::Forbidden(ADMIN_ONLY_MESSAGE.to_string()));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;
    use axum::http::HeaderValue;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn token_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; legisci_session=abc"));
        assert_eq!(request_token(&headers, "legisci_session").as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(request_token(&headers, "legisci_session").as_deref(), Some("xyz"));

        assert_eq!(request_token(&HeaderMap::new(), "legisci_session"), None);
    }

    #[test]
    fn cookie_flags() {
        let cookie = session_cookie("legisci_session", "tok", 1, true);
        assert_eq!(
            cookie,
            "legisci_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600; Secure"
        );
    }

    #[tokio::test]
    async fn login_token_lifecycle() {
        let (_tmp, pool) = test_pool().await;
        let user = create_user(&pool, "Awa", "Awa@Example.ci", "motdepasse", false)
            .await
            .unwrap();
        assert_eq!(user.email, "awa@example.ci");

        assert!(authenticate(&pool, "awa@example.ci", "mauvais").await.unwrap().is_none());
        let found = authenticate(&pool, "AWA@example.ci", "motdepasse").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let token = issue_token(&pool, user.id, 1).await.unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(user_for_token(&pool, &token).await.unwrap().unwrap().id, user.id);

        revoke_token(&pool, &token).await.unwrap();
        assert!(user_for_token(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_tokens_are_ignored() {
        let (_tmp, pool) = test_pool().await;
        let user = create_user(&pool, "B", "b@example.ci", "pw", true).await.unwrap();
        let token = issue_token(&pool, user.id, -1).await.unwrap();
        assert!(user_for_token(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_login_purges_expired_tokens() {
        let (_tmp, pool) = test_pool().await;
        let user = create_user(&pool, "C", "c@example.ci", "pw", false).await.unwrap();
        issue_token(&pool, user.id, -1).await.unwrap();
        issue_token(&pool, user.id, -2).await.unwrap();
        let live = issue_token(&pool, user.id, 1).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auth_sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert!(user_for_token(&pool, &live).await.unwrap().is_some());
    }
}

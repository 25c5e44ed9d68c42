//! Chat sessions and their messages.
//!
//! A session is addressed publicly by its uuid `session_id`; the integer
//! primary key only links messages. Sessions may belong to a user or be
//! anonymous.

use anyhow::Result;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::assistant::generate_reply;
use crate::config::LlmConfig;
use crate::db::now_ts;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, ChatSession, MESSAGE_COLUMNS, SESSION_COLUMNS};
use crate::text::limit;
use crate::tracking::TrackingData;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const TITLE_CHARS: usize = 50;
pub const DEFAULT_TITLE: &str = "Nouvelle conversation";

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

pub async fn create_session(
    pool: &SqlitePool,
    user_id: Option<i64>,
    tracking: &TrackingData,
) -> Result<ChatSession> {
    let now = now_ts();
    let session_id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO ai_chat_sessions (
            session_id, user_id, title, context, last_activity,
            ip_address, user_agent, country, country_name, city, device_type, browser,
            browser_version, operating_system, platform, is_mobile, is_tablet, is_desktop,
            language, timezone, screen_width, screen_height, created_at, updated_at
        ) VALUES (?, ?, NULL, '[]', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(&tracking.ip_address)
    .bind(&tracking.user_agent)
    .bind(&tracking.country)
    .bind(&tracking.country_name)
    .bind(&tracking.city)
    .bind(&tracking.device_type)
    .bind(&tracking.browser)
    .bind(&tracking.browser_version)
    .bind(&tracking.operating_system)
    .bind(&tracking.platform)
    .bind(tracking.is_mobile)
    .bind(tracking.is_tablet)
    .bind(tracking.is_desktop)
    .bind(&tracking.language)
    .bind(&tracking.timezone)
    .bind(tracking.screen_width)
    .bind(tracking.screen_height)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_session(pool, &session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("chat session {} vanished after insert", session_id))
}

pub async fn find_session(pool: &SqlitePool, session_id: &str) -> Result<Option<ChatSession>> {
    let sql = format!(
        "SELECT {} FROM ai_chat_sessions WHERE session_id = ?",
        SESSION_COLUMNS
    );
    let row = sqlx::query(&sql).bind(session_id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(ChatSession::from_row))
}

/// Session with its messages in sending order.
pub async fn session_with_messages(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Option<ChatSession>> {
    let Some(mut session) = find_session(pool, session_id).await? else {
        return Ok(None);
    };
    session.messages = Some(messages(pool, session.id).await?);
    Ok(Some(session))
}

/// A user's sessions, or the anonymous ones when `user_id` is `None`,
/// most recently active first.
pub async fn list_sessions(pool: &SqlitePool, user_id: Option<i64>) -> Result<Vec<ChatSession>> {
    let sql = format!(
        "SELECT {} FROM ai_chat_sessions WHERE user_id IS ?
         ORDER BY last_activity DESC, id DESC",
        SESSION_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    Ok(rows.iter().map(ChatSession::from_row).collect())
}

pub async fn messages(pool: &SqlitePool, session_pk: i64) -> Result<Vec<ChatMessage>> {
    let sql = format!(
        "SELECT {} FROM ai_chat_messages WHERE session_id = ? ORDER BY sent_at, id",
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(session_pk).fetch_all(pool).await?;
    Ok(rows.iter().map(ChatMessage::from_row).collect())
}

pub async fn insert_message(
    pool: &SqlitePool,
    session_pk: i64,
    role: &str,
    content: &str,
    metadata: Option<&Value>,
) -> Result<ChatMessage> {
    let now = now_ts();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO ai_chat_messages (session_id, role, content, metadata, sent_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(session_pk)
    .bind(role)
    .bind(content)
    .bind(metadata.map(Value::to_string))
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    let sql = format!("SELECT {} FROM ai_chat_messages WHERE id = ?", MESSAGE_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    Ok(ChatMessage::from_row(&row))
}

pub async fn touch(pool: &SqlitePool, session_pk: i64) -> Result<()> {
    let now = now_ts();
    sqlx::query("UPDATE ai_chat_sessions SET last_activity = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(session_pk)
        .execute(pool)
        .await?;
    Ok(())
}

/// Title derived from the first user message, or [`DEFAULT_TITLE`].
pub fn generate_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.is_user())
        .map(|m| limit(&m.content, TITLE_CHARS))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

async fn set_title(pool: &SqlitePool, session_pk: i64, title: &str) -> Result<()> {
    sqlx::query("UPDATE ai_chat_sessions SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(now_ts())
        .bind(session_pk)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores the user message, asks the assistant and stores its answer.
/// The first exchange also names the session. Returns the assistant
/// message with its (refreshed) session attached.
pub async fn send_message(
    pool: &SqlitePool,
    model: &dyn ChatModel,
    llm: &LlmConfig,
    session: &ChatSession,
    content: &str,
) -> Result<ChatMessage> {
    let history = messages(pool, session.id).await?;

    insert_message(pool, session.id, ROLE_USER, content, None).await?;
    touch(pool, session.id).await?;

    let reply = generate_reply(model, pool, llm, &history, content).await?;

    let mut assistant =
        insert_message(pool, session.id, ROLE_ASSISTANT, &reply.content, Some(&reply.metadata))
            .await?;
    touch(pool, session.id).await?;

    let all = messages(pool, session.id).await?;
    if all.len() == 2 {
        set_title(pool, session.id, &generate_title(&all)).await?;
    }

    assistant.session = find_session(pool, &session.session_id).await?.map(Box::new);
    Ok(assistant)
}

pub async fn delete_session(pool: &SqlitePool, session_pk: i64) -> Result<()> {
    sqlx::query("DELETE FROM ai_chat_sessions WHERE id = ?")
        .bind(session_pk)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::APOLOGY;
    use crate::llm::{CompletionRequest, DisabledModel};
    use crate::testing::test_pool;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>> {
            self.seen.lock().unwrap().push(request.messages.len());
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(Some(format!("Réponse détaillée à : {}", last)))
        }
    }

    #[tokio::test]
    async fn first_exchange_names_the_session() {
        let (_tmp, pool) = test_pool().await;
        let session = create_session(&pool, None, &TrackingData::default()).await.unwrap();
        assert_eq!(session.title, None);
        assert_eq!(session.context, serde_json::json!([]));

        let model = EchoModel { seen: Mutex::new(Vec::new()) };
        let question = "Quels sont les droits garantis par la Constitution ivoirienne de 2016 ?";
        let reply = send_message(&pool, &model, &LlmConfig::default(), &session, question)
            .await
            .unwrap();

        assert_eq!(reply.role, ROLE_ASSISTANT);
        assert!(reply.content.starts_with("Réponse détaillée"));
        assert_eq!(reply.metadata.as_ref().unwrap()["model"], "echo");
        let title = reply.session.as_ref().unwrap().title.clone().unwrap();
        assert_eq!(title.chars().count(), TITLE_CHARS + 3);
        assert!(title.ends_with("..."));

        send_message(&pool, &model, &LlmConfig::default(), &session, "Et ensuite ?")
            .await
            .unwrap();
        let reloaded = session_with_messages(&pool, &session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.title.as_deref(), Some(title.as_str()));
        assert_eq!(reloaded.messages.unwrap().len(), 4);

        // system + new message, then system + 2 prior + new message
        assert_eq!(*model.seen.lock().unwrap(), vec![2, 4]);
    }

    #[tokio::test]
    async fn disabled_model_falls_back_to_canned_reply() {
        let (_tmp, pool) = test_pool().await;
        let session = create_session(&pool, None, &TrackingData::default()).await.unwrap();
        let reply = send_message(
            &pool,
            &DisabledModel,
            &LlmConfig::default(),
            &session,
            "Parlez-moi du droit pénal",
        )
        .await
        .unwrap();
        assert!(reply.content.contains("Code pénal ivoirien"));
        assert_ne!(reply.content, APOLOGY);
        let metadata = reply.metadata.unwrap();
        assert!(metadata.get("model").is_none());
        assert!(metadata["cited_documents"].is_array());
    }

    #[tokio::test]
    async fn anonymous_and_user_sessions_are_listed_apart() {
        let (_tmp, pool) = test_pool().await;
        sqlx::query(
            "INSERT INTO users (name, email, password_hash, is_admin, created_at, updated_at)
             VALUES ('A', 'a@example.ci', 'x', 0, 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        create_session(&pool, Some(1), &TrackingData::default()).await.unwrap();
        create_session(&pool, None, &TrackingData::default()).await.unwrap();
        create_session(&pool, None, &TrackingData::default()).await.unwrap();

        assert_eq!(list_sessions(&pool, Some(1)).await.unwrap().len(), 1);
        assert_eq!(list_sessions(&pool, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_session_removes_messages() {
        let (_tmp, pool) = test_pool().await;
        let session = create_session(&pool, None, &TrackingData::default()).await.unwrap();
        insert_message(&pool, session.id, ROLE_USER, "Bonjour", None).await.unwrap();

        delete_session(&pool, session.id).await.unwrap();
        assert!(find_session(&pool, &session.session_id).await.unwrap().is_none());
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_chat_messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn default_title_without_user_message() {
        assert_eq!(generate_title(&[]), DEFAULT_TITLE);
    }
}

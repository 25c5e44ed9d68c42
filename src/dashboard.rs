//! Counters shown on the signed-in dashboard. Administrators also get the
//! document list and detailed activity figures.

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{Row, Sqlite, SqlitePool};

use crate::categories::{attach_categories, list_active};
use crate::models::{Category, Document, User, DOCUMENT_COLUMNS, PUBLIC_STATUS};

const TOP_DOCUMENTS: i64 = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_ai_sessions: i64,
    pub anon_ai_sessions: i64,
    pub user_ai_sessions: i64,
    pub recent_ai_messages: i64,
    pub total_document_views: i64,
    pub recent_ai_sessions: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total: i64,
    pub published: i64,
    pub drafts: i64,
    pub total_views: i64,
}

#[derive(Debug, Serialize)]
pub struct TopDocument {
    pub title: String,
    pub views_count: i64,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedStats {
    pub new_users_this_month: i64,
    pub messages_this_week: i64,
    pub top_documents: Vec<TopDocument>,
    pub daily_ai_usage: Vec<DailyUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub is_admin: bool,
    pub general_stats: GeneralStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_stats: Option<AdminStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_stats: Option<AdvancedStats>,
}

async fn count(pool: &SqlitePool, sql: &str, since: Option<i64>) -> Result<i64> {
    let mut query = sqlx::query_scalar::<Sqlite, i64>(sql);
    if let Some(since) = since {
        query = query.bind(since);
    }
    Ok(query.fetch_one(pool).await?)
}

fn days_ago(days: i64) -> i64 {
    (Utc::now() - Duration::days(days)).timestamp()
}

pub async fn general_stats(pool: &SqlitePool) -> Result<GeneralStats> {
    Ok(GeneralStats {
        total_users: count(pool, "SELECT COUNT(*) FROM users", None).await?,
        active_users: count(
            pool,
            "SELECT COUNT(*) FROM users WHERE updated_at >= ?",
            Some(days_ago(30)),
        )
        .await?,
        total_ai_sessions: count(pool, "SELECT COUNT(*) FROM ai_chat_sessions", None).await?,
        anon_ai_sessions: count(
            pool,
            "SELECT COUNT(*) FROM ai_chat_sessions WHERE user_id IS NULL",
            None,
        )
        .await?,
        user_ai_sessions: count(
            pool,
            "SELECT COUNT(*) FROM ai_chat_sessions WHERE user_id IS NOT NULL",
            None,
        )
        .await?,
        recent_ai_messages: count(
            pool,
            "SELECT COUNT(*) FROM ai_chat_messages WHERE sent_at >= ?",
            Some(days_ago(30)),
        )
        .await?,
        total_document_views: count(
            pool,
            "SELECT COALESCE(SUM(views_count), 0) FROM legal_documents WHERE deleted_at IS NULL",
            None,
        )
        .await?,
        recent_ai_sessions: count(
            pool,
            "SELECT COUNT(*) FROM ai_chat_sessions WHERE last_activity >= ?",
            Some(days_ago(7)),
        )
        .await?,
    })
}

/// "published" counts documents visible on the public site.
pub async fn admin_stats(pool: &SqlitePool) -> Result<AdminStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) AS published,
                COALESCE(SUM(CASE WHEN status = 'draft' THEN 1 ELSE 0 END), 0) AS drafts,
                COALESCE(SUM(views_count), 0) AS total_views
         FROM legal_documents WHERE deleted_at IS NULL",
    )
    .bind(PUBLIC_STATUS)
    .fetch_one(pool)
    .await?;

    Ok(AdminStats {
        total: row.get("total"),
        published: row.get("published"),
        drafts: row.get("drafts"),
        total_views: row.get("total_views"),
    })
}

pub async fn advanced_stats(pool: &SqlitePool) -> Result<AdvancedStats> {
    let today = Utc::now().date_naive();
    let month_start = today
        .with_day(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp();
    let week_start = (today - Duration::days(today.weekday().num_days_from_monday() as i64))
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp();

    let top_documents = sqlx::query(
        "SELECT title, views_count, slug FROM legal_documents
         WHERE deleted_at IS NULL ORDER BY views_count DESC, id LIMIT ?",
    )
    .bind(TOP_DOCUMENTS)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| TopDocument {
        title: row.get("title"),
        views_count: row.get("views_count"),
        slug: row.get("slug"),
    })
    .collect();

    let daily_ai_usage = sqlx::query(
        "SELECT DATE(sent_at, 'unixepoch') AS date, COUNT(*) AS count
         FROM ai_chat_messages WHERE sent_at >= ?
         GROUP BY date ORDER BY date",
    )
    .bind(days_ago(7))
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| DailyUsage {
        date: row.get("date"),
        count: row.get("count"),
    })
    .collect();

    Ok(AdvancedStats {
        new_users_this_month: count(
            pool,
            "SELECT COUNT(*) FROM users WHERE created_at >= ?",
            Some(month_start),
        )
        .await?,
        messages_this_week: count(
            pool,
            "SELECT COUNT(*) FROM ai_chat_messages WHERE sent_at >= ?",
            Some(week_start),
        )
        .await?,
        top_documents,
        daily_ai_usage,
    })
}

async fn all_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d WHERE d.deleted_at IS NULL
         ORDER BY d.updated_at DESC, d.id DESC",
        DOCUMENT_COLUMNS
    );
    let mut documents: Vec<Document> = sqlx::query(&sql)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;
    Ok(documents)
}

pub async fn build(pool: &SqlitePool, user: &User) -> Result<Dashboard> {
    let general_stats = general_stats(pool).await?;
    if !user.is_admin {
        return Ok(Dashboard {
            is_admin: false,
            general_stats,
            admin_stats: None,
            documents: None,
            categories: None,
            advanced_stats: None,
        });
    }

    Ok(Dashboard {
        is_admin: true,
        general_stats,
        admin_stats: Some(admin_stats(pool).await?),
        documents: Some(all_documents(pool).await?),
        categories: Some(list_active(pool).await?),
        advanced_stats: Some(advanced_stats(pool).await?),
    })
}

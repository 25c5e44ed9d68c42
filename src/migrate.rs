use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates every table and index. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Users and login sessions
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Legal content
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legal_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            color TEXT,
            icon TEXT,
            parent_id INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            FOREIGN KEY (parent_id) REFERENCES legal_categories(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legal_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            summary TEXT,
            content TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL CHECK (type IN ('loi', 'decret', 'arrete', 'ordonnance', 'constitution', 'code', 'autre')),
            reference_number TEXT,
            publication_date TEXT,
            effective_date TEXT,
            journal_officiel TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            category_id INTEGER,
            source_url TEXT,
            pdf_url TEXT,
            pdf_file_name TEXT,
            pdf_file_size INTEGER,
            metadata TEXT,
            views_count INTEGER NOT NULL DEFAULT 0,
            is_featured INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            FOREIGN KEY (category_id) REFERENCES legal_categories(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legal_sections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            number TEXT,
            description TEXT,
            content TEXT,
            document_id INTEGER NOT NULL,
            parent_section_id INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            FOREIGN KEY (document_id) REFERENCES legal_documents(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_section_id) REFERENCES legal_sections(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legal_articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL,
            title TEXT,
            content TEXT NOT NULL,
            commentary TEXT,
            document_id INTEGER NOT NULL,
            section_id INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0,
            cross_references TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            FOREIGN KEY (document_id) REFERENCES legal_documents(id) ON DELETE CASCADE,
            FOREIGN KEY (section_id) REFERENCES legal_sections(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // AI assistant conversations
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_chat_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL UNIQUE,
            user_id INTEGER,
            title TEXT,
            context TEXT,
            last_activity INTEGER NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            country TEXT,
            country_name TEXT,
            city TEXT,
            device_type TEXT,
            browser TEXT,
            browser_version TEXT,
            operating_system TEXT,
            platform TEXT,
            is_mobile INTEGER NOT NULL DEFAULT 0,
            is_tablet INTEGER NOT NULL DEFAULT 0,
            is_desktop INTEGER NOT NULL DEFAULT 1,
            language TEXT,
            timezone TEXT,
            screen_width INTEGER,
            screen_height INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content TEXT NOT NULL,
            metadata TEXT,
            sent_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES ai_chat_sessions(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_documents_type_status ON legal_documents(type, status)",
        "CREATE INDEX IF NOT EXISTS idx_documents_publication_date ON legal_documents(publication_date)",
        "CREATE INDEX IF NOT EXISTS idx_documents_category ON legal_documents(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_documents_title ON legal_documents(title)",
        "CREATE INDEX IF NOT EXISTS idx_documents_status ON legal_documents(status)",
        "CREATE INDEX IF NOT EXISTS idx_sections_document_sort ON legal_sections(document_id, sort_order)",
        "CREATE INDEX IF NOT EXISTS idx_articles_document_sort ON legal_articles(document_id, sort_order)",
        "CREATE INDEX IF NOT EXISTS idx_articles_number ON legal_articles(number)",
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user_activity ON ai_chat_sessions(user_id, last_activity)",
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_country ON ai_chat_sessions(country, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_device ON ai_chat_sessions(device_type, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_browser ON ai_chat_sessions(browser, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session_sent ON ai_chat_messages(session_id, sent_at)",
    ];
    for statement in indexes {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::for_data_dir(tmp.path());
        run_migrations(&config).await.unwrap();
        run_migrations(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
             ('users', 'auth_sessions', 'legal_categories', 'legal_documents',
              'legal_sections', 'legal_articles', 'ai_chat_sessions', 'ai_chat_messages')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 8);
    }
}

//! Records stored in SQLite and their JSON shapes.
//!
//! Rows are mapped by hand from [`SqliteRow`]s. Relations (a document's
//! category, a section's children, ...) are optional fields filled by the
//! repository functions that need them and omitted from JSON otherwise.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db::ts_to_datetime;

/// Every document type the table accepts.
pub const DOCUMENT_TYPES: [&str; 7] = [
    "loi",
    "decret",
    "arrete",
    "ordonnance",
    "constitution",
    "code",
    "autre",
];

/// Types an administrator may assign through the back office.
pub const ADMIN_DOCUMENT_TYPES: [&str; 6] =
    ["constitution", "loi", "decret", "arrete", "code", "ordonnance"];

/// Status of documents visible on the public site.
pub const PUBLIC_STATUS: &str = "active";

pub const DOCUMENT_COLUMNS: &str = "d.id, d.title, d.slug, d.summary, d.content, d.type, \
    d.reference_number, d.publication_date, d.effective_date, d.journal_officiel, d.status, \
    d.category_id, d.source_url, d.pdf_url, d.pdf_file_name, d.pdf_file_size, d.metadata, \
    d.views_count, d.is_featured, d.created_at, d.updated_at";

pub const CATEGORY_COLUMNS: &str = "c.id, c.name, c.slug, c.description, c.color, c.icon, \
    c.parent_id, c.sort_order, c.is_active, c.created_at, c.updated_at";

pub const SECTION_COLUMNS: &str = "s.id, s.title, s.number, s.description, s.content, \
    s.document_id, s.parent_section_id, s.sort_order, s.created_at, s.updated_at";

pub const ARTICLE_COLUMNS: &str = "a.id, a.number, a.title, a.content, a.commentary, \
    a.document_id, a.section_id, a.sort_order, a.cross_references, a.created_at, a.updated_at";

pub const SESSION_COLUMNS: &str = "id, session_id, user_id, title, context, last_activity, \
    ip_address, user_agent, country, country_name, city, device_type, browser, \
    browser_version, operating_system, platform, is_mobile, is_tablet, is_desktop, language, \
    timezone, screen_width, screen_height, created_at, updated_at";

pub const MESSAGE_COLUMNS: &str =
    "id, session_id, role, content, metadata, sent_at, created_at, updated_at";

fn json_column(row: &SqliteRow, column: &str) -> Option<Value> {
    row.get::<Option<String>, _>(column)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            is_admin: row.get("is_admin"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Category>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
}

impl Category {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            description: row.get("description"),
            color: row.get("color"),
            icon: row.get("icon"),
            parent_id: row.get("parent_id"),
            sort_order: row.get("sort_order"),
            is_active: row.get("is_active"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            children: None,
            documents: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub reference_number: Option<String>,
    pub publication_date: Option<String>,
    pub effective_date: Option<String>,
    pub journal_officiel: Option<String>,
    pub status: String,
    pub category_id: Option<i64>,
    pub source_url: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_file_name: Option<String>,
    pub pdf_file_size: Option<i64>,
    pub metadata: Option<Value>,
    pub views_count: i64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Box<Category>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
}

impl Document {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            summary: row.get("summary"),
            content: row.get("content"),
            doc_type: row.get("type"),
            reference_number: row.get("reference_number"),
            publication_date: row.get("publication_date"),
            effective_date: row.get("effective_date"),
            journal_officiel: row.get("journal_officiel"),
            status: row.get("status"),
            category_id: row.get("category_id"),
            source_url: row.get("source_url"),
            pdf_url: row.get("pdf_url"),
            pdf_file_name: row.get("pdf_file_name"),
            pdf_file_size: row.get("pdf_file_size"),
            metadata: json_column(row, "metadata"),
            views_count: row.get("views_count"),
            is_featured: row.get("is_featured"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            category: None,
            sections: None,
            articles: None,
        }
    }

    pub fn is_public(&self) -> bool {
        self.status == PUBLIC_STATUS
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub id: i64,
    pub title: String,
    pub number: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub document_id: i64,
    pub parent_section_id: Option<i64>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_sections: Option<Vec<Section>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
}

impl Section {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            number: row.get("number"),
            description: row.get("description"),
            content: row.get("content"),
            document_id: row.get("document_id"),
            parent_section_id: row.get("parent_section_id"),
            sort_order: row.get("sort_order"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            full_number: None,
            children_sections: None,
            articles: None,
        }
    }
}

/// Section numbers from the root down to `section_id`, blanks skipped,
/// joined with `" - "`. `sections` must contain the whole ancestry.
pub fn full_number(sections: &[Section], section_id: i64) -> String {
    let mut numbers = Vec::new();
    let mut current = sections.iter().find(|s| s.id == section_id);
    let mut guard = 0;
    while let Some(section) = current {
        if let Some(number) = section.number.as_deref().filter(|n| !n.is_empty()) {
            numbers.push(number);
        }
        guard += 1;
        if guard > sections.len() {
            break;
        }
        current = section
            .parent_section_id
            .and_then(|pid| sections.iter().find(|s| s.id == pid));
    }
    numbers.reverse();
    numbers.join(" - ")
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub number: String,
    pub title: Option<String>,
    pub content: String,
    pub commentary: Option<String>,
    pub document_id: i64,
    pub section_id: Option<i64>,
    pub sort_order: i64,
    pub cross_references: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Box<Document>>,
}

impl Article {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            number: row.get("number"),
            title: row.get("title"),
            content: row.get("content"),
            commentary: row.get("commentary"),
            document_id: row.get("document_id"),
            section_id: row.get("section_id"),
            sort_order: row.get("sort_order"),
            cross_references: json_column(row, "cross_references"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            full_reference: None,
            document: None,
        }
    }
}

/// `"<reference> - Article <number>"`, as cited in legal texts.
pub fn full_reference(reference_number: Option<&str>, article_number: &str) -> String {
    format!(
        "{} - Article {}",
        reference_number.unwrap_or_default(),
        article_number
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub title: Option<String>,
    pub context: Value,
    pub last_activity: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub operating_system: Option<String>,
    pub platform: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

impl ChatSession {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            context: json_column(row, "context").unwrap_or_else(|| Value::Array(Vec::new())),
            last_activity: ts_to_datetime(row.get("last_activity")),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            country: row.get("country"),
            country_name: row.get("country_name"),
            city: row.get("city"),
            device_type: row.get("device_type"),
            browser: row.get("browser"),
            browser_version: row.get("browser_version"),
            operating_system: row.get("operating_system"),
            platform: row.get("platform"),
            is_mobile: row.get("is_mobile"),
            is_tablet: row.get("is_tablet"),
            is_desktop: row.get("is_desktop"),
            language: row.get("language"),
            timezone: row.get("timezone"),
            screen_width: row.get("screen_width"),
            screen_height: row.get("screen_height"),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            messages: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Box<ChatSession>>,
}

impl ChatMessage {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            session_id: row.get("session_id"),
            role: row.get("role"),
            content: row.get("content"),
            metadata: json_column(row, "metadata"),
            sent_at: ts_to_datetime(row.get("sent_at")),
            created_at: ts_to_datetime(row.get("created_at")),
            updated_at: ts_to_datetime(row.get("updated_at")),
            session: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    /// Documents the assistant cited for this message, `[]` when none.
    pub fn cited_documents(&self) -> Vec<Value> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("cited_documents"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

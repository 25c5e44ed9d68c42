//! Legal documents: public listings, the detail view with its section tree,
//! and the write helpers shared by the back office, the import flow and
//! the seeder.

use anyhow::Result;
use chrono::{Months, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::categories::attach_categories;
use crate::db::now_ts;
use crate::models::{
    full_number, full_reference, Article, Document, Section, ARTICLE_COLUMNS, DOCUMENT_COLUMNS,
    PUBLIC_STATUS, SECTION_COLUMNS,
};
use crate::pagination::Page;

pub const FEATURED_LIMIT: i64 = 10;
pub const RECENT_LIMIT: i64 = 20;
pub const BY_TYPE_PER_PAGE: i64 = 20;
pub const ADMIN_PER_PAGE: i64 = 20;

/// Optional filters over public documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub doc_type: Option<String>,
    pub category_id: Option<i64>,
    /// Substring matched against title, content, summary and reference number.
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status: Option<String>,
}

fn push_public_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &DocumentFilter) {
    qb.push(" WHERE d.deleted_at IS NULL AND d.status = ")
        .push_bind(PUBLIC_STATUS);

    if let Some(doc_type) = &filter.doc_type {
        qb.push(" AND d.type = ").push_bind(doc_type.clone());
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND d.category_id = ").push_bind(category_id);
    }
    if let Some(term) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", term);
        qb.push(" AND (d.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.content LIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.summary LIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.reference_number LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = &filter.date_from {
        qb.push(" AND d.publication_date >= ").push_bind(from.clone());
    }
    if let Some(to) = &filter.date_to {
        qb.push(" AND d.publication_date <= ").push_bind(to.clone());
    }
    if let Some(status) = &filter.status {
        qb.push(" AND d.status = ").push_bind(status.clone());
    }
}

/// Public documents matching `filter`, newest publication first, each with
/// its category.
pub async fn list_public(
    pool: &SqlitePool,
    filter: &DocumentFilter,
    page: i64,
    per_page: i64,
) -> Result<Page<Document>> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM legal_documents d");
    push_public_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {} FROM legal_documents d", DOCUMENT_COLUMNS));
    push_public_filters(&mut qb, filter);
    qb.push(" ORDER BY d.publication_date DESC, d.id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(Page::<Document>::offset(page, per_page));

    let mut documents: Vec<Document> = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;

    Ok(Page::new(documents, page, per_page, total))
}

/// Public documents of one type, 20 per page.
pub async fn by_type(pool: &SqlitePool, doc_type: &str, page: i64) -> Result<Page<Document>> {
    let filter = DocumentFilter {
        doc_type: Some(doc_type.to_string()),
        ..Default::default()
    };
    list_public(pool, &filter, page, BY_TYPE_PER_PAGE).await
}

pub async fn featured(pool: &SqlitePool) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d
         WHERE d.deleted_at IS NULL AND d.status = ? AND d.is_featured = 1
         ORDER BY d.publication_date DESC, d.id DESC LIMIT ?",
        DOCUMENT_COLUMNS
    );
    let mut documents: Vec<Document> = sqlx::query(&sql)
        .bind(PUBLIC_STATUS)
        .bind(FEATURED_LIMIT)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;
    Ok(documents)
}

/// Public documents published within the last six months.
pub async fn recent(pool: &SqlitePool) -> Result<Vec<Document>> {
    let today = Utc::now().date_naive();
    let since = today.checked_sub_months(Months::new(6)).unwrap_or(today);

    let sql = format!(
        "SELECT {} FROM legal_documents d
         WHERE d.deleted_at IS NULL AND d.status = ? AND d.publication_date >= ?
         ORDER BY d.publication_date DESC, d.id DESC LIMIT ?",
        DOCUMENT_COLUMNS
    );
    let mut documents: Vec<Document> = sqlx::query(&sql)
        .bind(PUBLIC_STATUS)
        .bind(since.format("%Y-%m-%d").to_string())
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;
    Ok(documents)
}

/// Public document with category, section tree and articles. Counts a view.
pub async fn show_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d
         WHERE d.slug = ? AND d.status = ? AND d.deleted_at IS NULL",
        DOCUMENT_COLUMNS
    );
    let Some(row) = sqlx::query(&sql)
        .bind(slug)
        .bind(PUBLIC_STATUS)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let mut document = Document::from_row(&row);

    sqlx::query("UPDATE legal_documents SET views_count = views_count + 1 WHERE id = ?")
        .bind(document.id)
        .execute(pool)
        .await?;
    document.views_count += 1;

    load_relations(pool, &mut document).await?;
    Ok(Some(document))
}

/// Any non-deleted document, whatever its status.
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d WHERE d.id = ? AND d.deleted_at IS NULL",
        DOCUMENT_COLUMNS
    );
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(Document::from_row))
}

pub async fn find_by_reference(pool: &SqlitePool, reference: &str) -> Result<Option<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d WHERE d.reference_number = ? AND d.deleted_at IS NULL",
        DOCUMENT_COLUMNS
    );
    let row = sqlx::query(&sql).bind(reference).fetch_optional(pool).await?;
    Ok(row.as_ref().map(Document::from_row))
}

/// Fills category, section tree and flat article list.
pub async fn load_relations(pool: &SqlitePool, document: &mut Document) -> Result<()> {
    attach_categories(pool, std::slice::from_mut(document)).await?;

    let sql = format!(
        "SELECT {} FROM legal_sections s
         WHERE s.document_id = ? AND s.deleted_at IS NULL
         ORDER BY s.sort_order, s.id",
        SECTION_COLUMNS
    );
    let sections: Vec<Section> = sqlx::query(&sql)
        .bind(document.id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Section::from_row)
        .collect();

    let sql = format!(
        "SELECT {} FROM legal_articles a
         WHERE a.document_id = ? AND a.deleted_at IS NULL
         ORDER BY a.sort_order, a.id",
        ARTICLE_COLUMNS
    );
    let mut articles: Vec<Article> = sqlx::query(&sql)
        .bind(document.id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Article::from_row)
        .collect();
    for article in articles.iter_mut() {
        article.full_reference = Some(full_reference(
            document.reference_number.as_deref(),
            &article.number,
        ));
    }

    document.sections = Some(section_tree(&sections, &articles, None));
    document.articles = Some(articles);
    Ok(())
}

/// Nests `sections` under their parents starting at `parent`, attaching
/// each section's articles and full number.
fn section_tree(sections: &[Section], articles: &[Article], parent: Option<i64>) -> Vec<Section> {
    sections
        .iter()
        .filter(|s| s.parent_section_id == parent)
        .map(|s| {
            let mut node = s.clone();
            node.full_number = Some(full_number(sections, s.id));
            node.articles = Some(
                articles
                    .iter()
                    .filter(|a| a.section_id == Some(s.id))
                    .cloned()
                    .collect(),
            );
            node.children_sections = Some(section_tree(sections, articles, Some(s.id)));
            node
        })
        .collect()
}

// ============ Back office ============

/// All non-deleted documents with category, most recently updated first.
pub async fn admin_index(pool: &SqlitePool, page: i64) -> Result<Page<Document>> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM legal_documents WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await?;

    let sql = format!(
        "SELECT {} FROM legal_documents d WHERE d.deleted_at IS NULL
         ORDER BY d.updated_at DESC, d.id DESC LIMIT ? OFFSET ?",
        DOCUMENT_COLUMNS
    );
    let mut documents: Vec<Document> = sqlx::query(&sql)
        .bind(ADMIN_PER_PAGE)
        .bind(Page::<Document>::offset(page, ADMIN_PER_PAGE))
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;

    Ok(Page::new(documents, page, ADMIN_PER_PAGE, total))
}

/// Every column an insert or full update writes.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: String,
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
}

impl From<&Document> for DocumentInput {
    fn from(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            slug: doc.slug.clone(),
            summary: doc.summary.clone(),
            content: doc.content.clone(),
            doc_type: doc.doc_type.clone(),
            reference_number: doc.reference_number.clone(),
            publication_date: doc.publication_date.clone(),
            effective_date: doc.effective_date.clone(),
            journal_officiel: doc.journal_officiel.clone(),
            status: doc.status.clone(),
            category_id: doc.category_id,
            source_url: doc.source_url.clone(),
            pdf_url: doc.pdf_url.clone(),
            pdf_file_name: doc.pdf_file_name.clone(),
            pdf_file_size: doc.pdf_file_size,
            metadata: doc.metadata.clone(),
            views_count: doc.views_count,
            is_featured: doc.is_featured,
        }
    }
}

pub async fn insert(pool: &SqlitePool, input: &DocumentInput) -> Result<Document> {
    let now = now_ts();
    let metadata = input.metadata.as_ref().map(Value::to_string);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO legal_documents (
            title, slug, summary, content, type, reference_number, publication_date,
            effective_date, journal_officiel, status, category_id, source_url, pdf_url,
            pdf_file_name, pdf_file_size, metadata, views_count, is_featured, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.doc_type)
    .bind(&input.reference_number)
    .bind(&input.publication_date)
    .bind(&input.effective_date)
    .bind(&input.journal_officiel)
    .bind(&input.status)
    .bind(input.category_id)
    .bind(&input.source_url)
    .bind(&input.pdf_url)
    .bind(&input.pdf_file_name)
    .bind(input.pdf_file_size)
    .bind(metadata)
    .bind(input.views_count)
    .bind(input.is_featured)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    let document = find_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("document {} vanished after insert", id))?;
    Ok(document)
}

pub async fn update(pool: &SqlitePool, id: i64, input: &DocumentInput) -> Result<Document> {
    let metadata = input.metadata.as_ref().map(Value::to_string);

    sqlx::query(
        r#"
        UPDATE legal_documents SET
            title = ?, slug = ?, summary = ?, content = ?, type = ?, reference_number = ?,
            publication_date = ?, effective_date = ?, journal_officiel = ?, status = ?,
            category_id = ?, source_url = ?, pdf_url = ?, pdf_file_name = ?, pdf_file_size = ?,
            metadata = ?, views_count = ?, is_featured = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.doc_type)
    .bind(&input.reference_number)
    .bind(&input.publication_date)
    .bind(&input.effective_date)
    .bind(&input.journal_officiel)
    .bind(&input.status)
    .bind(input.category_id)
    .bind(&input.source_url)
    .bind(&input.pdf_url)
    .bind(&input.pdf_file_name)
    .bind(input.pdf_file_size)
    .bind(metadata)
    .bind(input.views_count)
    .bind(input.is_featured)
    .bind(now_ts())
    .bind(id)
    .execute(pool)
    .await?;

    let document = find_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("document {} not found after update", id))?;
    Ok(document)
}

pub async fn soft_delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let now = now_ts();
    sqlx::query("UPDATE legal_documents SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `base`, or `base-1`, `base-2`, ... until no row (deleted ones included)
/// other than `exclude_id` uses it.
pub async fn unique_slug(pool: &SqlitePool, base: &str, exclude_id: Option<i64>) -> Result<String> {
    let base = if base.is_empty() { "document" } else { base };
    let mut slug = base.to_string();
    let mut counter = 1;
    loop {
        let taken: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM legal_documents WHERE slug = ? AND id != ?",
        )
        .bind(&slug)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(pool)
        .await?;
        if !taken {
            return Ok(slug);
        }
        slug = format!("{}-{}", base, counter);
        counter += 1;
    }
}

pub async fn title_taken(pool: &SqlitePool, title: &str, exclude_id: Option<i64>) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM legal_documents
         WHERE title = ? AND id != ? AND deleted_at IS NULL",
    )
    .bind(title)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn reference_taken(
    pool: &SqlitePool,
    reference: &str,
    exclude_id: Option<i64>,
) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM legal_documents
         WHERE reference_number = ? AND id != ? AND deleted_at IS NULL",
    )
    .bind(reference)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// True when a live document other than `exclude_id` points at `pdf_url`.
pub async fn pdf_shared(pool: &SqlitePool, pdf_url: &str, exclude_id: i64) -> Result<bool> {
    let shared: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM legal_documents
         WHERE pdf_url = ? AND id != ? AND deleted_at IS NULL",
    )
    .bind(pdf_url)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;
    Ok(shared)
}

// ============ Sections and articles ============

#[derive(Debug, Clone, Default)]
pub struct NewSection {
    pub title: String,
    pub number: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub parent_section_id: Option<i64>,
    pub sort_order: i64,
}

pub async fn insert_section(pool: &SqlitePool, document_id: i64, new: &NewSection) -> Result<i64> {
    let now = now_ts();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO legal_sections
            (title, number, description, content, document_id, parent_section_id, sort_order, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.number)
    .bind(&new.description)
    .bind(&new.content)
    .bind(document_id)
    .bind(new.parent_section_id)
    .bind(new.sort_order)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub number: String,
    pub title: Option<String>,
    pub content: String,
    pub commentary: Option<String>,
    pub section_id: Option<i64>,
    pub sort_order: i64,
    pub cross_references: Option<Value>,
}

pub async fn insert_article(pool: &SqlitePool, document_id: i64, new: &NewArticle) -> Result<i64> {
    let now = now_ts();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO legal_articles
            (number, title, content, commentary, document_id, section_id, sort_order, cross_references, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&new.number)
    .bind(&new.title)
    .bind(&new.content)
    .bind(&new.commentary)
    .bind(document_id)
    .bind(new.section_id)
    .bind(new.sort_order)
    .bind(new.cross_references.as_ref().map(Value::to_string))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_document, test_pool};

    #[tokio::test]
    async fn list_public_hides_drafts_and_deleted() {
        let (_tmp, pool) = test_pool().await;
        let visible = insert(&pool, &sample_document("Loi sur l'eau", "loi", "active"))
            .await
            .unwrap();
        insert(&pool, &sample_document("Brouillon", "loi", "draft"))
            .await
            .unwrap();
        let gone = insert(&pool, &sample_document("Supprimé", "loi", "active"))
            .await
            .unwrap();
        soft_delete(&pool, gone.id).await.unwrap();

        let page = list_public(&pool, &DocumentFilter::default(), 1, 15)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, visible.id);
    }

    #[tokio::test]
    async fn search_filter_matches_reference() {
        let (_tmp, pool) = test_pool().await;
        let mut input = sample_document("Code du travail", "code", "active");
        input.reference_number = Some("Loi n° 2015-532".into());
        insert(&pool, &input).await.unwrap();
        insert(&pool, &sample_document("Code pénal", "code", "active"))
            .await
            .unwrap();

        let filter = DocumentFilter {
            search: Some("2015-532".into()),
            ..Default::default()
        };
        let page = list_public(&pool, &filter, 1, 15).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].title, "Code du travail");
    }

    #[tokio::test]
    async fn show_increments_views_and_builds_tree() {
        let (_tmp, pool) = test_pool().await;
        let mut input = sample_document("Constitution", "constitution", "active");
        input.reference_number = Some("Loi n° 2016-886".into());
        let doc = insert(&pool, &input).await.unwrap();

        let titre = insert_section(
            &pool,
            doc.id,
            &NewSection {
                title: "Des droits".into(),
                number: Some("Titre I".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let chapitre = insert_section(
            &pool,
            doc.id,
            &NewSection {
                title: "Des libertés".into(),
                number: Some("Chapitre 1".into()),
                parent_section_id: Some(titre),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        insert_article(
            &pool,
            doc.id,
            &NewArticle {
                number: "1".into(),
                content: "La personne humaine est sacrée.".into(),
                section_id: Some(chapitre),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let shown = show_by_slug(&pool, &doc.slug).await.unwrap().unwrap();
        assert_eq!(shown.views_count, 1);
        let sections = shown.sections.unwrap();
        assert_eq!(sections.len(), 1);
        let child = &sections[0].children_sections.as_ref().unwrap()[0];
        assert_eq!(child.full_number.as_deref(), Some("Titre I - Chapitre 1"));
        assert_eq!(child.articles.as_ref().unwrap().len(), 1);
        let articles = shown.articles.unwrap();
        assert_eq!(
            articles[0].full_reference.as_deref(),
            Some("Loi n° 2016-886 - Article 1")
        );

        let again = show_by_slug(&pool, &doc.slug).await.unwrap().unwrap();
        assert_eq!(again.views_count, 2);
    }

    #[tokio::test]
    async fn unique_slug_counts_up_and_sees_deleted_rows() {
        let (_tmp, pool) = test_pool().await;
        let first = insert(&pool, &sample_document("Décret", "decret", "active"))
            .await
            .unwrap();
        soft_delete(&pool, first.id).await.unwrap();

        assert_eq!(unique_slug(&pool, "decret", None).await.unwrap(), "decret-1");
        assert_eq!(
            unique_slug(&pool, "decret", Some(first.id)).await.unwrap(),
            "decret"
        );
    }

    #[tokio::test]
    async fn recent_only_covers_six_months() {
        let (_tmp, pool) = test_pool().await;
        let today = Utc::now().date_naive();
        let mut fresh = sample_document("Récent", "loi", "active");
        fresh.publication_date = Some(today.format("%Y-%m-%d").to_string());
        insert(&pool, &fresh).await.unwrap();
        let mut old = sample_document("Ancien", "loi", "active");
        old.publication_date = Some("2001-01-01".into());
        insert(&pool, &old).await.unwrap();

        let docs = recent(&pool).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Récent");
    }
}

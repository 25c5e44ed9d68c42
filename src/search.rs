//! Keyword search over public documents and their articles.
//!
//! Matching is a case-insensitive substring test (`LIKE '%term%'`) on the
//! text columns of each table. Three entry points serve the search page:
//!
//! - [`search`]: documents and/or articles matching a term, paginated.
//! - [`suggestions`]: short title/number matches for type-ahead.
//! - [`advanced`]: documents with structured filters (type, category, dates).

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::categories::attach_categories;
use crate::documents::{list_public, DocumentFilter};
use crate::models::{Article, Document, ARTICLE_COLUMNS, DOCUMENT_COLUMNS, PUBLIC_STATUS};
use crate::pagination::Page;

pub const SUGGESTION_MIN_CHARS: usize = 3;
pub const SUGGESTION_LIMIT: i64 = 5;

/// What [`search`] looks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Documents,
    Articles,
}

impl SearchScope {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.unwrap_or("all") {
            "all" | "" => Ok(SearchScope::All),
            "documents" => Ok(SearchScope::Documents),
            "articles" => Ok(SearchScope::Articles),
            other => bail!(
                "Unknown search type: {}. Use all, documents, or articles.",
                other
            ),
        }
    }

    fn documents(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Documents)
    }

    fn articles(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Articles)
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Page<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Page<Article>>,
}

/// Documents and/or articles whose text contains `query`. An optional
/// category restricts both to documents of that category.
pub async fn search(
    pool: &SqlitePool,
    query: &str,
    scope: SearchScope,
    category_id: Option<i64>,
    page: i64,
    per_page: i64,
) -> Result<SearchResults> {
    let documents = if scope.documents() {
        let filter = DocumentFilter {
            category_id,
            search: Some(query.to_string()),
            ..Default::default()
        };
        Some(list_public(pool, &filter, page, per_page).await?)
    } else {
        None
    };

    let articles = if scope.articles() {
        Some(search_articles(pool, query, category_id, page, per_page).await?)
    } else {
        None
    };

    Ok(SearchResults {
        documents,
        articles,
    })
}

fn push_article_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &str, category_id: Option<i64>) {
    let pattern = format!("%{}%", query);
    qb.push(
        " FROM legal_articles a JOIN legal_documents d ON d.id = a.document_id
          WHERE a.deleted_at IS NULL AND d.deleted_at IS NULL AND d.status = ",
    )
    .push_bind(PUBLIC_STATUS)
    .push(" AND (a.title LIKE ")
    .push_bind(pattern.clone())
    .push(" OR a.content LIKE ")
    .push_bind(pattern.clone())
    .push(" OR a.commentary LIKE ")
    .push_bind(pattern.clone())
    .push(" OR a.number LIKE ")
    .push_bind(pattern)
    .push(")");
    if let Some(category_id) = category_id {
        qb.push(" AND d.category_id = ").push_bind(category_id);
    }
}

async fn search_articles(
    pool: &SqlitePool,
    query: &str,
    category_id: Option<i64>,
    page: i64,
    per_page: i64,
) -> Result<Page<Article>> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*)");
    push_article_filters(&mut count_qb, query, category_id);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {}", ARTICLE_COLUMNS));
    push_article_filters(&mut qb, query, category_id);
    qb.push(" ORDER BY a.document_id, a.sort_order, a.id LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(Page::<Article>::offset(page, per_page));

    let mut articles: Vec<Article> = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(Article::from_row)
        .collect();

    attach_documents(pool, &mut articles).await?;
    Ok(Page::new(articles, page, per_page, total))
}

/// Fills `article.document` (with its category) for each article.
async fn attach_documents(pool: &SqlitePool, articles: &mut [Article]) -> Result<()> {
    let mut ids: Vec<i64> = articles.iter().map(|a| a.document_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM legal_documents d WHERE d.id IN (",
        DOCUMENT_COLUMNS
    ));
    let mut separated = qb.separated(", ");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let mut documents: Vec<Document> = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(Document::from_row)
        .collect();
    attach_categories(pool, &mut documents).await?;

    let by_id: HashMap<i64, Document> = documents.into_iter().map(|d| (d.id, d)).collect();
    for article in articles.iter_mut() {
        article.document = by_id.get(&article.document_id).cloned().map(Box::new);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct DocumentSuggestion {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

#[derive(Debug, Serialize)]
pub struct ArticleSuggestion {
    pub id: i64,
    pub number: String,
    pub title: Option<String>,
    pub document_id: i64,
    pub document: DocumentSuggestion,
}

#[derive(Debug, Serialize)]
pub struct Suggestions {
    pub documents: Vec<DocumentSuggestion>,
    pub articles: Vec<ArticleSuggestion>,
}

/// Type-ahead matches, `None` when the query is shorter than three characters.
pub async fn suggestions(pool: &SqlitePool, query: &str) -> Result<Option<Suggestions>> {
    if query.chars().count() < SUGGESTION_MIN_CHARS {
        return Ok(None);
    }
    let pattern = format!("%{}%", query);

    let documents = sqlx::query(
        "SELECT id, title, type FROM legal_documents
         WHERE deleted_at IS NULL AND status = ? AND title LIKE ?
         ORDER BY id LIMIT ?",
    )
    .bind(PUBLIC_STATUS)
    .bind(&pattern)
    .bind(SUGGESTION_LIMIT)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| DocumentSuggestion {
        id: row.get("id"),
        title: row.get("title"),
        doc_type: row.get("type"),
    })
    .collect();

    let articles = sqlx::query(
        "SELECT a.id, a.number, a.title, a.document_id,
                d.title AS document_title, d.type AS document_type
         FROM legal_articles a JOIN legal_documents d ON d.id = a.document_id
         WHERE a.deleted_at IS NULL AND d.deleted_at IS NULL AND d.status = ?
           AND (a.title LIKE ? OR a.number LIKE ?)
         ORDER BY a.id LIMIT ?",
    )
    .bind(PUBLIC_STATUS)
    .bind(&pattern)
    .bind(&pattern)
    .bind(SUGGESTION_LIMIT)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| {
        let document_id: i64 = row.get("document_id");
        ArticleSuggestion {
            id: row.get("id"),
            number: row.get("number"),
            title: row.get("title"),
            document_id,
            document: DocumentSuggestion {
                id: document_id,
                title: row.get("document_title"),
                doc_type: row.get("document_type"),
            },
        }
    })
    .collect();

    Ok(Some(Suggestions {
        documents,
        articles,
    }))
}

/// Public documents with structured filters. An empty query matches all.
pub async fn advanced(
    pool: &SqlitePool,
    query: &str,
    mut filter: DocumentFilter,
    page: i64,
    per_page: i64,
) -> Result<Page<Document>> {
    if !query.trim().is_empty() {
        filter.search = Some(query.to_string());
    }
    list_public(pool, &filter, page, per_page).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{insert, insert_article, NewArticle};
    use crate::testing::{sample_document, test_pool};

    #[test]
    fn scope_parsing() {
        assert_eq!(SearchScope::parse(None).unwrap(), SearchScope::All);
        assert_eq!(
            SearchScope::parse(Some("articles")).unwrap(),
            SearchScope::Articles
        );
        assert!(SearchScope::parse(Some("sections")).is_err());
    }

    #[tokio::test]
    async fn articles_of_drafts_are_not_found() {
        let (_tmp, pool) = test_pool().await;
        let public = insert(&pool, &sample_document("Code du travail", "code", "active"))
            .await
            .unwrap();
        let draft = insert(&pool, &sample_document("Projet", "loi", "draft"))
            .await
            .unwrap();
        for doc in [&public, &draft] {
            insert_article(
                &pool,
                doc.id,
                &NewArticle {
                    number: "1".into(),
                    content: "Le contrat de travail est conclu librement.".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let results = search(&pool, "contrat", SearchScope::Articles, None, 1, 15)
            .await
            .unwrap();
        assert!(results.documents.is_none());
        let articles = results.articles.unwrap();
        assert_eq!(articles.total, 1);
        let doc = articles.data[0].document.as_ref().unwrap();
        assert_eq!(doc.id, public.id);
    }

    #[tokio::test]
    async fn suggestions_need_three_chars() {
        let (_tmp, pool) = test_pool().await;
        insert(&pool, &sample_document("Code pénal", "code", "active"))
            .await
            .unwrap();

        assert!(suggestions(&pool, "co").await.unwrap().is_none());
        let found = suggestions(&pool, "Cod").await.unwrap().unwrap();
        assert_eq!(found.documents.len(), 1);
        assert_eq!(found.documents[0].doc_type, "code");
    }

    #[tokio::test]
    async fn advanced_filters_by_date_range() {
        let (_tmp, pool) = test_pool().await;
        let mut old = sample_document("Loi ancienne", "loi", "active");
        old.publication_date = Some("1990-05-01".into());
        insert(&pool, &old).await.unwrap();
        let mut new = sample_document("Loi nouvelle", "loi", "active");
        new.publication_date = Some("2022-05-01".into());
        insert(&pool, &new).await.unwrap();

        let filter = DocumentFilter {
            date_from: Some("2000-01-01".into()),
            ..Default::default()
        };
        let page = advanced(&pool, "", filter, 1, 15).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].title, "Loi nouvelle");
    }
}

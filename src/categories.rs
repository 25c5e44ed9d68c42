//! Legal categories: the two-level tree shown in the navigation and the
//! category pages listing their public documents.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::now_ts;
use crate::models::{Category, Document, CATEGORY_COLUMNS, DOCUMENT_COLUMNS, PUBLIC_STATUS};
use crate::text::slugify;

/// Input for [`create`]. The slug is derived from the name when absent.
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub is_active: bool,
}

/// Active root categories ordered by `sort_order`, each with its active children.
pub async fn list_roots(pool: &SqlitePool) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM legal_categories c
         WHERE c.is_active = 1 AND c.deleted_at IS NULL AND c.parent_id IS NULL
         ORDER BY c.sort_order, c.id",
        CATEGORY_COLUMNS
    );
    let mut roots: Vec<Category> = sqlx::query(&sql)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Category::from_row)
        .collect();

    for root in roots.iter_mut() {
        root.children = Some(active_children(pool, root.id).await?);
    }

    Ok(roots)
}

async fn active_children(pool: &SqlitePool, parent_id: i64) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM legal_categories c
         WHERE c.parent_id = ? AND c.is_active = 1 AND c.deleted_at IS NULL
         ORDER BY c.sort_order, c.id",
        CATEGORY_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(parent_id).fetch_all(pool).await?;
    Ok(rows.iter().map(Category::from_row).collect())
}

/// Category with its public documents and its children, each child carrying
/// its own public documents. `None` when missing or soft-deleted.
pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM legal_categories c WHERE c.slug = ? AND c.deleted_at IS NULL",
        CATEGORY_COLUMNS
    );
    let Some(row) = sqlx::query(&sql).bind(slug).fetch_optional(pool).await? else {
        return Ok(None);
    };
    let mut category = Category::from_row(&row);

    let mut documents = public_documents(pool, category.id).await?;
    attach_categories(pool, &mut documents).await?;
    category.documents = Some(documents);

    let sql = format!(
        "SELECT {} FROM legal_categories c
         WHERE c.parent_id = ? AND c.deleted_at IS NULL
         ORDER BY c.sort_order, c.id",
        CATEGORY_COLUMNS
    );
    let mut children: Vec<Category> = sqlx::query(&sql)
        .bind(category.id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(Category::from_row)
        .collect();
    for child in children.iter_mut() {
        child.documents = Some(public_documents(pool, child.id).await?);
    }
    category.children = Some(children);

    Ok(Some(category))
}

async fn public_documents(pool: &SqlitePool, category_id: i64) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT {} FROM legal_documents d
         WHERE d.category_id = ? AND d.status = ? AND d.deleted_at IS NULL
         ORDER BY d.publication_date DESC, d.id DESC",
        DOCUMENT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(category_id)
        .bind(PUBLIC_STATUS)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(Document::from_row).collect())
}

/// Fills `document.category` for every document that has a live category.
pub async fn attach_categories(pool: &SqlitePool, documents: &mut [Document]) -> Result<()> {
    let mut ids: Vec<i64> = documents.iter().filter_map(|d| d.category_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM legal_categories c WHERE c.deleted_at IS NULL AND c.id IN ({})",
        CATEGORY_COLUMNS, placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in &ids {
        query = query.bind(id);
    }
    let by_id: HashMap<i64, Category> = query
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| {
            let category = Category::from_row(row);
            (category.id, category)
        })
        .collect();

    for document in documents.iter_mut() {
        document.category = document
            .category_id
            .and_then(|id| by_id.get(&id))
            .cloned()
            .map(Box::new);
    }
    Ok(())
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM legal_categories c WHERE c.name = ? AND c.deleted_at IS NULL",
        CATEGORY_COLUMNS
    );
    let row = sqlx::query(&sql).bind(name).fetch_optional(pool).await?;
    Ok(row.as_ref().map(Category::from_row))
}

/// True when a live category with this id exists.
pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM legal_categories WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(found)
}

/// Active categories ordered by `sort_order`, flat.
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM legal_categories c
         WHERE c.is_active = 1 AND c.deleted_at IS NULL
         ORDER BY c.sort_order, c.id",
        CATEGORY_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(Category::from_row).collect())
}

pub async fn create(pool: &SqlitePool, new: &NewCategory) -> Result<Category> {
    let slug = match new.slug.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => slugify(&new.name),
    };
    let now = now_ts();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO legal_categories
            (name, slug, description, color, icon, parent_id, sort_order, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&new.name)
    .bind(&slug)
    .bind(&new.description)
    .bind(&new.color)
    .bind(&new.icon)
    .bind(new.parent_id)
    .bind(new.sort_order)
    .bind(new.is_active)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {} FROM legal_categories c WHERE c.id = ?",
        CATEGORY_COLUMNS
    );
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    Ok(Category::from_row(&row))
}

/// Renames a category. The slug follows the new name unless one is given.
pub async fn rename(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    slug: Option<&str>,
) -> Result<()> {
    let slug = slug
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| slugify(name));
    sqlx::query("UPDATE legal_categories SET name = ?, slug = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(slug)
        .bind(now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;

    fn category(name: &str, parent_id: Option<i64>, sort_order: i64, active: bool) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            parent_id,
            sort_order,
            is_active: active,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn roots_are_ordered_with_active_children() {
        let (_tmp, pool) = test_pool().await;
        let penal = create(&pool, &category("Droit pénal", None, 3, true)).await.unwrap();
        let civil = create(&pool, &category("Droit civil", None, 2, true)).await.unwrap();
        create(&pool, &category("Inactif", None, 1, false)).await.unwrap();
        create(&pool, &category("Procédure pénale", Some(penal.id), 2, true)).await.unwrap();
        create(&pool, &category("Code pénal", Some(penal.id), 1, true)).await.unwrap();
        create(&pool, &category("Archivé", Some(penal.id), 0, false)).await.unwrap();

        let roots = list_roots(&pool).await.unwrap();
        let names: Vec<_> = roots.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Droit civil", "Droit pénal"]);
        assert_eq!(roots[0].id, civil.id);

        let children: Vec<_> = roots[1]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(children, vec!["Code pénal", "Procédure pénale"]);
    }

    #[tokio::test]
    async fn slug_generated_and_renamed() {
        let (_tmp, pool) = test_pool().await;
        let created = create(&pool, &category("Droits de l'homme", None, 0, true)).await.unwrap();
        assert_eq!(created.slug, "droits-de-lhomme");

        rename(&pool, created.id, "Libertés publiques", None).await.unwrap();
        let found = get_by_slug(&pool, "libertes-publiques").await.unwrap();
        assert!(found.is_some());
        assert!(get_by_slug(&pool, "droits-de-lhomme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_slug_is_none() {
        let (_tmp, pool) = test_pool().await;
        assert!(get_by_slug(&pool, "nope").await.unwrap().is_none());
        assert!(!exists(&pool, 42).await.unwrap());
    }
}

//! Back-office document management: validation of submitted forms, PDF
//! handling and the create/update/delete/duplicate/import operations.
//!
//! Forms arrive as multipart bodies; the HTTP layer collects them into a
//! [`DocumentForm`] and everything else happens here.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::analysis::{analyze_text, normalize_date, DocumentAnalysis};
use crate::categories;
use crate::config::LlmConfig;
use crate::documents::{
    find_by_id, insert, load_relations, pdf_shared, reference_taken, soft_delete, title_taken,
    unique_slug, update, DocumentInput,
};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::extract::{extract_pdf_text, looks_like_pdf, MIME_PDF};
use crate::llm::ChatModel;
use crate::models::{Document, ADMIN_DOCUMENT_TYPES, PUBLIC_STATUS};
use crate::storage::{delete_url, store_pdf};
use crate::text::{clean_pdf_text, limit, slugify};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_REFERENCE_CHARS: usize = 100;
pub const MAX_SUMMARY_CHARS: usize = 1000;
pub const PDF_SUMMARY_CHARS: usize = 500;
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// Statuses accepted from the back office. `published` is stored as the
/// public status.
pub const FORM_STATUSES: [&str; 4] = ["draft", "published", "archived", "active"];

/// An uploaded file field.
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedPdf {
    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }

    fn is_pdf(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .map(|ct| ct == MIME_PDF || ct == "application/octet-stream")
            .unwrap_or(true);
        let named = self.file_name.to_lowercase().ends_with(".pdf");
        declared && named && looks_like_pdf(&self.bytes)
    }
}

/// Raw fields of a document form. Blank strings are stored as `None`;
/// [`DocumentForm::was_sent`] tells a blank field from a missing one.
#[derive(Debug, Clone, Default)]
pub struct DocumentForm {
    pub title: Option<String>,
    pub reference_number: Option<String>,
    pub doc_type: Option<String>,
    pub category_id: Option<String>,
    pub status: Option<String>,
    pub publication_date: Option<String>,
    pub effective_date: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub journal_officiel: Option<String>,
    pub source_url: Option<String>,
    pub is_featured: Option<String>,
    pub pdf_file: Option<UploadedPdf>,
    sent: BTreeSet<String>,
}

impl DocumentForm {
    /// Stores a text field by its form name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        self.sent.insert(name.to_string());
        match name {
            "title" => self.title = value,
            "reference_number" => self.reference_number = value,
            "type" => self.doc_type = value,
            "category_id" => self.category_id = value,
            "status" => self.status = value,
            "publication_date" => self.publication_date = value,
            "effective_date" => self.effective_date = value,
            "summary" => self.summary = value,
            "content" => self.content = value,
            "journal_officiel" => self.journal_officiel = value,
            "source_url" => self.source_url = value,
            "is_featured" => self.is_featured = value,
            _ => {
                self.sent.remove(name);
            }
        }
    }

    /// True when the field was part of the submitted form, even blank.
    pub fn was_sent(&self, name: &str) -> bool {
        self.sent.contains(name)
    }
}

/// Maps a form status to the stored one.
pub fn normalize_status(status: &str) -> String {
    if status == "published" {
        PUBLIC_STATUS.to_string()
    } else {
        status.to_string()
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw, Some("1" | "true" | "on" | "yes"))
}

fn max_pdf_message(max_bytes: usize) -> String {
    format!(
        "Le fichier PDF ne peut pas dépasser {}MB.",
        max_bytes / (1024 * 1024)
    )
}

fn check_pdf(pdf: &UploadedPdf, max_bytes: usize, errors: &mut ValidationErrors) {
    if !pdf.is_pdf() {
        errors.add("pdf_file", "Le fichier doit être un PDF.");
    }
    if pdf.bytes.len() > max_bytes {
        errors.add("pdf_file", max_pdf_message(max_bytes));
    }
}

/// Required-PDF check used by the analysis endpoints.
pub fn require_pdf<'a>(
    pdf: Option<&'a UploadedPdf>,
    missing_message: &str,
    max_bytes: usize,
) -> ApiResult<&'a UploadedPdf> {
    let Some(pdf) = pdf else {
        return Err(ApiError::invalid("pdf_file", missing_message));
    };
    let mut errors = ValidationErrors::new();
    check_pdf(pdf, max_bytes, &mut errors);
    errors.into_result()?;
    Ok(pdf)
}

fn check_date(
    field: &str,
    label: &str,
    raw: Option<&str>,
    not_future: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let raw = raw?;
    let Some(date) = normalize_date(raw) else {
        errors.add(field, format!("{} n'est pas une date valide.", label));
        return None;
    };
    if not_future && date > Utc::now().date_naive().format("%Y-%m-%d").to_string() {
        errors.add(
            field,
            "La date de publication ne peut pas être dans le futur.",
        );
    }
    Some(date)
}

async fn check_category(
    pool: &SqlitePool,
    raw: Option<&str>,
    errors: &mut ValidationErrors,
) -> Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(id) if categories::exists(pool, id).await? => Ok(Some(id)),
        _ => {
            errors.add("category_id", "La catégorie sélectionnée est invalide.");
            Ok(None)
        }
    }
}

/// Validated values of a create/update form.
#[derive(Debug, Clone)]
struct ValidDocument {
    title: String,
    reference_number: Option<String>,
    doc_type: String,
    category_id: Option<i64>,
    status: String,
    publication_date: Option<String>,
    effective_date: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

async fn validate_document(
    pool: &SqlitePool,
    form: &DocumentForm,
    existing: Option<&Document>,
    max_pdf_bytes: usize,
) -> ApiResult<ValidDocument> {
    let mut errors = ValidationErrors::new();
    let exclude_id = existing.map(|d| d.id);

    match form.title.as_deref() {
        None => errors.add("title", "Le titre est obligatoire."),
        Some(t) if t.chars().count() > MAX_TITLE_CHARS => {
            errors.add("title", "Le titre ne peut pas dépasser 255 caractères.")
        }
        Some(t) => {
            if existing.is_some() && title_taken(pool, t, exclude_id).await? {
                errors.add("title", "Un document avec ce titre existe déjà.");
            }
        }
    }

    if let Some(reference) = form.reference_number.as_deref() {
        if reference.chars().count() > MAX_REFERENCE_CHARS {
            errors.add(
                "reference_number",
                "Le numéro de référence ne peut pas dépasser 100 caractères.",
            );
        } else if existing.is_some() && reference_taken(pool, reference, exclude_id).await? {
            errors.add(
                "reference_number",
                "Un document avec ce numéro de référence existe déjà.",
            );
        }
    }

    match form.doc_type.as_deref() {
        None => errors.add("type", "Le type de document est obligatoire."),
        Some(t) if !ADMIN_DOCUMENT_TYPES.contains(&t) => {
            errors.add("type", "Le type de document est invalide.")
        }
        Some(_) => {}
    }

    match form.status.as_deref() {
        None => errors.add("status", "Le statut est obligatoire."),
        Some(s) if !FORM_STATUSES.contains(&s) => errors.add("status", "Le statut est invalide."),
        Some(_) => {}
    }

    if form
        .summary
        .as_deref()
        .is_some_and(|s| existing.is_some() && s.chars().count() > MAX_SUMMARY_CHARS)
    {
        errors.add("summary", "Le résumé ne peut pas dépasser 1000 caractères.");
    }

    let category_id = check_category(pool, form.category_id.as_deref(), &mut errors).await?;
    let publication_date = check_date(
        "publication_date",
        "La date de publication",
        form.publication_date.as_deref(),
        existing.is_some(),
        &mut errors,
    );
    let effective_date = check_date(
        "effective_date",
        "La date d'entrée en vigueur",
        form.effective_date.as_deref(),
        false,
        &mut errors,
    );

    if let Some(pdf) = &form.pdf_file {
        check_pdf(pdf, max_pdf_bytes, &mut errors);
    }

    errors.into_result()?;

    Ok(ValidDocument {
        title: form.title.clone().unwrap_or_default(),
        reference_number: form.reference_number.clone(),
        doc_type: form.doc_type.clone().unwrap_or_default(),
        category_id,
        status: normalize_status(form.status.as_deref().unwrap_or("draft")),
        publication_date,
        effective_date,
        summary: form.summary.clone(),
        content: form.content.clone(),
    })
}

/// Cleaned text of an uploaded PDF, `None` when nothing could be extracted.
fn pdf_text(pdf: &UploadedPdf) -> Option<String> {
    match extract_pdf_text(&pdf.bytes) {
        Ok(raw) => Some(clean_pdf_text(&raw)).filter(|t| !t.is_empty()),
        Err(err) => {
            tracing::warn!(error = %err, file = %pdf.file_name, "PDF text extraction failed");
            None
        }
    }
}

/// Applies a stored upload to `input`, filling empty content/summary from
/// the PDF text.
async fn attach_pdf(
    storage_root: &Path,
    pdf: &UploadedPdf,
    input: &mut DocumentInput,
    replace_content: bool,
) -> Result<()> {
    let stored = store_pdf(storage_root, &slugify(&input.title), &pdf.bytes).await?;
    input.pdf_url = Some(stored.url);
    input.pdf_file_name = Some(pdf.file_name.clone());
    input.pdf_file_size = Some(stored.size);

    if let Some(text) = pdf_text(pdf) {
        if replace_content || input.content.is_empty() {
            input.content = text.clone();
        }
        if input.summary.is_none() {
            input.summary = Some(limit(&text, PDF_SUMMARY_CHARS));
        }
    }
    Ok(())
}

/// Deletes a document's PDF unless another live document still uses it.
async fn release_pdf(pool: &SqlitePool, storage_root: &Path, document: &Document) -> Result<()> {
    let Some(url) = document.pdf_url.as_deref() else {
        return Ok(());
    };
    if pdf_shared(pool, url, document.id).await? {
        tracing::info!(document_id = document.id, url, "PDF kept, still referenced");
        return Ok(());
    }
    if let Err(err) = delete_url(storage_root, url).await {
        tracing::warn!(error = %err, url, "failed to delete PDF");
    }
    Ok(())
}

pub async fn find_live(pool: &SqlitePool, id: i64) -> ApiResult<Document> {
    find_by_id(pool, id).await?.ok_or(ApiError::NotFound)
}

pub async fn create_document(
    pool: &SqlitePool,
    storage_root: &Path,
    max_pdf_bytes: usize,
    form: &DocumentForm,
) -> ApiResult<Document> {
    let valid = validate_document(pool, form, None, max_pdf_bytes).await?;

    let mut input = DocumentInput {
        slug: unique_slug(pool, &slugify(&valid.title), None).await?,
        title: valid.title,
        summary: valid.summary,
        content: valid.content.unwrap_or_default(),
        doc_type: valid.doc_type,
        reference_number: valid.reference_number,
        publication_date: valid.publication_date,
        effective_date: valid.effective_date,
        journal_officiel: form.journal_officiel.clone(),
        status: valid.status,
        category_id: valid.category_id,
        source_url: form.source_url.clone(),
        is_featured: parse_flag(form.is_featured.as_deref()),
        ..Default::default()
    };

    if let Some(pdf) = &form.pdf_file {
        attach_pdf(storage_root, pdf, &mut input, false).await?;
    }

    let mut document = insert(pool, &input).await?;
    categories::attach_categories(pool, std::slice::from_mut(&mut document)).await?;
    tracing::info!(document_id = document.id, slug = %document.slug, "document created");
    Ok(document)
}

pub async fn update_document(
    pool: &SqlitePool,
    storage_root: &Path,
    max_pdf_bytes: usize,
    id: i64,
    form: &DocumentForm,
) -> ApiResult<Document> {
    let existing = find_live(pool, id).await?;
    let valid = validate_document(pool, form, Some(&existing), max_pdf_bytes).await?;

    let mut input = DocumentInput::from(&existing);
    if valid.title != existing.title {
        input.slug = unique_slug(pool, &slugify(&valid.title), Some(id)).await?;
    }
    input.title = valid.title;
    input.doc_type = valid.doc_type;
    input.status = valid.status;
    // Fields left out of the form keep their stored value; blank ones clear it.
    if form.was_sent("reference_number") {
        input.reference_number = valid.reference_number;
    }
    if form.was_sent("category_id") {
        input.category_id = valid.category_id;
    }
    if form.was_sent("publication_date") {
        input.publication_date = valid.publication_date;
    }
    if form.was_sent("effective_date") {
        input.effective_date = valid.effective_date;
    }
    if form.was_sent("summary") {
        input.summary = valid.summary;
    }
    if let Some(content) = valid.content {
        input.content = content;
    }
    if form.was_sent("journal_officiel") {
        input.journal_officiel = form.journal_officiel.clone();
    }
    if form.was_sent("source_url") {
        input.source_url = form.source_url.clone();
    }
    if form.was_sent("is_featured") {
        input.is_featured = parse_flag(form.is_featured.as_deref());
    }

    if let Some(pdf) = &form.pdf_file {
        release_pdf(pool, storage_root, &existing).await?;
        let replace_content = form.content.is_none();
        attach_pdf(storage_root, pdf, &mut input, replace_content).await?;
    }

    let mut document = update(pool, id, &input).await?;
    categories::attach_categories(pool, std::slice::from_mut(&mut document)).await?;
    tracing::info!(document_id = id, "document updated");
    Ok(document)
}

/// Removes the document's PDF (unless shared) and soft-deletes it.
pub async fn delete_document(pool: &SqlitePool, storage_root: &Path, id: i64) -> ApiResult<()> {
    let document = find_live(pool, id).await?;
    tracing::info!(document_id = id, title = %document.title, "deleting document");
    release_pdf(pool, storage_root, &document).await?;
    soft_delete(pool, id).await?;
    Ok(())
}

/// Copy titled `"<title> (Copie)"`, as an unviewed draft sharing the PDF.
pub async fn duplicate_document(pool: &SqlitePool, id: i64) -> ApiResult<Document> {
    let original = find_live(pool, id).await?;
    let mut input = DocumentInput::from(&original);
    input.title = format!("{} (Copie)", original.title);
    input.slug = unique_slug(pool, &slugify(&input.title), None).await?;
    input.status = "draft".to_string();
    input.views_count = 0;

    let document = insert(pool, &input).await?;
    tracing::info!(from = id, document_id = document.id, "document duplicated");
    Ok(document)
}

/// Document with category, sections (with articles) and articles.
pub async fn show_document(pool: &SqlitePool, id: i64) -> ApiResult<Document> {
    let mut document = find_live(pool, id).await?;
    load_relations(pool, &mut document).await?;
    Ok(document)
}

// ============ Import ============

#[derive(Debug, Serialize)]
pub struct Imported {
    pub document: Document,
    pub analysis: DocumentAnalysis,
    pub message: String,
}

/// Success message reporting how the metadata was obtained.
pub fn import_message(analysis: &DocumentAnalysis) -> String {
    let percent = (analysis.confidence_score * 100.0).round() as i64;
    let detail = if analysis.is_ai() && analysis.confidence_score > HIGH_CONFIDENCE {
        format!("(Analyse IA avec confiance élevée: {}%)", percent)
    } else if analysis.is_ai() {
        format!(
            "(Analyse IA avec confiance moyenne: {}% - Vérifiez les informations)",
            percent
        )
    } else {
        "(Analyse de base - Complétez les informations manuellement)".to_string()
    };
    format!("Document créé avec succès ! {}", detail)
}

async fn unique_title(pool: &SqlitePool, title: &str) -> Result<String> {
    let mut candidate = title.to_string();
    let mut counter = 1;
    while title_taken(pool, &candidate, None).await? {
        candidate = format!("{} ({})", title, counter);
        counter += 1;
    }
    Ok(candidate)
}

/// Creates a document from a PDF alone: the analysis fills every field the
/// form leaves blank.
pub async fn import_document(
    pool: &SqlitePool,
    model: &dyn ChatModel,
    llm: &LlmConfig,
    storage_root: &Path,
    max_pdf_bytes: usize,
    form: &DocumentForm,
) -> ApiResult<Imported> {
    let mut errors = ValidationErrors::new();
    match &form.pdf_file {
        None => errors.add("pdf_file", "Un fichier PDF est obligatoire."),
        Some(pdf) => check_pdf(pdf, max_pdf_bytes, &mut errors),
    }
    if let Some(t) = form.title.as_deref() {
        if t.chars().count() > MAX_TITLE_CHARS {
            errors.add("title", "Le titre ne peut pas dépasser 255 caractères.");
        }
    }
    if form
        .reference_number
        .as_deref()
        .is_some_and(|r| r.chars().count() > MAX_REFERENCE_CHARS)
    {
        errors.add(
            "reference_number",
            "Le numéro de référence ne peut pas dépasser 100 caractères.",
        );
    }
    if let Some(t) = form.doc_type.as_deref() {
        if !ADMIN_DOCUMENT_TYPES.contains(&t) {
            errors.add("type", "Le type de document est invalide.");
        }
    }
    if let Some(s) = form.status.as_deref() {
        if !FORM_STATUSES.contains(&s) {
            errors.add("status", "Le statut est invalide.");
        }
    }
    if form
        .summary
        .as_deref()
        .is_some_and(|s| s.chars().count() > MAX_SUMMARY_CHARS)
    {
        errors.add("summary", "Le résumé ne peut pas dépasser 1000 caractères.");
    }
    let category_id = check_category(pool, form.category_id.as_deref(), &mut errors).await?;
    let publication_date = check_date(
        "publication_date",
        "La date de publication",
        form.publication_date.as_deref(),
        true,
        &mut errors,
    );
    let effective_date = check_date(
        "effective_date",
        "La date d'entrée en vigueur",
        form.effective_date.as_deref(),
        false,
        &mut errors,
    );
    errors.into_result()?;

    let Some(pdf) = form.pdf_file.as_ref() else {
        return Err(ApiError::invalid("pdf_file", "Un fichier PDF est obligatoire."));
    };

    let raw_text = match extract_pdf_text(&pdf.bytes) {
        Ok(raw) => Some(raw),
        Err(err) => {
            tracing::warn!(error = %err, file = %pdf.file_name, "PDF text extraction failed");
            None
        }
    };
    let analysis = analyze_text(model, llm, raw_text.as_deref(), &pdf.file_name).await;

    let title = unique_title(pool, form.title.as_deref().unwrap_or(&analysis.title)).await?;
    let mut reference_number = form
        .reference_number
        .clone()
        .or_else(|| analysis.reference_number.clone());
    if let Some(reference) = reference_number.as_deref() {
        if reference_taken(pool, reference, None).await? {
            reference_number = Some(format!("{}-{}", reference, Utc::now().timestamp()));
        }
    }

    let slug = unique_slug(pool, &slugify(&title), None).await?;
    let stored = store_pdf(storage_root, &slugify(&title), &pdf.bytes).await?;
    let content = raw_text
        .as_deref()
        .map(clean_pdf_text)
        .unwrap_or_default();

    let input = DocumentInput {
        title,
        slug,
        summary: form.summary.clone().or_else(|| analysis.summary.clone()),
        content,
        doc_type: form.doc_type.clone().unwrap_or_else(|| analysis.doc_type.clone()),
        reference_number,
        publication_date: publication_date.or_else(|| analysis.publication_date.clone()),
        effective_date: effective_date.or_else(|| analysis.effective_date.clone()),
        status: normalize_status(form.status.as_deref().unwrap_or("draft")),
        category_id,
        pdf_url: Some(stored.url),
        pdf_file_name: Some(pdf.file_name.clone()),
        pdf_file_size: Some(stored.size),
        metadata: Some(json!({
            "analysis": {
                "source": analysis.analysis_source,
                "confidence_score": analysis.confidence_score,
                "category_suggestion": analysis.category_suggestion,
            }
        })),
        ..Default::default()
    };

    let mut document = insert(pool, &input).await?;
    categories::attach_categories(pool, std::slice::from_mut(&mut document)).await?;
    let message = import_message(&analysis);
    tracing::info!(
        document_id = document.id,
        source = %analysis.analysis_source,
        confidence = analysis.confidence_score,
        "document imported"
    );

    Ok(Imported {
        document,
        analysis,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::basic_analysis;
    use crate::llm::DisabledModel;
    use crate::testing::{minimal_pdf, sample_document, test_pool};

    const MAX: usize = 50 * 1024 * 1024;

    fn form(title: &str, doc_type: &str, status: &str) -> DocumentForm {
        let mut form = DocumentForm::default();
        form.set("title", title.into());
        form.set("type", doc_type.into());
        form.set("status", status.into());
        form
    }

    fn pdf(name: &str) -> UploadedPdf {
        UploadedPdf {
            file_name: name.into(),
            content_type: Some(MIME_PDF.into()),
            bytes: minimal_pdf("Loi portant code de l'environnement"),
        }
    }

    fn errors_of(err: ApiError) -> ValidationErrors {
        match err {
            ApiError::Validation(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn store_requires_title_type_status() {
        let (tmp, pool) = test_pool().await;
        let err = create_document(&pool, tmp.path(), MAX, &DocumentForm::default())
            .await
            .unwrap_err();
        let errors = errors_of(err);
        assert!(errors.has("title") && errors.has("type") && errors.has("status"));
        assert_eq!(errors.first_message(), Some("Le statut est obligatoire."));
    }

    #[tokio::test]
    async fn store_rejects_autre_type_and_unknown_category() {
        let (tmp, pool) = test_pool().await;
        let mut f = form("Texte divers", "autre", "draft");
        f.set("category_id", "999".into());
        let errors = errors_of(create_document(&pool, tmp.path(), MAX, &f).await.unwrap_err());
        assert!(errors.has("type"));
        assert!(errors.has("category_id"));
    }

    #[tokio::test]
    async fn published_is_stored_as_public() {
        let (tmp, pool) = test_pool().await;
        let doc = create_document(&pool, tmp.path(), MAX, &form("Loi sur l'eau", "loi", "published"))
            .await
            .unwrap();
        assert_eq!(doc.status, PUBLIC_STATUS);
        assert_eq!(doc.slug, "loi-sur-leau");

        let again = create_document(&pool, tmp.path(), MAX, &form("Loi sur l'eau", "loi", "draft"))
            .await
            .unwrap();
        assert_eq!(again.slug, "loi-sur-leau-1");
    }

    #[tokio::test]
    async fn update_checks_uniqueness_and_future_dates() {
        let (tmp, pool) = test_pool().await;
        let a = insert(&pool, &sample_document("Premier texte", "loi", "active")).await.unwrap();
        insert(&pool, &sample_document("Second texte", "loi", "active")).await.unwrap();

        let mut f = form("Second texte", "loi", "active");
        f.set("publication_date", "2999-01-01".into());
        let errors = errors_of(update_document(&pool, tmp.path(), MAX, a.id, &f).await.unwrap_err());
        assert_eq!(
            errors.first_message(),
            Some("La date de publication ne peut pas être dans le futur.")
        );
        assert!(errors.has("title"));

        let renamed = update_document(&pool, tmp.path(), MAX, a.id, &form("Texte renommé", "decret", "archived"))
            .await
            .unwrap();
        assert_eq!(renamed.slug, "texte-renomme");
        assert_eq!(renamed.doc_type, "decret");
    }

    #[tokio::test]
    async fn update_keeps_fields_left_out_of_the_form() {
        let (tmp, pool) = test_pool().await;
        let mut input = sample_document("Loi foncière", "loi", "active");
        input.reference_number = Some("Loi n° 98-750".into());
        let doc = insert(&pool, &input).await.unwrap();

        let kept = update_document(&pool, tmp.path(), MAX, doc.id, &form("Loi foncière", "loi", "active"))
            .await
            .unwrap();
        assert_eq!(kept.summary.as_deref(), Some("Résumé de Loi foncière"));
        assert_eq!(kept.reference_number.as_deref(), Some("Loi n° 98-750"));
        assert_eq!(kept.publication_date.as_deref(), Some("2020-01-01"));

        let mut f = form("Loi foncière", "loi", "active");
        f.set("summary", "  ".into());
        f.set("reference_number", "".into());
        let cleared = update_document(&pool, tmp.path(), MAX, doc.id, &f).await.unwrap();
        assert_eq!(cleared.summary, None);
        assert_eq!(cleared.reference_number, None);
        assert_eq!(cleared.publication_date.as_deref(), Some("2020-01-01"));
    }

    #[tokio::test]
    async fn rejects_non_pdf_upload() {
        let (tmp, pool) = test_pool().await;
        let mut f = form("Avec fichier", "loi", "draft");
        f.pdf_file = Some(UploadedPdf {
            file_name: "note.txt".into(),
            content_type: Some("text/plain".into()),
            bytes: b"hello".to_vec(),
        });
        let errors = errors_of(create_document(&pool, tmp.path(), MAX, &f).await.unwrap_err());
        assert_eq!(errors.first_message(), Some("Le fichier doit être un PDF."));

        f.pdf_file = Some(pdf("gros.pdf"));
        let errors = errors_of(create_document(&pool, tmp.path(), 10, &f).await.unwrap_err());
        assert!(errors.has("pdf_file"));
    }

    #[tokio::test]
    async fn duplicate_shares_pdf_and_delete_keeps_it() {
        let (tmp, pool) = test_pool().await;
        let mut f = form("Code minier", "code", "active");
        f.pdf_file = Some(pdf("code_minier.pdf"));
        let original = create_document(&pool, tmp.path(), MAX, &f).await.unwrap();
        let url = original.pdf_url.clone().unwrap();

        let copy = duplicate_document(&pool, original.id).await.unwrap();
        assert_eq!(copy.title, "Code minier (Copie)");
        assert_eq!(copy.status, "draft");
        assert_eq!(copy.views_count, 0);
        assert_eq!(copy.pdf_url.as_deref(), Some(url.as_str()));

        let path = crate::storage::resolve_url(tmp.path(), &url).unwrap();
        delete_document(&pool, tmp.path(), original.id).await.unwrap();
        assert!(path.exists());
        assert!(matches!(find_live(&pool, original.id).await, Err(ApiError::NotFound)));

        delete_document(&pool, tmp.path(), copy.id).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn import_uses_basic_analysis_without_model() {
        let (tmp, pool) = test_pool().await;
        insert(&pool, &sample_document("env", "loi", "active")).await.unwrap();

        let mut f = DocumentForm::default();
        f.pdf_file = Some(pdf("env.pdf"));
        f.set("title", "env".into());
        let imported = import_document(&pool, &DisabledModel, &LlmConfig::default(), tmp.path(), MAX, &f)
            .await
            .unwrap();

        assert_eq!(imported.document.title, "env (1)");
        assert_eq!(imported.document.status, "draft");
        assert!(imported.document.pdf_url.is_some());
        assert_eq!(
            imported.message,
            "Document créé avec succès ! (Analyse de base - Complétez les informations manuellement)"
        );
    }

    #[tokio::test]
    async fn import_requires_pdf() {
        let (tmp, pool) = test_pool().await;
        let err = import_document(
            &pool,
            &DisabledModel,
            &LlmConfig::default(),
            tmp.path(),
            MAX,
            &DocumentForm::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            errors_of(err).first_message(),
            Some("Un fichier PDF est obligatoire.")
        );
    }

    #[test]
    fn confidence_messages() {
        let mut analysis = basic_analysis("x.pdf", None);
        analysis.analysis_source = "ai".into();
        analysis.confidence_score = 0.85;
        assert!(import_message(&analysis).ends_with("(Analyse IA avec confiance élevée: 85%)"));
        analysis.confidence_score = 0.5;
        assert!(import_message(&analysis).contains("confiance moyenne: 50% - Vérifiez"));
    }
}

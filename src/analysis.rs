//! Metadata extraction for uploaded legal PDFs.
//!
//! The model is asked for a strict JSON description of the document (title,
//! type, reference, summary, dates). Its answer is validated field by field.
//! When the text cannot be extracted or the model fails, a keyword-based
//! fallback guesses what it can with a low confidence score.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::config::LlmConfig;
use crate::extract::extract_pdf_text;
use crate::llm::{ChatModel, ChatTurn, CompletionRequest};
use crate::models::ADMIN_DOCUMENT_TYPES;
use crate::text::{clean_extracted_text, file_stem, limit, strip_think_tags};

/// Characters of document text sent to the model.
pub const PROMPT_TEXT_CHARS: usize = 8000;
pub const BASIC_CONFIDENCE: f64 = 0.3;
pub const BASIC_SUMMARY_CHARS: usize = 500;

const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 200;
const MAX_REFERENCE_CHARS: usize = 100;
const MAX_SUMMARY_CHARS: usize = 1000;

pub const SOURCE_AI: &str = "ai";
pub const SOURCE_BASIC: &str = "basic";

pub const ANALYSIS_PROMPT: &str = r#"Tu es un expert en législation ivoirienne. Analyse ce document juridique et extrait les informations suivantes au format JSON strict :

{
  "title": "titre du document (max 200 caractères)",
  "type": "un de: constitution|loi|decret|arrete|code|ordonnance",
  "reference_number": "numéro de référence/identification du document",
  "summary": "résumé détaillé du document (max 800 caractères)",
  "publication_date": "date au format YYYY-MM-DD si trouvée, sinon null",
  "effective_date": "date d'entrée en vigueur au format YYYY-MM-DD si trouvée, sinon null",
  "category_suggestion": "suggestion de catégorie (ex: droit civil, droit pénal, etc.)",
  "confidence_score": "score de confiance entre 0 et 1"
}

IMPORTANT:
- Réponds UNIQUEMENT avec le JSON, rien d'autre
- Si tu n'es pas sûr d'une valeur, utilise null
- Le type doit être exactement un de: constitution, loi, decret, arrete, code, ordonnance
- Concentre-toi sur la législation ivoirienne"#;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentAnalysis {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub reference_number: Option<String>,
    pub summary: Option<String>,
    pub publication_date: Option<String>,
    pub effective_date: Option<String>,
    pub category_suggestion: Option<String>,
    pub confidence_score: f64,
    pub analysis_source: String,
    pub analysis_timestamp: DateTime<Utc>,
}

impl DocumentAnalysis {
    pub fn is_ai(&self) -> bool {
        self.analysis_source == SOURCE_AI
    }
}

/// Extracts the PDF text and analyzes it. Never fails: every error path
/// ends in [`basic_analysis`].
pub async fn analyze_pdf(
    model: &dyn ChatModel,
    llm: &LlmConfig,
    bytes: &[u8],
    file_name: &str,
) -> DocumentAnalysis {
    match extract_pdf_text(bytes) {
        Ok(raw) => analyze_text(model, llm, Some(&raw), file_name).await,
        Err(err) => {
            tracing::warn!(error = %err, file = file_name, "PDF text extraction failed");
            basic_analysis(file_name, None)
        }
    }
}

/// Analysis of already extracted text. `None` or blank text skips the model.
pub async fn analyze_text(
    model: &dyn ChatModel,
    llm: &LlmConfig,
    raw_text: Option<&str>,
    file_name: &str,
) -> DocumentAnalysis {
    let Some(raw) = raw_text.filter(|t| !clean_extracted_text(t).is_empty()) else {
        tracing::warn!(file = file_name, "no text extracted, using basic analysis");
        return basic_analysis(file_name, None);
    };

    let cleaned = clean_extracted_text(raw);
    match analyze_with_model(model, llm, &cleaned).await {
        Ok(parsed) => validate_ai_analysis(&parsed, file_name),
        Err(err) => {
            tracing::error!(error = %err, file = file_name, "document analysis failed, using basic analysis");
            basic_analysis(file_name, Some(raw))
        }
    }
}

async fn analyze_with_model(model: &dyn ChatModel, llm: &LlmConfig, text: &str) -> Result<Value> {
    let excerpt: String = text.chars().take(PROMPT_TEXT_CHARS).collect();
    let request = CompletionRequest {
        messages: vec![
            ChatTurn::system(ANALYSIS_PROMPT),
            ChatTurn::user(format!(
                "Analyse ce document juridique ivoirien :\n\n{}",
                excerpt
            )),
        ],
        temperature: llm.analysis_temperature,
        max_tokens: llm.max_tokens,
    };

    let Some(answer) = model.complete(&request).await? else {
        bail!("model returned no content");
    };
    parse_model_json(&answer)
}

/// Parses the model's JSON answer, tolerating reasoning blocks, code fences
/// and text around the object.
pub fn parse_model_json(answer: &str) -> Result<Value> {
    let stripped = strip_think_tags(answer);
    let trimmed = stripped.trim();
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    let candidate = match (start, end) {
        (Some(s), Some(e)) if s < e => &trimmed[s..=e],
        _ => trimmed,
    };
    let value: Value = serde_json::from_str(candidate)
        .with_context(|| format!("invalid analysis JSON: {}", limit(trimmed, 200)))?;
    if !value.is_object() {
        bail!("analysis answer is not a JSON object");
    }
    Ok(value)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

pub fn validate_ai_analysis(value: &Value, file_name: &str) -> DocumentAnalysis {
    DocumentAnalysis {
        title: validate_title(str_field(value, "title"), file_name),
        doc_type: validate_type(str_field(value, "type")),
        reference_number: str_field(value, "reference_number")
            .map(|r| limit(r, MAX_REFERENCE_CHARS)),
        summary: str_field(value, "summary").map(|s| limit(s, MAX_SUMMARY_CHARS)),
        publication_date: str_field(value, "publication_date").and_then(normalize_date),
        effective_date: str_field(value, "effective_date").and_then(normalize_date),
        category_suggestion: str_field(value, "category_suggestion").map(str::to_string),
        confidence_score: confidence(value.get("confidence_score")),
        analysis_source: SOURCE_AI.to_string(),
        analysis_timestamp: Utc::now(),
    }
}

fn validate_title(title: Option<&str>, file_name: &str) -> String {
    match title {
        Some(t) if t.chars().count() >= MIN_TITLE_CHARS => limit(t, MAX_TITLE_CHARS),
        _ => limit(&file_stem(file_name), MAX_TITLE_CHARS),
    }
}

fn validate_type(doc_type: Option<&str>) -> String {
    let lowered = doc_type.map(str::to_lowercase).unwrap_or_default();
    if ADMIN_DOCUMENT_TYPES.contains(&lowered.as_str()) {
        lowered
    } else {
        "loi".to_string()
    }
}

fn confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Calendar date as `YYYY-MM-DD`, accepting the usual French and ISO
/// notations. `None` when unparseable.
pub fn normalize_date(raw: &str) -> Option<String> {
    const FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];
    let raw = raw.trim();
    let date = FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })?;
    Some(date.format("%Y-%m-%d").to_string())
}

// ============ Basic analysis ============

fn reference_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)n°?\s*(\d{4}[-/]\d+)",
            r"(?i)loi\s+n°?\s*([\d/-]+)",
            r"(?i)décret\s+n°?\s*([\d/-]+)",
            r"(?i)arrêté\s+n°?\s*([\d/-]+)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Keyword fallback. `raw_text` keeps the extractor's line breaks so the
/// title can be taken from the first substantial line.
pub fn basic_analysis(file_name: &str, raw_text: Option<&str>) -> DocumentAnalysis {
    let cleaned = raw_text
        .map(clean_extracted_text)
        .filter(|t| !t.is_empty());

    DocumentAnalysis {
        title: guess_title(file_name, raw_text),
        doc_type: guess_type(file_name, cleaned.as_deref()).to_string(),
        reference_number: cleaned.as_deref().and_then(guess_reference),
        summary: cleaned.as_deref().map(|t| limit(t, BASIC_SUMMARY_CHARS)),
        publication_date: None,
        effective_date: None,
        category_suggestion: None,
        confidence_score: BASIC_CONFIDENCE,
        analysis_source: SOURCE_BASIC.to_string(),
        analysis_timestamp: Utc::now(),
    }
}

/// First line longer than 20 and shorter than 200 bytes, else the file stem.
pub fn guess_title(file_name: &str, raw_text: Option<&str>) -> String {
    raw_text
        .into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .find(|line| line.len() > 20 && line.len() < 200)
        .map(str::to_string)
        .unwrap_or_else(|| file_stem(file_name))
}

pub fn guess_type(file_name: &str, content: Option<&str>) -> &'static str {
    let name = file_name.to_lowercase();
    let content = content.unwrap_or_default().to_lowercase();

    if name.contains("constitution") || content.contains("constitution") {
        "constitution"
    } else if name.contains("code") || content.contains("code") {
        "code"
    } else if name.contains("decret") || content.contains("décret") {
        "decret"
    } else if name.contains("arrete") || content.contains("arrêté") {
        "arrete"
    } else if name.contains("ordonnance") || content.contains("ordonnance") {
        "ordonnance"
    } else {
        "loi"
    }
}

pub fn guess_reference(content: &str) -> Option<String> {
    reference_patterns().iter().find_map(|re| {
        re.captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

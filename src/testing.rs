//! Fixtures shared by the unit tests.

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::Config;
use crate::db;
use crate::documents::DocumentInput;
use crate::migrate::migrate_pool;
use crate::text::slugify;

/// Migrated database in a fresh temp dir. Keep the `TempDir` alive.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::for_data_dir(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate_pool(&pool).await.unwrap();
    (tmp, pool)
}

pub fn sample_document(title: &str, doc_type: &str, status: &str) -> DocumentInput {
    DocumentInput {
        title: title.to_string(),
        slug: slugify(title),
        summary: Some(format!("Résumé de {}", title)),
        content: format!("Texte intégral de {}", title),
        doc_type: doc_type.to_string(),
        publication_date: Some("2020-01-01".to_string()),
        status: status.to_string(),
        ..Default::default()
    }
}

/// One-page PDF showing `phrase` in Helvetica.
pub fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let escaped = phrase
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)");
    let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escaped);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

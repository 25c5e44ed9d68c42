//! On-disk storage for uploaded PDFs.
//!
//! Files live under `<storage.root>/legal-documents/` and are served by the
//! HTTP server at `/storage/legal-documents/<file>`.

use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

use crate::db::now_ts;

pub const PUBLIC_PREFIX: &str = "/storage/";
pub const PDF_DIR: &str = "legal-documents";

/// A file written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub url: String,
    pub file_name: String,
    pub size: i64,
}

/// Writes `bytes` as `<unix_ts>_<slug>.pdf` and returns its public URL.
pub async fn store_pdf(root: &Path, slug: &str, bytes: &[u8]) -> Result<StoredFile> {
    let dir = root.join(PDF_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let file_name = format!("{}_{}.pdf", now_ts(), slug);
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    Ok(StoredFile {
        url: format!("{}{}/{}", PUBLIC_PREFIX, PDF_DIR, file_name),
        file_name,
        size: bytes.len() as i64,
    })
}

/// Maps a public URL back to a path under `root`. Absolute URLs are
/// accepted when their path starts with `/storage/`.
pub fn resolve_url(root: &Path, url: &str) -> Result<PathBuf> {
    let path = match url.find(PUBLIC_PREFIX) {
        Some(pos) => &url[pos + PUBLIC_PREFIX.len()..],
        None => bail!("not a storage URL: {}", url),
    };

    let relative = Path::new(path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        bail!("storage path escapes the storage root: {}", url);
    }
    Ok(root.join(relative))
}

/// Removes the file behind `url`. Missing files are not an error.
pub async fn delete_url(root: &Path, url: &str) -> Result<()> {
    let path = resolve_url(root, url)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

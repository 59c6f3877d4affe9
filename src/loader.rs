use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::chunker::SourceKind;
use crate::index::DocumentStore;

/// Loads the two fixed source documents from local files. PDF text is
/// extracted with the `pdftotext` system binary; non-`.pdf` paths are read
/// as plain text so extracted fixtures can stand in for the real document.
pub struct FileStore {
    csv_path: PathBuf,
    pdf_path: PathBuf,
}

impl FileStore {
    pub fn new(csv_path: PathBuf, pdf_path: PathBuf) -> Self {
        Self { csv_path, pdf_path }
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load(&self, kind: SourceKind) -> Result<String> {
        match kind {
            SourceKind::Csv => tokio::fs::read_to_string(&self.csv_path)
                .await
                .with_context(|| format!("reading {}", self.csv_path.display())),
            SourceKind::Pdf => {
                let path = self.pdf_path.clone();
                tokio::task::spawn_blocking(move || extract_text(&path))
                    .await
                    .context("pdf extraction task panicked")?
            }
        }
    }
}

fn extract_text(path: &Path) -> Result<String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("pdf") {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg(path)
        .arg("-")
        .output()
        .context("running pdftotext")?;

    if !output.status.success() {
        anyhow::bail!(
            "pdftotext failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let text = String::from_utf8(output.stdout).context("pdftotext produced invalid utf-8")?;
    if text.trim().is_empty() {
        anyhow::bail!("no text extracted from {}", path.display());
    }
    Ok(text)
}

//! PDF export of cause-list fragments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::cli::config::PdfSettings;
use crate::model::Location;

/// Turns a complete HTML document into PDF bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>>;
}

/// Renderer used when no PDF backend is configured
pub struct NullRenderer;

#[async_trait]
impl PdfRenderer for NullRenderer {
    async fn render(&self, _html: &str) -> Result<Vec<u8>> {
        anyhow::bail!("no PDF renderer configured (set pdf.wkhtmltopdf_path)")
    }
}

/// Pipes the document through `wkhtmltopdf - -`
pub struct WkhtmltopdfRenderer {
    binary: String,
}

impl WkhtmltopdfRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl PdfRenderer for WkhtmltopdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .arg("--quiet")
            .arg("--encoding")
            .arg("utf-8")
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(format!("Failed to start {}", self.binary))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(html.as_bytes()).await.context("Failed to write HTML to wkhtmltopdf")?;
        }

        let output = child.wait_with_output().await.context("wkhtmltopdf did not finish")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("wkhtmltopdf exited with {}: {}", output.status, stderr.trim());
        }
        if output.stdout.is_empty() {
            anyhow::bail!("wkhtmltopdf produced no output");
        }

        Ok(output.stdout)
    }
}

pub fn renderer_from_settings(settings: &PdfSettings) -> Box<dyn PdfRenderer> {
    match settings.wkhtmltopdf_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => Box::new(WkhtmltopdfRenderer::new(path)),
        None => Box::new(NullRenderer),
    }
}

/// Minimal standalone document around a portal fragment
pub fn wrap_html_for_pdf(html: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>{}</body>\n</html>",
        html
    )
}

/// `causelist_<state>_<dist>_<complex>_<est-court>_<date>.pdf`
pub fn pdf_file_name(location: &Location, court_code: &str, date: &str) -> String {
    format!(
        "causelist_{}_{}_{}_{}_{}.pdf",
        location.state_code,
        location.dist_code,
        location.complex().complex_id,
        court_code.replace('^', "-"),
        date
    )
}

/// Render `html` into `dir/file_name`.
///
/// On render failure the wrapped document is kept next to where the PDF would have gone.
pub async fn export_pdf(renderer: &dyn PdfRenderer, html: &str, dir: &Path, file_name: &str) -> Result<PathBuf> {
    if html.trim().is_empty() {
        anyhow::bail!("nothing to render: cause list HTML is empty");
    }

    tokio::fs::create_dir_all(dir)
        .await
        .context(format!("Failed to create directory: {}", dir.display()))?;

    let pdf_path = dir.join(file_name);
    let wrapped = wrap_html_for_pdf(html);

    match renderer.render(&wrapped).await {
        Ok(bytes) => {
            tokio::fs::write(&pdf_path, bytes)
                .await
                .context(format!("Failed to write {}", pdf_path.display()))?;
            info!("PDF saved to: {}", pdf_path.display());
            Ok(pdf_path)
        }
        Err(e) => {
            let html_path = pdf_path.with_extension("html");
            if let Err(write_err) = tokio::fs::write(&html_path, &wrapped).await {
                warn!("Failed to keep HTML fallback {}: {}", html_path.display(), write_err);
            } else {
                warn!("PDF rendering failed, HTML kept at {}", html_path.display());
            }
            Err(e.context("PDF rendering failed"))
        }
    }
}

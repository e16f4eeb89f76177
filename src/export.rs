//! Document export through the external `pandoc` converter
//!
//! Markdown is rendered to standalone HTML with the bundled template and
//! inlined CSS; PDF and DOCX are then produced from that HTML. Every call
//! is bounded by the configured timeout and the child is killed on drop.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::output::{write_results_csv, OutputRequest};
use crate::session::SessionWorkspace;
use crate::texts;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no Markdown content to export")]
    EmptyDocument,

    #[error("required file missing: {0}")]
    MissingTemplate(PathBuf),

    #[error("converter exited with code {code:?}: {stderr}")]
    Converter { code: Option<i32>, stderr: String },

    #[error("converter did not finish within {0}s")]
    Timeout(u64),

    #[error("output file not created: {0}")]
    MissingOutput(PathBuf),

    #[error("unsupported export format: {0}")]
    UnknownFormat(String),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Pdf,
    Docx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Text of the first `# ` heading, or the default document title.
pub fn extract_title(markdown: &str) -> String {
    markdown
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| texts::HTML_DEFAULT_TITLE.to_string())
}

fn require_file(path: &Path) -> Result<(), ExportError> {
    if path.is_file() {
        Ok(())
    } else {
        error!(path = %path.display(), "Required export file missing");
        Err(ExportError::MissingTemplate(path.to_path_buf()))
    }
}

#[derive(Debug, Clone)]
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub async fn export(
        &self,
        format: ExportFormat,
        workspace: &SessionWorkspace,
        markdown: &str,
        results: &OutputRequest,
    ) -> Result<PathBuf, ExportError> {
        match format {
            ExportFormat::Html => self.export_html(workspace, markdown).await,
            ExportFormat::Pdf => self.export_pdf(workspace, markdown).await,
            ExportFormat::Docx => self.export_docx(workspace, markdown).await,
            ExportFormat::Csv => self.export_csv(workspace, results).await,
        }
    }

    pub async fn export_html(&self, workspace: &SessionWorkspace, markdown: &str) -> Result<PathBuf, ExportError> {
        if markdown.trim().is_empty() {
            return Err(ExportError::EmptyDocument);
        }
        require_file(&self.config.html_template)?;
        require_file(&self.config.css)?;

        workspace.ensure_download_dir().await?;
        let out = workspace.download_path(&self.config.download_prefix, "html");
        let css = tokio::fs::read_to_string(&self.config.css).await?;
        let title = extract_title(markdown);

        let args: Vec<OsString> = vec![
            "-f".into(),
            "markdown".into(),
            "-t".into(),
            "html5".into(),
            "-o".into(),
            out.clone().into(),
            "--template".into(),
            self.config.html_template.clone().into(),
            "--metadata".into(),
            format!("title={}", title).into(),
            "--metadata".into(),
            format!("css_inlined_standalone={}", css).into(),
            "--standalone".into(),
        ];
        clear_stale(&out).await?;
        self.run_converter(args, Some(markdown)).await?;
        self.finish(workspace, out).await
    }

    pub async fn export_pdf(&self, workspace: &SessionWorkspace, markdown: &str) -> Result<PathBuf, ExportError> {
        let html = self.export_html(workspace, markdown).await?;
        let out = html.with_extension("pdf");
        let args: Vec<OsString> = vec![
            html.into(),
            "-o".into(),
            out.clone().into(),
            format!("--pdf-engine={}", self.config.pdf_engine).into(),
            "--metadata".into(),
            format!("title={}", texts::HTML_DEFAULT_TITLE).into(),
        ];
        clear_stale(&out).await?;
        self.run_converter(args, None).await?;
        self.finish(workspace, out).await
    }

    pub async fn export_docx(&self, workspace: &SessionWorkspace, markdown: &str) -> Result<PathBuf, ExportError> {
        let html = self.export_html(workspace, markdown).await?;
        let out = html.with_extension("docx");
        let mut args: Vec<OsString> = vec![html.into(), "-o".into(), out.clone().into()];
        if self.config.docx_reference.is_file() {
            let mut reference = OsString::from("--reference-doc=");
            reference.push(&self.config.docx_reference);
            args.push(reference);
        } else {
            warn!(
                path = %self.config.docx_reference.display(),
                "DOCX reference document missing, using converter defaults"
            );
        }
        args.push("--metadata".into());
        args.push(format!("title={}", texts::HTML_DEFAULT_TITLE).into());

        clear_stale(&out).await?;
        self.run_converter(args, None).await?;
        self.finish(workspace, out).await
    }

    pub async fn export_csv(&self, workspace: &SessionWorkspace, results: &OutputRequest) -> Result<PathBuf, ExportError> {
        workspace.ensure_download_dir().await?;
        let out = workspace.download_path(&self.config.download_prefix, "csv");
        clear_stale(&out).await?;
        let path = out.clone();
        let results = results.clone();
        tokio::task::spawn_blocking(move || write_results_csv(&path, &results))
            .await
            .map_err(std::io::Error::other)??;
        self.finish(workspace, out).await
    }

    async fn finish(&self, workspace: &SessionWorkspace, out: PathBuf) -> Result<PathBuf, ExportError> {
        if !tokio::fs::try_exists(&out).await? {
            error!(path = %out.display(), "Export produced no file");
            return Err(ExportError::MissingOutput(out));
        }
        info!(session = %workspace.id.short(), path = %out.display(), "Export ready");
        Ok(out)
    }

    async fn run_converter(&self, args: Vec<OsString>, stdin: Option<&str>) -> Result<(), ExportError> {
        let mut cmd = Command::new(&self.config.pandoc_path);
        cmd.args(&args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(program = %self.config.pandoc_path.display(), ?args, "Running converter");

        let run = async {
            let mut child = cmd.spawn()?;
            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                // the converter may exit before reading everything
                match pipe.write_all(input.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            child.wait_with_output().await
        };

        let secs = self.config.timeout_secs;
        let output = tokio::time::timeout(Duration::from_secs(secs), run)
            .await
            .map_err(|_| {
                error!(timeout_secs = secs, "Converter timed out");
                ExportError::Timeout(secs)
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(code = ?output.status.code(), %stderr, "Converter failed");
            return Err(ExportError::Converter {
                code: output.status.code(),
                stderr,
            });
        }
        Ok(())
    }
}

/// Remove a file left by an earlier export so `finish` only sees fresh output.
async fn clear_stale(out: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(out).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

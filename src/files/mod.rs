//! Upload handling
//!
//! Files arrive through the multipart endpoint, are validated (size,
//! extension, CSV structure), stored under the session's upload directory
//! with a sanitized name, and then previewed by [`preview::build_preview`].

pub mod preview;

pub use preview::{build_preview, FilePreview, PreviewTable};

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::UploadConfig;
use crate::session::SessionWorkspace;

/// Bytes inspected when checking that a `.csv` file is well-formed.
const CSV_SNIFF_BYTES: usize = 1024;
const MAX_FILE_NAME_BYTES: usize = 255;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UploadError {
    #[error("file {name} exceeds size limit of {limit} bytes")]
    TooLarge { name: String, limit: u64 },

    #[error("file {0} is empty")]
    Empty(String),

    #[error("invalid file type: {0}")]
    Extension(String),

    #[error("invalid CSV structure in {name}: {reason}")]
    MalformedCsv { name: String, reason: String },

    #[error("file name {0:?} has no usable characters")]
    BadName(String),

    #[error("cannot read {name}: {reason}")]
    Unreadable { name: String, reason: String },
}

/// A file received from the browser, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Lowercased extension including the dot, e.g. `.csv`.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim_end_matches(['.', ' ']);
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.len() <= MAX_FILE_NAME_BYTES {
        return Some(cleaned.to_string());
    }

    let ext = file_extension(cleaned).unwrap_or_default();
    let mut stem_budget = MAX_FILE_NAME_BYTES.saturating_sub(ext.len());
    while !cleaned.is_char_boundary(stem_budget) {
        stem_budget -= 1;
    }
    Some(format!("{}{}", &cleaned[..stem_budget], ext))
}

fn check_csv_sample(name: &str, sample: &[u8]) -> Result<(), UploadError> {
    let malformed = |reason: String| UploadError::MalformedCsv {
        name: name.to_string(),
        reason,
    };

    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // a multi-byte character cut by the sample window is fine
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).map_err(|e| malformed(e.to_string()))?
        }
        Err(e) => return Err(malformed(format!("not UTF-8: {}", e))),
    };
    if text.trim().is_empty() {
        return Err(malformed("could not determine delimiter".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    for record in reader.records() {
        record.map_err(|e| malformed(e.to_string()))?;
    }
    Ok(())
}

/// Validate an in-memory upload against size, extension and CSV rules.
pub fn validate_bytes(name: &str, bytes: &[u8], limits: &UploadConfig) -> Result<(), UploadError> {
    validate_parts(name, bytes.len() as u64, limits, || {
        Ok(bytes[..bytes.len().min(CSV_SNIFF_BYTES)].to_vec())
    })
}

/// Same rules as [`validate_bytes`] for a file already on disk.
pub fn validate_path(path: &Path, limits: &UploadConfig) -> Result<(), UploadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let unreadable = |e: std::io::Error| UploadError::Unreadable {
        name: name.clone(),
        reason: e.to_string(),
    };
    let size = std::fs::metadata(path).map_err(unreadable)?.len();
    validate_parts(&name, size, limits, || {
        let mut sample = Vec::with_capacity(CSV_SNIFF_BYTES);
        std::fs::File::open(path)
            .and_then(|f| f.take(CSV_SNIFF_BYTES as u64).read_to_end(&mut sample))
            .map_err(unreadable)?;
        Ok(sample)
    })
}

fn validate_parts<F>(name: &str, size: u64, limits: &UploadConfig, sample: F) -> Result<(), UploadError>
where
    F: FnOnce() -> Result<Vec<u8>, UploadError>,
{
    if size > limits.max_file_size {
        return Err(UploadError::TooLarge {
            name: name.to_string(),
            limit: limits.max_file_size,
        });
    }
    if size == 0 {
        return Err(UploadError::Empty(name.to_string()));
    }
    let ext = file_extension(name).ok_or_else(|| UploadError::Extension(name.to_string()))?;
    if !limits.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)) {
        return Err(UploadError::Extension(name.to_string()));
    }
    if ext == ".csv" {
        check_csv_sample(name, &sample()?)?;
    }
    Ok(())
}

/// Validate and save uploads into the session's upload dir.
///
/// Invalid files are logged and skipped; the returned paths are the files
/// that were actually written, in upload order.
pub async fn store_files(
    workspace: &SessionWorkspace,
    files: Vec<IncomingFile>,
    limits: &UploadConfig,
) -> std::io::Result<Vec<PathBuf>> {
    let upload_dir = workspace.ensure_upload_dir().await?;
    let mut saved = Vec::with_capacity(files.len());

    for file in files {
        let checked = sanitize_filename(&file.name)
            .ok_or_else(|| UploadError::BadName(file.name.clone()))
            .and_then(|name| validate_bytes(&name, &file.bytes, limits).map(|_| name));
        let name = match checked {
            Ok(name) => name,
            Err(e) => {
                warn!(session = %workspace.id.short(), error = %e, "Invalid file detected");
                continue;
            }
        };

        let dest = upload_dir.join(&name);
        if let Err(e) = tokio::fs::write(&dest, &file.bytes).await {
            warn!(session = %workspace.id.short(), file = %name, error = %e, "Could not save upload");
            continue;
        }
        info!(session = %workspace.id.short(), file = %name, size = file.bytes.len(), "Saved upload");
        saved.push(dest);
    }

    Ok(saved)
}

/// Copy a server-side file (the bundled sample) into the session's upload dir.
pub async fn import_local_file(
    workspace: &SessionWorkspace,
    source: &Path,
    limits: &UploadConfig,
) -> std::io::Result<Vec<PathBuf>> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes = tokio::fs::read(source).await?;
    store_files(workspace, vec![IncomingFile { name, bytes }], limits).await
}

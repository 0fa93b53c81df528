//! Upload staging: persist uploaded bytes to the server-local upload directory.
//!
//! pdfium opens documents from a file-system path, so every upload is written
//! to disk before extraction. Each upload first lands in its own uniquely
//! named temp file inside the upload directory and is extracted from there.
//! Only afterwards is it renamed to its client-supplied name (reduced to its
//! final path component), so two concurrent uploads with the same name never
//! read each other's bytes. The later rename wins on disk.

use crate::error::PdfQaError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Name used when the client-supplied filename has no usable component.
const FALLBACK_FILENAME: &str = "upload.pdf";

/// Check the `%PDF` magic bytes.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Reduce a client-supplied filename to a safe final path component.
///
/// Directory parts (`../`, `C:\`, `/etc/`) are discarded so an upload can
/// never be written outside the staging directory.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != ':')
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => FALLBACK_FILENAME.to_string(),
        _ => cleaned,
    }
}

/// An upload written to a private temp file, waiting to be moved to its final name.
///
/// Dropping it without calling [`StagedUpload::persist`] removes the temp file.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedUpload {
    /// Path of the private copy; valid until the upload is persisted or dropped.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Where [`persist`](Self::persist) will put the file.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the private copy to `upload_dir/<sanitized filename>`, replacing
    /// any earlier upload of the same name.
    pub async fn persist(self) -> Result<PathBuf, PdfQaError> {
        let Self { file, target } = self;
        tokio::task::spawn_blocking(move || {
            file.persist(&target).map_err(|e| PdfQaError::UploadWriteFailed {
                path: target.clone(),
                source: e.error,
            })?;
            Ok::<_, PdfQaError>(target)
        })
        .await
        .map_err(|e| PdfQaError::Internal(format!("Staging task panicked: {}", e)))?
    }
}

/// Write `bytes` to a fresh temp file under `upload_dir`.
pub async fn stage_upload(
    upload_dir: &Path,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<StagedUpload, PdfQaError> {
    let dir = upload_dir.to_path_buf();
    let name = sanitize_filename(filename);
    let size = bytes.len();
    if !looks_like_pdf(&bytes) {
        warn!("Upload '{}' lacks %PDF magic bytes; extraction will likely fail", filename);
    }

    let staged = tokio::task::spawn_blocking(move || write_private_copy(&dir, &name, &bytes))
        .await
        .map_err(|e| PdfQaError::Internal(format!("Staging task panicked: {}", e)))??;

    info!("Staged upload: {} ({} bytes)", staged.path().display(), size);
    Ok(staged)
}

fn write_private_copy(dir: &Path, name: &str, bytes: &[u8]) -> Result<StagedUpload, PdfQaError> {
    let target = dir.join(name);
    let write_err = |source: std::io::Error| PdfQaError::UploadWriteFailed {
        path: target.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let suffix = format!("-{}", name);
    let mut file = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    Ok(StagedUpload { file, target })
}

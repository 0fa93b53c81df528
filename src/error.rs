//! Error types for the edgequake-pdfqa library.
//!
//! Four error types reflect four distinct failure modes:
//!
//! * [`PdfQaError`] — **Fatal**: the service cannot be configured or a
//!   request cannot be served at all (bad configuration, HTTP client could not
//!   be built, upload could not be staged).
//!
//! * [`ExtractError`] — **Document-level, non-fatal**: the PDF could not be
//!   opened or extraction timed out. Stored inside
//!   [`crate::extract::ExtractionReport`]; the transcript degrades to empty.
//!
//! * [`PageError`] — **Page-level, non-fatal**: a single page could not be
//!   rasterised or recognised. Stored inside [`crate::extract::PageReport`];
//!   the page contributes empty text and every other page is kept.
//!
//! * [`RelayError`] — the inference endpoint call failed. Surfaced to HTTP
//!   callers as a server error, distinct from the "no document" client error.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfqa library.
#[derive(Debug, Error)]
pub enum PdfQaError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reqwest client for the inference endpoint could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the uploaded file into the staging directory.
    #[error("Failed to stage upload '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a whole document produced no transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractError {
    /// No pdfium library could be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib-path) to the directory holding libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// The file is missing, not a PDF, or its structure is corrupt.
    #[error("PDF '{path}' could not be opened: {detail}")]
    OpenFailed { path: PathBuf, detail: String },

    /// The PDF is encrypted and no (or a wrong) password was configured.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// Extraction did not finish within the configured bound.
    #[error("Extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The blocking extraction task panicked or was cancelled.
    #[error("Internal extraction error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed, so OCR could not be attempted.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR engine could not run or returned an error.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The OCR engine did not answer in time.
    #[error("Page {page}: OCR timed out after {secs}s")]
    OcrTimeout { page: usize, secs: u64 },
}

/// Failure talking to the inference endpoint.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The endpoint answered with a non-success status.
    #[error("Inference endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not complete within the configured timeout.
    #[error("Inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection refused, DNS failure, reset, etc.
    #[error("Inference transport error: {0}")]
    Transport(String),

    /// The endpoint answered 2xx but the body was not JSON.
    #[error("Inference endpoint returned an invalid body: {0}")]
    InvalidBody(String),
}

impl RelayError {
    /// Transport failures and 5xx answers may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Status { status, .. } => *status >= 500,
            RelayError::Timeout { .. } | RelayError::Transport(_) => true,
            RelayError::InvalidBody(_) => false,
        }
    }
}

//! # edgequake-pdfqa
//!
//! Ask questions about an uploaded PDF, answered by a local LLM endpoint.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /upload (multipart "file")
//!  │
//!  ├─ 1. Stage    write the bytes under the upload directory
//!  ├─ 2. Load     pdfium text layer per page (spawn_blocking)
//!  ├─ 3. OCR      text-less pages only: tesseract or a vision model
//!  ├─ 4. Clean    line endings, stray glyphs, blank-line runs
//!  └─ 5. Store    transcript replaces the single in-memory slot
//!
//! POST /ask {"question": ...}
//!  │
//!  ├─ 1. Check    empty slot → 400, no model call
//!  ├─ 2. Prompt   bounded transcript prefix (optionally keyword-gated)
//!  └─ 3. Relay    {model, prompt, stream: false} → generate endpoint,
//!                 answer returned verbatim
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfqa::{router, AppState, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().model("llama3.2").build()?;
//!     let addr = config.bind_addr();
//!     let app = router(Arc::new(AppState::from_config(config)?));
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfqa` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! The pdfium shared library is not bundled. Point `PDFIUM_LIB_PATH` (or
//! `--pdfium-lib-path`) at it, or install it on the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod relay;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ContextPolicy, KeywordGate, OcrBackend, ServiceConfig, ServiceConfigBuilder, UnmatchedQuestion,
};
pub use error::{ExtractError, PageError, PdfQaError, RelayError};
pub use extract::{DocumentExtractor, ExtractionReport, PageReport, PdfExtractor, TextSource};
pub use pipeline::ocr::OcrEngine;
pub use prompts::{ContextDecision, Prompt, PromptBuilder};
pub use relay::InferenceClient;
pub use server::{router, AppState};
pub use store::DocumentStore;

//! Pipeline stages for turning an uploaded PDF into a transcript.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the OCR backend can change without touching PDF loading.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ postprocess
//! (stage)   (pdfium)   (blank pages only)   (cleanup)
//!                       └─ encode (PNG / base64)
//! ```
//!
//! 1. [`input`]  — write the uploaded bytes into the staging directory
//! 2. [`render`] — read every page's text layer and rasterise the blank ones;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`ocr`]    — recognise text on the rasterised pages
//! 4. [`encode`] — PNG file / base64 for the OCR backends
//! 5. [`postprocess`] — deterministic text cleanup
//!
//! Assembly of the final transcript lives in [`crate::extract`].

pub mod encode;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod render;

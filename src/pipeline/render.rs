//! PDF loading: embedded text for every page, rasters for text-less pages.
//!
//! ## Why a blocking producer?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! The document is opened once inside `spawn_blocking`; each page's text layer
//! is read, and only pages whose text is blank are rendered to an image.
//! Pages leave the blocking thread as owned data (`String`, `DynamicImage`)
//! through a bounded channel, so OCR runs on the async side while pdfium
//! keeps rendering, and at most `buffer` pages wait in memory at once. When
//! the receiver is dropped (for example on an extraction timeout) the
//! producer stops at the next page.

use crate::error::{ExtractError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Library name pdfium-render expects on this platform, e.g. `libpdfium.so`.
pub fn platform_library_name(dir: &Path) -> PathBuf {
    Pdfium::pdfium_platform_library_name_at_path(dir)
}

/// Bind to a pdfium shared library.
///
/// Search order: `lib_dir`, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system library path.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let env_dir = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let mut attempts = Vec::new();

    for dir in lib_dir.map(Path::to_path_buf).into_iter().chain(env_dir) {
        // PDFIUM_LIB_PATH may name the library file itself rather than its directory.
        let candidate = if dir.is_file() {
            dir
        } else {
            platform_library_name(&dir)
        };
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    Pdfium::bind_to_library(platform_library_name(Path::new("./")))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| {
            attempts.push(format!("system library: {:?}", e));
            ExtractError::PdfiumBindingFailed(attempts.join("; "))
        })
}

/// Rendering settings for the blocking pass.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub pdfium_lib_path: Option<PathBuf>,
    pub password: Option<String>,
    /// Longest edge of a rendered page in pixels.
    pub max_rendered_pixels: u32,
    /// Render text-less pages for OCR. Off when OCR is disabled.
    pub render_blank_pages: bool,
}

/// One page as read from the PDF.
#[derive(Debug)]
pub struct LoadedPage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Embedded text layer, line endings as pdfium reports them.
    pub text: String,
    /// Raster for OCR; only present for text-less pages when rendering is on.
    pub raster: Option<Result<DynamicImage, PageError>>,
}

impl LoadedPage {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Start reading the PDF on a blocking thread.
///
/// Pages arrive on the returned receiver in document order. The handle
/// resolves to the page count, or to the error that stopped the document
/// from opening (in which case no page is sent).
pub fn spawn_page_loader(
    pdf_path: &Path,
    options: &LoadOptions,
    buffer: usize,
) -> (mpsc::Receiver<LoadedPage>, JoinHandle<Result<usize, ExtractError>>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let path = pdf_path.to_path_buf();
    let options = options.clone();

    let handle = tokio::task::spawn_blocking(move || load_pages_blocking(&path, &options, &tx));
    (rx, handle)
}

/// Blocking implementation of page loading.
fn load_pages_blocking(
    pdf_path: &Path,
    options: &LoadOptions,
    tx: &mpsc::Sender<LoadedPage>,
) -> Result<usize, ExtractError> {
    let pdfium = bind_pdfium(options.pdfium_lib_path.as_deref())?;
    let password = options.password.as_deref();

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ExtractError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            ExtractError::OpenFailed {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(options.max_rendered_pixels as i32)
        .set_maximum_height(options.max_rendered_pixels as i32);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        // A page whose text layer cannot be read is treated like a blank one.
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                debug!("Page {}: no readable text layer ({:?})", page_num, e);
                String::new()
            }
        };

        let raster = if text.trim().is_empty() && options.render_blank_pages {
            let rendered = page
                .render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image())
                .map_err(|e| PageError::RenderFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                });
            if let Ok(ref image) = rendered {
                debug!(
                    "Page {}: no text layer, rendered {}x{} px for OCR",
                    page_num,
                    image.width(),
                    image.height()
                );
            }
            Some(rendered)
        } else {
            None
        };

        let loaded = LoadedPage {
            page_num,
            text,
            raster,
        };
        if tx.blocking_send(loaded).is_err() {
            debug!("Page consumer gone; stopping after page {}", page_num);
            break;
        }
    }

    Ok(total_pages)
}

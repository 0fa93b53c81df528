//! Text extraction entry points: PDF path → transcript.
//!
//! Extraction never fails from the caller's point of view. A document that
//! cannot be opened yields an [`ExtractionReport`] with an empty transcript
//! and `failure` set; a page that cannot be recognised yields an empty page
//! with its [`PageError`] recorded. Callers that only need the text read
//! `report.transcript`; callers that need to tell "blank scan" apart from
//! "parser crashed" read `failure` and the per-page reports.

use crate::config::ServiceConfig;
use crate::error::{ExtractError, PageError, PdfQaError};
use crate::pipeline::ocr::{self, OcrEngine};
use crate::pipeline::postprocess;
use crate::pipeline::render::{self, LoadOptions, LoadedPage};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextSource {
    /// The page's embedded text layer.
    Embedded,
    /// OCR of the rasterised page.
    Ocr,
    /// Nothing: no text layer and OCR disabled, failed, or found nothing.
    Empty,
}

/// Outcome for a single page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    pub source: TextSource,
    /// Characters contributed to the transcript.
    pub chars: usize,
    pub error: Option<PageError>,
}

/// Result of extracting one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    /// Page texts in document order, each followed by `\n`.
    pub transcript: String,
    pub pages: Vec<PageReport>,
    /// Set when the document as a whole could not be processed.
    pub failure: Option<ExtractError>,
    pub duration_ms: u64,
}

impl ExtractionReport {
    fn failed(failure: ExtractError, started: Instant) -> Self {
        Self {
            failure: Some(failure),
            duration_ms: started.elapsed().as_millis() as u64,
            ..Self::default()
        }
    }

    /// True when nothing usable was extracted.
    pub fn is_empty(&self) -> bool {
        self.transcript.trim().is_empty()
    }

    pub fn ocr_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.source == TextSource::Ocr)
            .count()
    }

    pub fn page_errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }

    /// A human-readable reason the transcript is unusable, if it is.
    pub fn warning(&self) -> Option<String> {
        if let Some(ref failure) = self.failure {
            return Some(failure.to_string());
        }
        if self.is_empty() {
            let errors = self.page_errors().count();
            return Some(if errors > 0 {
                format!("No text could be extracted from the PDF ({errors} pages failed OCR)")
            } else {
                "No text could be extracted from the PDF".to_string()
            });
        }
        None
    }
}

/// Turns a staged document into a transcript.
///
/// The web layer holds an `Arc<dyn DocumentExtractor>` so tests can swap in
/// an extractor that needs neither pdfium nor an OCR engine.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> ExtractionReport;
}

/// Production extractor: pdfium text layer with OCR fallback.
pub struct PdfExtractor {
    options: LoadOptions,
    ocr: Arc<dyn OcrEngine>,
    ocr_concurrency: usize,
    timeout_secs: u64,
}

impl PdfExtractor {
    pub fn new(config: &ServiceConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            options: LoadOptions {
                pdfium_lib_path: config.pdfium_lib_path.clone(),
                password: config.password.clone(),
                max_rendered_pixels: config.max_rendered_pixels,
                render_blank_pages: ocr.is_enabled(),
            },
            ocr,
            ocr_concurrency: config.ocr_concurrency.max(1),
            timeout_secs: config.extract_timeout_secs,
        }
    }

    /// Build the extractor with the OCR backend selected in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PdfQaError> {
        Ok(Self::new(config, ocr::engine_from_config(config)?))
    }

    async fn run(&self, path: &Path) -> Result<(String, Vec<PageReport>), ExtractError> {
        // At most `ocr_concurrency` rendered pages wait ahead of OCR.
        let (rx, loader) = render::spawn_page_loader(path, &self.options, self.ocr_concurrency);
        let pages = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|page| (page, rx)) });

        let assembled = assemble_transcript(pages, Arc::clone(&self.ocr), self.ocr_concurrency).await;
        loader
            .await
            .map_err(|e| ExtractError::Internal(format!("Load task panicked: {}", e)))??;
        Ok(assembled)
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> ExtractionReport {
        let started = Instant::now();
        info!("Extracting text from {}", path.display());

        match within_timeout(self.timeout_secs, self.run(path)).await {
            Ok((transcript, pages)) => {
                let report = ExtractionReport {
                    transcript,
                    pages,
                    failure: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                info!(
                    "Extraction complete: {} pages ({} via {}), {} chars, {}ms",
                    report.pages.len(),
                    report.ocr_pages(),
                    self.ocr.name(),
                    report.transcript.len(),
                    report.duration_ms
                );
                report
            }
            Err(e) => {
                warn!("Error reading PDF {}: {}", path.display(), e);
                ExtractionReport::failed(e, started)
            }
        }
    }
}

/// Run `work`, giving up with [`ExtractError::Timeout`] after `secs`.
async fn within_timeout<T>(
    secs: u64,
    work: impl Future<Output = Result<T, ExtractError>>,
) -> Result<T, ExtractError> {
    tokio::time::timeout(Duration::from_secs(secs), work)
        .await
        .unwrap_or(Err(ExtractError::Timeout { secs }))
}

/// Combine loaded pages into a transcript, running OCR on text-less pages.
///
/// Up to `ocr_concurrency` pages are recognised at once, and no more pages
/// are pulled from `pages` than that; output order always follows page
/// order. Each page's text is followed by a newline.
pub async fn assemble_transcript<S>(
    pages: S,
    ocr: Arc<dyn OcrEngine>,
    ocr_concurrency: usize,
) -> (String, Vec<PageReport>)
where
    S: Stream<Item = LoadedPage>,
{
    let resolved: Vec<(String, PageReport)> = pages
        .map(|page| {
            let ocr = Arc::clone(&ocr);
            async move { resolve_page(page, ocr.as_ref()).await }
        })
        .buffered(ocr_concurrency.max(1))
        .collect()
        .await;

    let mut transcript = String::new();
    let mut reports = Vec::with_capacity(resolved.len());
    for (text, report) in resolved {
        transcript.push_str(&text);
        transcript.push('\n');
        reports.push(report);
    }
    (transcript, reports)
}

async fn resolve_page(page: LoadedPage, ocr: &dyn OcrEngine) -> (String, PageReport) {
    let page_num = page.page_num;
    let report = |source, text: &str, error| PageReport {
        page_num,
        source,
        chars: text.chars().count(),
        error,
    };

    if page.has_text() {
        let text = postprocess::clean_embedded_text(&page.text);
        let r = report(TextSource::Embedded, &text, None);
        return (text, r);
    }

    match page.raster {
        None => (String::new(), report(TextSource::Empty, "", None)),
        Some(Err(e)) => {
            warn!("{}", e);
            (String::new(), report(TextSource::Empty, "", Some(e)))
        }
        Some(Ok(image)) => match ocr.recognize(page_num, image).await {
            Ok(raw) => {
                let text = postprocess::clean_ocr_text(&raw);
                let source = if text.is_empty() {
                    TextSource::Empty
                } else {
                    TextSource::Ocr
                };
                let r = report(source, &text, None);
                (text, r)
            }
            Err(e) => {
                warn!("{}", e);
                (String::new(), report(TextSource::Empty, "", Some(e)))
            }
        },
    }
}

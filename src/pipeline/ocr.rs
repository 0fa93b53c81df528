//! OCR fallback for pages without an embedded text layer.
//!
//! [`OcrEngine`] is the seam: the extractor only ever holds an
//! `Arc<dyn OcrEngine>`, so tests inject a canned engine and deployments pick
//! a backend with [`crate::config::OcrBackend`].
//!
//! | Backend | Engine | Needs |
//! |---------|--------|-------|
//! | Tesseract | [`TesseractOcr`] | `tesseract` on `PATH` (or `tesseract_bin`) |
//! | Vision | [`VisionOcr`] | a vision model (e.g. llava) behind the generate endpoint |
//! | Disabled | [`DisabledOcr`] | nothing; text-less pages stay empty |
//!
//! Engines report failure as [`PageError`]; the extractor records it on the
//! page and moves on, so one unreadable scan never costs the whole document.

use crate::config::{OcrBackend, ServiceConfig};
use crate::error::{PageError, PdfQaError};
use crate::pipeline::encode;
use crate::prompts::OCR_TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Recognises the text on one rasterised page.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether blank pages should be rendered for this engine at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Recognise `image`, the raster of 1-indexed page `page_num`.
    /// An empty string means the engine ran and found no text.
    async fn recognize(&self, page_num: usize, image: DynamicImage) -> Result<String, PageError>;
}

/// Build the engine selected in `config`.
pub fn engine_from_config(config: &ServiceConfig) -> Result<Arc<dyn OcrEngine>, PdfQaError> {
    Ok(match config.ocr_backend {
        OcrBackend::Tesseract => Arc::new(TesseractOcr::new(
            config.tesseract_bin.clone(),
            config.ocr_language.clone(),
            config.ocr_timeout_secs,
        )),
        OcrBackend::Vision => Arc::new(VisionOcr::new(
            config.generate_url.clone(),
            config.vision_model.clone(),
            config.ocr_timeout_secs,
        )?),
        OcrBackend::Disabled => Arc::new(DisabledOcr),
    })
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Runs the `tesseract` command-line tool on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    language: String,
    timeout_secs: u64,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, page_num: usize, image: DynamicImage) -> Result<String, PageError> {
        let png = tokio::task::spawn_blocking(move || encode::write_png_tempfile(&image))
            .await
            .map_err(|e| PageError::OcrFailed {
                page: page_num,
                detail: format!("encode task panicked: {e}"),
            })?
            .map_err(|e| PageError::OcrFailed {
                page: page_num,
                detail: format!("could not write page image: {e}"),
            })?;

        // `tesseract <image> stdout -l <lang>` prints the recognised text.
        let run = Command::new(&self.binary)
            .arg(png.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| PageError::OcrTimeout {
                page: page_num,
                secs: self.timeout_secs,
            })?
            .map_err(|e| PageError::OcrFailed {
                page: page_num,
                detail: format!("failed to run '{}': {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PageError::OcrFailed {
                page: page_num,
                detail: format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Page {}: tesseract recognised {} bytes", page_num, text.len());
        Ok(text)
    }
}

// ── Vision model ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

/// Sends the page image to a vision model behind an Ollama-style generate endpoint.
#[derive(Debug, Clone)]
pub struct VisionOcr {
    client: reqwest::Client,
    generate_url: String,
    model: String,
    timeout_secs: u64,
}

impl VisionOcr {
    pub fn new(
        generate_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PdfQaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PdfQaError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            generate_url: generate_url.into(),
            model: model.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn recognize(&self, page_num: usize, image: DynamicImage) -> Result<String, PageError> {
        let failed = |detail: String| PageError::OcrFailed {
            page: page_num,
            detail,
        };

        let b64 = tokio::task::spawn_blocking(move || encode::encode_page_base64(&image))
            .await
            .map_err(|e| failed(format!("encode task panicked: {e}")))?
            .map_err(|e| failed(format!("image encoding failed: {e}")))?;

        let body = VisionRequest {
            model: &self.model,
            prompt: OCR_TRANSCRIPTION_PROMPT,
            images: vec![b64],
            stream: false,
        };

        let response = self
            .client
            .post(&self.generate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PageError::OcrTimeout {
                        page: page_num,
                        secs: self.timeout_secs,
                    }
                } else {
                    failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("vision model returned HTTP {status}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid response body: {e}")))?;

        match json.get("response").and_then(|v| v.as_str()) {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!("Page {}: vision response has no 'response' field", page_num);
                Err(failed("response field missing".into()))
            }
        }
    }
}

// ── Disabled ─────────────────────────────────────────────────────────────

/// Never recognises anything; blank pages are not even rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn recognize(&self, _page_num: usize, _image: DynamicImage) -> Result<String, PageError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn engine_selection_follows_config() {
        let cfg = ServiceConfig::builder().build().unwrap();
        assert_eq!(engine_from_config(&cfg).unwrap().name(), "tesseract");

        let cfg = ServiceConfig::builder()
            .ocr_backend(OcrBackend::Vision)
            .build()
            .unwrap();
        assert_eq!(engine_from_config(&cfg).unwrap().name(), "vision");

        let cfg = ServiceConfig::builder()
            .ocr_backend(OcrBackend::Disabled)
            .build()
            .unwrap();
        let engine = engine_from_config(&cfg).unwrap();
        assert!(!engine.is_enabled());
    }

    #[tokio::test]
    async fn missing_tesseract_binary_is_a_page_error() {
        let ocr = TesseractOcr::new("pdfqa-no-such-tesseract-binary", "eng", 5);
        let err = ocr.recognize(4, blank_page()).await.unwrap_err();
        match err {
            PageError::OcrFailed { page, detail } => {
                assert_eq!(page, 4);
                assert!(detail.contains("pdfqa-no-such-tesseract-binary"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tesseract_is_killed_after_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-tesseract");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let ocr = TesseractOcr::new(script.to_string_lossy(), "eng", 1);
        let started = std::time::Instant::now();
        let mut result = ocr.recognize(3, blank_page()).await;
        // A freshly written script can be briefly busy while another test forks.
        for _ in 0..3 {
            match result {
                Err(PageError::OcrFailed { ref detail, .. }) if detail.contains("busy") => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    result = ocr.recognize(3, blank_page()).await;
                }
                _ => break,
            }
        }

        assert_eq!(result, Err(PageError::OcrTimeout { page: 3, secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn vision_ocr_returns_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llava",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llava",
                "response": "Hello World",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ocr = VisionOcr::new(format!("{}/api/generate", server.uri()), "llava", 5).unwrap();
        let text = ocr.recognize(1, blank_page()).await.unwrap();
        assert_eq!(text, "Hello World");
    }

    #[tokio::test]
    async fn vision_ocr_error_status_is_a_page_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ocr = VisionOcr::new(format!("{}/api/generate", server.uri()), "llava", 5).unwrap();
        let err = ocr.recognize(2, blank_page()).await.unwrap_err();
        assert!(matches!(err, PageError::OcrFailed { page: 2, .. }));
    }

    #[tokio::test]
    async fn disabled_ocr_yields_nothing() {
        assert_eq!(DisabledOcr.recognize(1, blank_page()).await.unwrap(), "");
    }
}

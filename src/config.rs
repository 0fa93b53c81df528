//! Configuration types for the PDF question-answering service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. One struct holds every knob (bindings,
//! extraction, OCR, prompt policy, inference endpoint) so the CLI, the tests
//! and library callers all configure the service the same way.

use crate::error::PdfQaError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Ollama-style generate endpoint.
pub const DEFAULT_GENERATE_URL: &str = "http://localhost:11434/api/generate";

/// Default model identifier sent with every generate request.
pub const DEFAULT_MODEL: &str = "mario";

/// Upper bound for [`ServiceConfig::inference_max_retries`].
pub const MAX_INFERENCE_RETRIES: u32 = 10;

/// Upper bound for a single retry delay in milliseconds.
pub const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

/// Keywords used by [`ContextPolicy::KeywordGated`] when none are configured.
///
/// Personal and professional identifiers: the gate was written for CVs and
/// profiles, where these words signal a question about the document.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "name",
    "who",
    "work",
    "worked",
    "working",
    "job",
    "company",
    "employer",
    "role",
    "position",
    "experience",
    "skill",
    "skills",
    "education",
    "degree",
    "university",
    "college",
    "project",
    "projects",
    "certification",
    "email",
    "phone",
    "contact",
    "address",
    "resume",
    "cv",
    "summary",
];

/// Configuration for the question-answering service.
///
/// # Example
/// ```rust
/// use edgequake_pdfqa::{ContextPolicy, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .model("llama3.2")
///     .context_char_budget(2000)
///     .context_policy(ContextPolicy::keyword_gated_default())
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Interface the HTTP server binds to. Default: `0.0.0.0`.
    pub host: String,

    /// Port the HTTP server binds to. Default: 5000.
    pub port: u16,

    /// Debug mode: DEBUG-level logs unless `RUST_LOG` says otherwise. Default: false.
    pub debug: bool,

    /// Directory uploaded PDFs are staged into. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Maximum accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Text-generation endpoint. Default: [`DEFAULT_GENERATE_URL`].
    pub generate_url: String,

    /// Model identifier for answers. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Timeout for a single inference call in seconds. Default: 120.
    pub inference_timeout_secs: u64,

    /// Retries on transport failures and 5xx answers. Default: 0, at most
    /// [`MAX_INFERENCE_RETRIES`].
    ///
    /// A local model that is still loading answers 5xx for a few seconds;
    /// one or two retries smooth that over without hiding real outages.
    pub inference_max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt and
    /// capped at [`MAX_RETRY_BACKOFF_MS`]. Default: 500.
    pub retry_backoff_ms: u64,

    /// How much of the transcript goes into the prompt, and when.
    pub context_policy: ContextPolicy,

    /// Hard ceiling on transcript characters forwarded per prompt. Default: 4000.
    ///
    /// The latency and cost of the model call are dominated by prompt size,
    /// so the transcript is never forwarded unbounded.
    pub context_char_budget: usize,

    /// OCR backend for pages without a text layer. Default: Tesseract.
    pub ocr_backend: OcrBackend,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_bin: String,

    /// Vision model used by [`OcrBackend::Vision`]. Default: `llava`.
    pub vision_model: String,

    /// Timeout for one page of OCR in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Pages recognised concurrently. Default: 2.
    pub ocr_concurrency: usize,

    /// Longest edge of a rasterised page in pixels. Default: 2000.
    ///
    /// Tesseract is most accurate around 300 DPI; 2000 px on an A4 page is
    /// roughly 170 DPI on the long edge and keeps memory bounded on posters.
    pub max_rendered_pixels: u32,

    /// Timeout for a whole document extraction in seconds. Default: 300.
    pub extract_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory holding the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
            generate_url: DEFAULT_GENERATE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            inference_timeout_secs: 120,
            inference_max_retries: 0,
            retry_backoff_ms: 500,
            context_policy: ContextPolicy::default(),
            context_char_budget: 4000,
            ocr_backend: OcrBackend::default(),
            ocr_language: "eng".to_string(),
            tesseract_bin: "tesseract".to_string(),
            vision_model: "llava".to_string(),
            ocr_timeout_secs: 60,
            ocr_concurrency: 2,
            max_rendered_pixels: 2000,
            extract_timeout_secs: 300,
            password: None,
            pdfium_lib_path: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n.max(1024);
        self
    }

    pub fn generate_url(mut self, url: impl Into<String>) -> Self {
        self.config.generate_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn inference_timeout_secs(mut self, secs: u64) -> Self {
        self.config.inference_timeout_secs = secs.max(1);
        self
    }

    pub fn inference_max_retries(mut self, n: u32) -> Self {
        self.config.inference_max_retries = n.min(MAX_INFERENCE_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms.min(MAX_RETRY_BACKOFF_MS);
        self
    }

    pub fn context_policy(mut self, policy: ContextPolicy) -> Self {
        self.config.context_policy = policy;
        self
    }

    pub fn context_char_budget(mut self, chars: usize) -> Self {
        self.config.context_char_budget = chars;
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.tesseract_bin = bin.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PdfQaError> {
        let c = &self.config;
        if c.context_char_budget == 0 {
            return Err(PdfQaError::InvalidConfig(
                "Context character budget must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(PdfQaError::InvalidConfig("Model must not be empty".into()));
        }
        if !(c.generate_url.starts_with("http://") || c.generate_url.starts_with("https://")) {
            return Err(PdfQaError::InvalidConfig(format!(
                "Generate URL must be http(s), got '{}'",
                c.generate_url
            )));
        }
        if let ContextPolicy::KeywordGated(gate) = &c.context_policy {
            if gate.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(PdfQaError::InvalidConfig(
                    "Keyword-gated context needs at least one keyword".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which engine recovers text from pages without an embedded text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    /// Local `tesseract` executable. (default)
    #[default]
    Tesseract,
    /// Vision model behind the generate endpoint (e.g. llava).
    Vision,
    /// Never OCR; text-less pages stay empty.
    Disabled,
}

/// When, and how much of, the transcript is included in a prompt.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `Bounded` | always include the first `context_char_budget` characters (default) |
/// | `KeywordGated` | include the bounded prefix only when the question mentions a keyword |
///
/// The gate is a heuristic, not a guarantee: a relevant question phrased
/// without any listed keyword loses its document context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextPolicy {
    /// Always forward the bounded transcript prefix. (default)
    #[default]
    Bounded,
    /// Forward the prefix only for questions matching a keyword.
    KeywordGated(KeywordGate),
}

impl ContextPolicy {
    /// Keyword gate over [`DEFAULT_KEYWORDS`], noting unrelated questions.
    pub fn keyword_gated_default() -> Self {
        ContextPolicy::KeywordGated(KeywordGate::default())
    }
}

/// Keyword list and miss behaviour for [`ContextPolicy::KeywordGated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGate {
    /// Whole-word, case-insensitive terms. Multi-word phrases are allowed.
    pub keywords: Vec<String>,
    /// What to send when the question matches none of them.
    pub on_miss: UnmatchedQuestion,
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            on_miss: UnmatchedQuestion::default(),
        }
    }
}

impl KeywordGate {
    /// Parse a comma-separated keyword list, trimming and dropping blanks.
    pub fn from_list(list: &str, on_miss: UnmatchedQuestion) -> Self {
        let keywords = list
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords, on_miss }
    }
}

/// Prompt shape for a question that fails the keyword gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnmatchedQuestion {
    /// Drop the transcript; ask the model to answer only from the document.
    OmitContext,
    /// Replace the transcript with a note that the question seems unrelated. (default)
    #[default]
    NoteUnrelated,
}

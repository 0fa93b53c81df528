//! CLI binary for edgequake-pdfqa.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and either serves the HTTP API or extracts one PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfqa::{
    router, AppState, ContextPolicy, DocumentExtractor, KeywordGate, OcrBackend, PdfExtractor,
    ServiceConfig, TextSource, UnmatchedQuestion,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:5000 against a local Ollama
  pdfqa

  # Another model, keyword-gated context
  pdfqa --model llama3.2 --context-policy keywords

  # Check what a PDF extracts to, without starting the server
  pdfqa --extract-only resume.pdf

  # Use a vision model instead of tesseract for scanned pages
  pdfqa --ocr vision --vision-model llava

API:
  POST /upload   multipart form, field "file"
  POST /ask      {"question": "..."}
  GET  /health

ENVIRONMENT VARIABLES:
  Every flag can also be set through the PDFQA_* variable shown in --help.
  A .env file in the working directory is loaded first.
  RUST_LOG           Overrides the log filter (e.g. "edgequake_pdfqa=debug")
  PDFIUM_LIB_PATH    Directory (or file) of the pdfium shared library
"#;

/// Serve question answering over an uploaded PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqa",
    version,
    about = "Ask questions about an uploaded PDF using a local LLM endpoint",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PDFQA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(long, env = "PDFQA_PORT", default_value_t = 5000)]
    port: u16,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFQA_DEBUG", visible_alias = "verbose")]
    debug: bool,

    /// Directory uploaded PDFs are written to.
    #[arg(long, env = "PDFQA_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Maximum request body in bytes.
    #[arg(long, env = "PDFQA_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Text-generation endpoint (Ollama /api/generate shape).
    #[arg(long, env = "PDFQA_GENERATE_URL", default_value = edgequake_pdfqa::config::DEFAULT_GENERATE_URL)]
    generate_url: String,

    /// Model used to answer questions.
    #[arg(long, env = "PDFQA_MODEL", default_value = edgequake_pdfqa::config::DEFAULT_MODEL)]
    model: String,

    /// When the transcript goes into the prompt.
    #[arg(long, env = "PDFQA_CONTEXT_POLICY", value_enum, default_value = "bounded")]
    context_policy: PolicyArg,

    /// Maximum transcript characters per prompt.
    #[arg(long, env = "PDFQA_CONTEXT_CHARS", default_value_t = 4000)]
    context_chars: usize,

    /// Comma-separated keywords for --context-policy keywords (default: built-in list).
    #[arg(long, env = "PDFQA_KEYWORDS")]
    keywords: Option<String>,

    /// Prompt shape for questions matching no keyword.
    #[arg(long, env = "PDFQA_ON_MISS", value_enum, default_value = "note")]
    on_miss: OnMissArg,

    /// OCR backend for pages without a text layer.
    #[arg(long, env = "PDFQA_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "PDFQA_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Tesseract executable.
    #[arg(long, env = "PDFQA_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: String,

    /// Vision model for --ocr vision.
    #[arg(long, env = "PDFQA_VISION_MODEL", default_value = "llava")]
    vision_model: String,

    /// Pages recognised concurrently.
    #[arg(long, env = "PDFQA_OCR_CONCURRENCY", default_value_t = 2)]
    ocr_concurrency: usize,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "PDFQA_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Whole-document extraction timeout in seconds.
    #[arg(long, env = "PDFQA_EXTRACT_TIMEOUT", default_value_t = 300)]
    extract_timeout: u64,

    /// Inference call timeout in seconds.
    #[arg(long, env = "PDFQA_INFERENCE_TIMEOUT", default_value_t = 120)]
    inference_timeout: u64,

    /// Retries on inference transport failures and 5xx answers.
    #[arg(long, env = "PDFQA_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Directory holding the pdfium shared library.
    #[arg(long, env = "PDFQA_PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFQA_PASSWORD")]
    password: Option<String>,

    /// Extract this PDF, print its transcript and page summary, and exit.
    #[arg(long, value_name = "PDF")]
    extract_only: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Bounded,
    Keywords,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OnMissArg {
    Omit,
    Note,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Tesseract,
    Vision,
    Disabled,
}

impl From<OnMissArg> for UnmatchedQuestion {
    fn from(v: OnMissArg) -> Self {
        match v {
            OnMissArg::Omit => UnmatchedQuestion::OmitContext,
            OnMissArg::Note => UnmatchedQuestion::NoteUnrelated,
        }
    }
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Tesseract => OcrBackend::Tesseract,
            OcrArg::Vision => OcrBackend::Vision,
            OcrArg::Disabled => OcrBackend::Disabled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    // ── Logging setup ────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .with_writer(io::stderr)
        .init();

    // ── Extract-only mode ────────────────────────────────────────────────
    if let Some(ref pdf) = cli.extract_only {
        return extract_only(pdf, &config).await;
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let state = AppState::from_config(config).context("Failed to initialise service")?;
    info!(
        "Answering with model '{}' via {}",
        state.relay.model(),
        state.relay.generate_url()
    );
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let context_policy = match cli.context_policy {
        PolicyArg::Bounded => ContextPolicy::Bounded,
        PolicyArg::Keywords => {
            let gate = match cli.keywords.as_deref() {
                Some(list) => KeywordGate::from_list(list, cli.on_miss.into()),
                None => KeywordGate {
                    on_miss: cli.on_miss.into(),
                    ..KeywordGate::default()
                },
            };
            ContextPolicy::KeywordGated(gate)
        }
    };

    let mut builder = ServiceConfig::builder()
        .host(cli.host.clone())
        .port(cli.port)
        .debug(cli.debug)
        .upload_dir(cli.upload_dir.clone())
        .max_upload_bytes(cli.max_upload_bytes)
        .generate_url(cli.generate_url.clone())
        .model(cli.model.clone())
        .inference_timeout_secs(cli.inference_timeout)
        .inference_max_retries(cli.max_retries)
        .context_policy(context_policy)
        .context_char_budget(cli.context_chars)
        .ocr_backend(cli.ocr.into())
        .ocr_language(cli.ocr_language.clone())
        .tesseract_bin(cli.tesseract_bin.clone())
        .vision_model(cli.vision_model.clone())
        .ocr_timeout_secs(cli.ocr_timeout)
        .ocr_concurrency(cli.ocr_concurrency)
        .extract_timeout_secs(cli.extract_timeout);

    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }

    builder.build().context("Invalid configuration")
}

async fn extract_only(pdf: &Path, config: &ServiceConfig) -> Result<()> {
    let extractor = PdfExtractor::from_config(config).context("Failed to initialise extractor")?;
    let report = extractor.extract(pdf).await;

    print!("{}", report.transcript);

    eprintln!("File:       {}", pdf.display());
    for page in &report.pages {
        let source = match page.source {
            TextSource::Embedded => "text",
            TextSource::Ocr => "ocr",
            TextSource::Empty => "empty",
        };
        match page.error {
            Some(ref e) => eprintln!("  page {:>3}  {:<5}  {}", page.page_num, source, e),
            None => eprintln!("  page {:>3}  {:<5}  {} chars", page.page_num, source, page.chars),
        }
    }
    eprintln!(
        "Pages:      {} ({} via OCR), {} chars, {}ms",
        report.pages.len(),
        report.ocr_pages(),
        report.transcript.chars().count(),
        report.duration_ms
    );
    if let Some(warning) = report.warning() {
        eprintln!("Warning:    {}", warning);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

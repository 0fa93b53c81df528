use crate::config::ServiceConfig;
use crate::error::PdfQaError;
use crate::extract::{DocumentExtractor, PdfExtractor};
use crate::prompts::PromptBuilder;
use crate::relay::InferenceClient;
use crate::store::DocumentStore;
use std::sync::Arc;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: ServiceConfig,
    pub store: DocumentStore,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub prompts: PromptBuilder,
    pub relay: InferenceClient,
}

impl AppState {
    /// Production state: pdfium extractor with the configured OCR backend.
    pub fn from_config(config: ServiceConfig) -> Result<Self, PdfQaError> {
        let extractor = Arc::new(PdfExtractor::from_config(&config)?);
        Self::with_extractor(config, extractor)
    }

    /// State with a caller-supplied extractor.
    pub fn with_extractor(
        config: ServiceConfig,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Result<Self, PdfQaError> {
        let prompts = PromptBuilder::from_config(&config)?;
        let relay = InferenceClient::new(&config)?;
        Ok(Self {
            config,
            store: DocumentStore::new(),
            extractor,
            prompts,
            relay,
        })
    }
}

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::server::models::{ApiError, AskRequest};
use crate::server::state::AppState;

/// Answer a question about the stored transcript.
///
/// On success the inference endpoint's JSON body is returned unchanged.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // One snapshot for both the check and the prompt.
    let transcript = state.store.get();
    if transcript.trim().is_empty() {
        return Err(ApiError::NoDocument);
    }

    let prompt = state.prompts.build(&transcript, &request.question);
    info!(
        "Question ({} chars), context: {:?}",
        request.question.chars().count(),
        prompt.context
    );

    match state.relay.generate(&prompt.text).await {
        Ok(body) => Ok(Json(body)),
        Err(e) => {
            warn!("Inference call to {} failed: {}", state.relay.generate_url(), e);
            Err(ApiError::Relay(e))
        }
    }
}

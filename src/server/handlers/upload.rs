use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PdfQaError;
use crate::pipeline::input::stage_upload;
use crate::server::models::{ApiError, UploadResponse, UPLOAD_OK_MESSAGE};
use crate::server::state::AppState;
use crate::server::upload::parse_multipart;

/// Stage the uploaded PDF, extract it, move it to its final name, and
/// replace the stored transcript.
///
/// Extraction problems do not fail the request: the store is replaced with
/// whatever was recovered (possibly nothing) and the response carries a
/// `warning`.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|e| {
        warn!("Upload without a multipart body: {}", e);
        ApiError::NoFileUploaded
    })?;
    let file = parse_multipart(multipart).await?;

    let staged = stage_upload(&state.config.upload_dir, &file.filename, file.data)
        .await
        .map_err(staging_failed)?;

    let report = state.extractor.extract(staged.path()).await;
    let warning = report.warning();
    if let Some(ref w) = warning {
        warn!("Upload '{}' produced no usable text: {}", file.filename, w);
    }
    staged.persist().await.map_err(staging_failed)?;

    state.store.set(report.transcript.clone());
    info!(
        "Stored transcript of '{}': {} pages, {} chars",
        file.filename,
        report.pages.len(),
        report.transcript.len()
    );

    Ok(Json(UploadResponse {
        message: UPLOAD_OK_MESSAGE,
        filename: file.filename,
        pages: report.pages.len(),
        ocr_pages: report.ocr_pages(),
        characters: report.transcript.chars().count(),
        warning,
    }))
}

fn staging_failed(e: PdfQaError) -> ApiError {
    warn!("{}", e);
    ApiError::Staging(e)
}

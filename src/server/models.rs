use crate::error::{PdfQaError, RelayError};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const UPLOAD_OK_MESSAGE: &str = "PDF uploaded and processed successfully";

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// A missing question is treated as an empty one.
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
    pub pages: usize,
    pub ocr_pages: usize,
    pub characters: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Request failures, each with a fixed status and JSON `error` message.
#[derive(Debug)]
pub enum ApiError {
    /// The multipart body has no `file` part (or is not multipart at all).
    NoFileUploaded,
    /// The `file` part carries an empty filename.
    NoSelectedFile,
    /// The multipart body could not be read.
    Multipart(MultipartError),
    /// The request body was not valid JSON for the route.
    BadRequest(String),
    /// A question arrived while the store holds no text.
    NoDocument,
    /// The upload could not be written to the staging directory.
    Staging(PdfQaError),
    /// The inference endpoint call failed.
    Relay(RelayError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFileUploaded
            | ApiError::NoSelectedFile
            | ApiError::BadRequest(_)
            | ApiError::NoDocument => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Staging(_) | ApiError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::NoFileUploaded => json!({ "error": "No file uploaded" }),
            ApiError::NoSelectedFile => json!({ "error": "No selected file" }),
            ApiError::Multipart(e) => json!({ "error": e.body_text() }),
            ApiError::BadRequest(msg) => json!({ "error": msg }),
            ApiError::NoDocument => {
                json!({ "error": "No PDF content available. Please upload a PDF first." })
            }
            ApiError::Staging(e) => json!({
                "error": "Failed to store uploaded file",
                "detail": e.to_string(),
            }),
            ApiError::Relay(e) => json!({
                "error": "Failed to get response from model",
                "detail": e.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

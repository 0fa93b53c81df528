use crate::server::models::ApiError;
use axum::extract::Multipart;

/// The `file` part of an upload form.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Pull the `file` part out of a multipart form. Other parts are ignored.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::Multipart)? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" && file.is_none() {
            let filename = field.file_name().unwrap_or("").trim().to_string();
            if filename.is_empty() {
                return Err(ApiError::NoSelectedFile);
            }
            let data = field.bytes().await.map_err(ApiError::Multipart)?.to_vec();
            file = Some(UploadedFile { filename, data });
        } else {
            // Drain unknown fields
            let _ = field.bytes().await;
        }
    }

    file.ok_or(ApiError::NoFileUploaded)
}

//! Image encoding for OCR: `DynamicImage` → PNG.
//!
//! PNG is used for both OCR backends because it is lossless: JPEG artefacts
//! around glyph edges measurably hurt Tesseract and vision-model accuracy.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tempfile::NamedTempFile;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rasterised page as a base64 PNG for a vision model request.
pub fn encode_page_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let b64 = STANDARD.encode(encode_png(img)?);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

/// Write a rasterised page to a `.png` temp file for an external OCR tool.
///
/// The file is deleted when the returned handle is dropped.
pub fn write_png_tempfile(img: &DynamicImage) -> std::io::Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("pdfqa-page-")
        .suffix(".png")
        .tempfile()?;
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .map_err(std::io::Error::other)?;
    Ok(file)
}

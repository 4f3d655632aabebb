use bytes::Bytes;

use common::error::AppError;

use super::pdf_extraction::extract_pdf_text;

/// Converts an uploaded blob into plain text based on its declared MIME type.
///
/// Dispatch happens here and nowhere else, so supporting a new format never
/// touches the pipeline. Empty output is an extraction failure, never an
/// empty success.
pub async fn extract_text(mime_type: &str, bytes: Bytes) -> Result<String, AppError> {
    let text = match mime_type {
        "text/plain" | "text/markdown" => String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::Extraction("file content is not valid UTF-8".into()))?,
        "application/pdf" => extract_pdf_text(bytes).await?,
        other => {
            return Err(AppError::Extraction(format!(
                "unsupported MIME type: {other}"
            )))
        }
    };

    if text.trim().is_empty() {
        return Err(AppError::Extraction(
            "document produced no extractable text".into(),
        ));
    }

    Ok(text)
}

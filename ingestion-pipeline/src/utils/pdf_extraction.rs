use bytes::Bytes;
use lopdf::Document;
use tracing::debug;

use common::error::AppError;

const MIN_PROSE_LEN: usize = 150;
const MIN_ASCII_RATIO: f64 = 0.7;
const MIN_LETTER_RATIO: f64 = 0.3;

/// Extracts the text layer of a PDF, or fails with [`AppError::Extraction`].
///
/// `pdf-extract` does the heavy lifting on a blocking thread. When it cannot
/// produce text, `lopdf` parses the document structure so a corrupted file is
/// reported differently from one that simply carries no text layer.
pub async fn extract_pdf_text(pdf_bytes: Bytes) -> Result<String, AppError> {
    let bytes_for_extraction = pdf_bytes.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes_for_extraction).map(|s| s.trim().to_string())
    })
    .await?;

    let text = match extraction {
        Ok(text) => text,
        Err(err) => {
            classify_unreadable(&pdf_bytes).await?;
            return Err(AppError::Extraction(format!(
                "Failed to extract text from PDF: {err}"
            )));
        }
    };

    if text.is_empty() {
        let page_count = classify_unreadable(&pdf_bytes).await?;
        if page_count == 0 {
            return Err(AppError::Extraction("PDF appears to have no pages".into()));
        }
        return Err(AppError::Extraction(
            "PDF carries no extractable text layer".into(),
        ));
    }

    if !looks_like_prose(&text) {
        return Err(AppError::Extraction(
            "PDF text layer is too noisy to index".into(),
        ));
    }

    debug!(chars = text.chars().count(), "PDF text layer extracted");

    Ok(reflow_text(&text))
}

/// Parses the PDF structure off the async executor. A parse failure means
/// the file itself is corrupted; success returns the page count.
async fn classify_unreadable(pdf_bytes: &Bytes) -> Result<usize, AppError> {
    let bytes = pdf_bytes.clone();
    tokio::task::spawn_blocking(move || -> Result<usize, AppError> {
        let document = Document::load_mem(&bytes)
            .map_err(|err| AppError::Extraction(format!("Failed to parse PDF: {err}")))?;
        Ok(document.get_pages().len())
    })
    .await?
}

/// Heuristic that determines whether extracted text looks like well-formed
/// prose rather than mojibake from a broken encoding map.
fn looks_like_prose(text: &str) -> bool {
    if text.len() < MIN_PROSE_LEN {
        return true;
    }

    let total_chars = text.chars().count() as f64;
    if total_chars == 0.0 {
        return false;
    }

    let ascii_chars = text.chars().filter(|c| c.is_ascii()).count() as f64;
    if ascii_chars / total_chars < MIN_ASCII_RATIO {
        return false;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count() as f64;
    letters / total_chars > MIN_LETTER_RATIO
}

/// Joins hard-wrapped paragraph lines while keeping list items on their own
/// lines, so chunk boundaries land on real sentence structure.
pub fn reflow_text(input: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<String> = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join(" "));
                buffer.clear();
            }
            continue;
        }

        if is_list_line(trimmed) {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join(" "));
                buffer.clear();
            }
            paragraphs.push(trimmed.to_string());
            continue;
        }

        buffer.push(trimmed.to_string());
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer.join(" "));
    }

    paragraphs.join("\n\n")
}

fn is_list_line(line: &str) -> bool {
    line.starts_with('-')
        || line.starts_with('*')
        || line.starts_with('•')
        || (line
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
            && line.contains('.'))
}

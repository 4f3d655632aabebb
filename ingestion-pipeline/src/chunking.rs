use common::error::AppError;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1000;
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// How far back from the hard size limit the splitter looks for a natural
/// break. Kept below `max - overlap` so every cut makes forward progress.
const BREAK_SEARCH_WINDOW: usize = 100;

/// A chunk of source text together with its char offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits `text` into overlapping spans of at most `max_chunk_chars`
/// characters.
///
/// Each span after the first starts exactly `overlap_chars` characters before
/// the previous span's end, so dropping that prefix from every successor and
/// concatenating reproduces the input. Cut points prefer a sentence or
/// whitespace boundary within a bounded window below the hard limit; a hard
/// character cut is the fallback. Whitespace-only input produces no spans.
pub fn chunk_text(
    text: &str,
    max_chunk_chars: usize,
    overlap_chars: usize,
) -> Result<Vec<TextSpan>, AppError> {
    if max_chunk_chars == 0 {
        return Err(AppError::Validation(
            "max_chunk_chars must be greater than zero".into(),
        ));
    }
    if overlap_chars >= max_chunk_chars {
        return Err(AppError::Validation(format!(
            "overlap_chars ({overlap_chars}) must be smaller than max_chunk_chars ({max_chunk_chars})"
        )));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let window = BREAK_SEARCH_WINDOW.min(max_chunk_chars - overlap_chars - 1);

    let mut spans = Vec::new();
    let mut start = 0usize;

    loop {
        if total - start <= max_chunk_chars {
            spans.push(span_of(&chars, start, total));
            break;
        }

        let hard_end = start + max_chunk_chars;
        let end = find_break(&chars, hard_end, window).unwrap_or(hard_end);
        spans.push(span_of(&chars, start, end));
        start = end - overlap_chars;
    }

    Ok(spans)
}

fn span_of(chars: &[char], start: usize, end: usize) -> TextSpan {
    TextSpan {
        text: chars[start..end].iter().collect(),
        start,
        end,
    }
}

/// Looks for a cut position in `(hard_end - window, hard_end)`, preferring a
/// sentence boundary over plain whitespace. The cut position is the index of
/// the first character of the next window.
fn find_break(chars: &[char], hard_end: usize, window: usize) -> Option<usize> {
    let floor = hard_end - window;

    for cut in (floor..hard_end).rev() {
        if is_sentence_boundary(chars, cut) {
            return Some(cut);
        }
    }

    for cut in (floor..hard_end).rev() {
        if chars[cut - 1].is_whitespace() {
            return Some(cut);
        }
    }

    None
}

fn is_sentence_boundary(chars: &[char], cut: usize) -> bool {
    if chars[cut - 1] == '\n' {
        return true;
    }
    matches!(chars[cut - 1], '.' | '!' | '?') && chars[cut].is_whitespace()
}

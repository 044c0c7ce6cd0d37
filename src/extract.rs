//! Text extraction for uploaded documents (PDF and plain text).
//!
//! Extraction is pipeline-layer: callers supply bytes plus a declared
//! format; this module returns plain UTF-8 text or a typed error. The
//! size ceiling is checked here, before any parsing work.

use crate::error::EngineError;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Infer the format from a file name's extension.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "pdf" => Ok(DocumentFormat::Pdf),
            Some(ext) if ext == "txt" || ext == "text" || ext == "md" => {
                Ok(DocumentFormat::PlainText)
            }
            Some(ext) => Err(EngineError::UnsupportedFormat(ext)),
            None => Err(EngineError::UnsupportedFormat(String::new())),
        }
    }
}

/// Extract UTF-8 text from raw document bytes.
///
/// Fails with `SizeLimitExceeded` before parsing if the payload is over
/// `max_bytes`, with `UnreadableDocument` if parsing yields no characters,
/// and with `EncodingError` if a text file cannot be decoded.
pub fn extract_text(
    bytes: &[u8],
    format: DocumentFormat,
    max_bytes: usize,
) -> Result<String, EngineError> {
    if bytes.len() > max_bytes {
        return Err(EngineError::SizeLimitExceeded {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let text = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::PlainText => decode_plain_text(bytes)?,
    };

    if text.trim().is_empty() {
        return Err(EngineError::UnreadableDocument);
    }
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, EngineError> {
    // pdf-extract concatenates page text itself; an image-only PDF comes
    // back as an empty (or whitespace) string and is rejected above.
    pdf_extract::extract_text_from_mem(bytes).map_err(|_| EngineError::UnreadableDocument)
}

/// Decode a text file: strict UTF-8 first, then UTF-16 via BOM, then a
/// Windows-1252/Latin-1 fallback guarded by a binary-content heuristic.
fn decode_plain_text(bytes: &[u8]) -> Result<String, EngineError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    if let Some(text) = decode_utf16(bytes) {
        return Ok(text);
    }

    if looks_binary(bytes) {
        return Err(EngineError::EncodingError);
    }
    Ok(decode_latin1(bytes))
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (le, payload) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => return None,
    };
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if le {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

fn decode_latin1(bytes: &[u8]) -> String {
    // Latin-1 maps each byte to the same Unicode code point.
    bytes.iter().map(|&b| b as char).collect()
}

/// Heuristic: non-text payloads have NUL bytes or a high share of control
/// characters. Latin-1 would "decode" them silently, so reject first.
fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return true;
    }
    let control = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    control * 10 > bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            DocumentFormat::from_name("notes.PDF").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_name("lecture_3.txt").unwrap(),
            DocumentFormat::PlainText
        );
        assert!(matches!(
            DocumentFormat::from_name("slides.pptx"),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn size_ceiling_enforced_before_parsing() {
        let bytes = vec![b'a'; 100];
        let err = extract_text(&bytes, DocumentFormat::PlainText, 50).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SizeLimitExceeded { size: 100, limit: 50 }
        ));
    }

    #[test]
    fn utf8_text_passes_through() {
        let text = extract_text("héllo wörld".as_bytes(), DocumentFormat::PlainText, 1024).unwrap();
        assert_eq!(text, "héllo wörld");
    }

    #[test]
    fn latin1_fallback_decodes_legacy_bytes() {
        // "café" in Latin-1: 0xE9 is invalid as standalone UTF-8.
        let bytes = [b'c', b'a', b'f', 0xE9];
        let text = extract_text(&bytes, DocumentFormat::PlainText, 1024).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn utf16le_with_bom_decodes() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = extract_text(&bytes, DocumentFormat::PlainText, 1024).unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn binary_payload_is_an_encoding_error() {
        let bytes = [0x00, 0x01, 0x02, 0xFF, 0xFE, 0x00];
        let err = extract_text(&bytes, DocumentFormat::PlainText, 1024).unwrap_err();
        assert!(matches!(err, EngineError::EncodingError));
    }

    #[test]
    fn whitespace_only_document_is_unreadable() {
        let err = extract_text(b"  \n\t ", DocumentFormat::PlainText, 1024).unwrap_err();
        assert!(matches!(err, EngineError::UnreadableDocument));
    }

    #[test]
    fn invalid_pdf_is_unreadable() {
        let err = extract_text(b"not a pdf", DocumentFormat::Pdf, 1024).unwrap_err();
        assert!(matches!(err, EngineError::UnreadableDocument));
    }
}

//! PDF text extraction.

use crate::error::FailureKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF contains no extractable text")]
    NoText,

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("extractor crashed: {0}")]
    Crashed(String),
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ExtractError
    }
}

/// Turns document bytes into raw text. Runs on the blocking pool, so
/// implementations may be CPU-heavy.
pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Pure-Rust extraction from memory via `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl Extractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        if text.chars().all(char::is_whitespace) {
            return Err(ExtractError::NoText);
        }
        Ok(text)
    }
}

/// Treats the bytes as UTF-8 text; used for `.txt` inputs to `plan`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        if text.chars().all(char::is_whitespace) {
            return Err(ExtractError::NoText);
        }
        Ok(text)
    }
}

//! Text extraction collaborator.
//!
//! The pipeline only needs `extract(path) -> text`. PDF decoding is left to
//! external tools; [`PlainTextExtractor`] reads their UTF-8 output and
//! normalizes typographic characters that confuse matching and quoting.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Text extraction failed for {path}: {reason}")]
    Failed { path: String, reason: String },
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Typographic characters and their plain replacements.
const CHAR_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2026}', "..."),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{00A0}', " "),
];

/// Replace typographic characters, then trim.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match CHAR_REPLACEMENTS.iter().find(|(c, _)| *c == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    out.trim().to_string()
}

/// Reads UTF-8 text files.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor {
    max_chars: Option<usize>,
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_chars` characters of the normalized text.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let path_name = path.display().to_string();
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractionError::NotFound(path_name.clone()),
            _ => ExtractionError::Failed {
                path: path_name.clone(),
                reason: e.to_string(),
            },
        })?;

        let text = String::from_utf8(raw).map_err(|e| ExtractionError::Failed {
            path: path_name.clone(),
            reason: format!("not valid UTF-8: {e}"),
        })?;

        let mut text = normalize_text(&text);
        if let Some(max) = self.max_chars {
            text = text.chars().take(max).collect();
        }

        if text.is_empty() {
            return Err(ExtractionError::Failed {
                path: path_name,
                reason: "no text found".to_string(),
            });
        }

        tracing::debug!(path = %path_name, chars = text.chars().count(), "Extracted manuscript text");
        Ok(text)
    }
}

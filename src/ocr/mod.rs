pub mod cli;
#[cfg(feature = "libtesseract")]
pub mod library;
pub mod scripted;

use std::path::Path;

use anyhow::{anyhow, Result};
use log::warn;

use crate::{error::FormError, geometry::Token};

/// Letters plus the marks that occur inside Filipino names.
pub const NAME_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz.'-";
pub const LETTER_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const UPPER_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const UPPER_MARKS_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ'-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    Text,
    Tsv,
}

/// Page segmentation modes the pipeline relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Psm {
    Block = 6,
    SingleLine = 7,
    SingleWord = 8,
    SparseText = 11,
    RawLine = 13,
}

impl Psm {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    pub mode: OutputMode,
    pub psm: Psm,
    pub whitelist: Option<&'static str>,
    /// Word lists help printed text and hurt handwriting crops.
    pub dictionary: bool,
}

impl OcrRequest {
    pub fn text(psm: Psm) -> OcrRequest {
        OcrRequest {
            mode: OutputMode::Text,
            psm,
            whitelist: None,
            dictionary: true,
        }
    }

    pub fn tsv(psm: Psm) -> OcrRequest {
        OcrRequest {
            mode: OutputMode::Tsv,
            ..OcrRequest::text(psm)
        }
    }

    pub fn whitelist(self, whitelist: &'static str) -> OcrRequest {
        OcrRequest {
            whitelist: Some(whitelist),
            ..self
        }
    }

    pub fn without_dictionary(self) -> OcrRequest {
        OcrRequest {
            dictionary: false,
            ..self
        }
    }
}

/// Text recognition capability: `ocr(image, mode, psm, whitelist)`.
pub trait OcrEngine: Send + Sync {
    fn ocr(&self, image: &Path, request: &OcrRequest) -> Result<String, FormError>;
}

/// Runs `request`, turning any failure into empty output.
pub fn ocr_or_empty(engine: &dyn OcrEngine, image: &Path, request: &OcrRequest) -> String {
    engine.ocr(image, request).unwrap_or_else(|e| {
        warn!("OCR pass {:?} on {:?} failed: {}", request.psm, image, e);
        String::new()
    })
}

/// Word-level rows of a Tesseract TSV table. Malformed rows are skipped, so
/// garbage input yields an empty list.
pub fn parse_tokens(tsv: &str) -> Vec<Token> {
    tsv.lines()
        .filter(|l| l.starts_with('5'))
        .filter_map(|l| maybe_token(l).ok())
        .filter(|t| !t.text.is_empty() && t.text != "∎")
        .collect()
}

fn maybe_token(s: &str) -> Result<Token> {
    let fields: Vec<&str> = s.split_terminator('\t').collect();
    if fields.len() < 12 {
        return Err(anyhow!("unable to parse tsv result from Tesseract: {:?}", s));
    }

    let left = fields[6].trim().parse::<i32>()?;
    let top = fields[7].trim().parse::<i32>()?;
    let width = fields[8].trim().parse::<i32>()?;
    let height = fields[9].trim().parse::<i32>()?;
    let text = fields[11].trim();

    Ok(Token::new(text, left, top, width, height))
}

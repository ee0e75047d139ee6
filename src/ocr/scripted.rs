//! Deterministic stand-in for a real OCR engine.

use std::{collections::HashMap, path::Path, sync::Mutex};

use super::{OcrEngine, OcrRequest, OutputMode, Psm};
use crate::error::FormError;

/// Answers every pass from a table keyed by output mode and PSM; passes
/// without an entry read as empty. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    answers: HashMap<(OutputMode, Psm), String>,
    failing: bool,
    calls: Mutex<Vec<OcrRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> ScriptedEngine {
        ScriptedEngine::default()
    }

    /// An engine whose every invocation fails like a missing binary.
    pub fn failing() -> ScriptedEngine {
        ScriptedEngine {
            failing: true,
            ..ScriptedEngine::default()
        }
    }

    pub fn answer(mut self, mode: OutputMode, psm: Psm, output: impl Into<String>) -> Self {
        self.answers.insert((mode, psm), output.into());
        self
    }

    pub fn calls(&self) -> Vec<OcrRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl OcrEngine for ScriptedEngine {
    fn ocr(&self, _image: &Path, request: &OcrRequest) -> Result<String, FormError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if self.failing {
            return Err(FormError::subprocess("scripted", "engine unavailable"));
        }
        Ok(self
            .answers
            .get(&(request.mode, request.psm))
            .cloned()
            .unwrap_or_default())
    }
}

/// Renders `(text, left, top, width, height)` words as a Tesseract TSV table.
pub fn tsv_table(words: &[(&str, i32, i32, i32, i32)]) -> String {
    let mut table =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n"
            .to_owned();
    for (i, (text, left, top, width, height)) in words.iter().enumerate() {
        table.push_str(&format!(
            "5\t1\t1\t1\t1\t{}\t{}\t{}\t{}\t{}\t90\t{}\n",
            i + 1,
            left,
            top,
            width,
            height,
            text
        ));
    }
    table
}

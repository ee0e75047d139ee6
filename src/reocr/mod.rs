//! Focused re-reading of small regions of the page.

pub mod preprocess;

pub use preprocess::{ImagePreprocessor, ScriptPreprocessor};

use std::{path::Path, thread};

use anyhow::Result;
use image::{DynamicImage, GrayImage, ImageFormat};
use log::{debug, warn};
use tempfile::{Builder, NamedTempFile};

use crate::{
    candidate::{Corroboration, Field},
    config::FormscanConfig,
    gate,
    geometry::Roi,
    imaging::{self, Enhancement},
    ocr::{ocr_or_empty, OcrEngine, OcrRequest, Psm, NAME_WHITELIST, UPPER_WHITELIST},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHint {
    Surname,
    GivenName,
}

impl FieldHint {
    pub fn for_field(field: Field) -> FieldHint {
        match field {
            Field::Last => FieldHint::Surname,
            Field::First | Field::Middle => FieldHint::GivenName,
        }
    }

    pub fn whitelist(self) -> &'static str {
        match self {
            FieldHint::Surname => UPPER_WHITELIST,
            FieldHint::GivenName => NAME_WHITELIST,
        }
    }
}

/// Both readings of a region: single-word and single-line segmentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passes {
    pub word: String,
    pub line: String,
}

impl Passes {
    pub fn is_empty(&self) -> bool {
        self.word.trim().is_empty() && self.line.trim().is_empty()
    }

    /// The agreed text when both passes read the same, otherwise the longer
    /// pass with ties going to the one closest to `prior`.
    pub fn reading(&self, prior: &str) -> (String, Corroboration) {
        match gate::consensus(&self.word, &self.line) {
            Some(agreed) => (agreed, Corroboration::Consensus),
            None => (
                gate::pick_pass(prior, &[&self.word, &self.line]),
                Corroboration::None,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReOcrSettings {
    pub upscale: f32,
    pub surname_upscale: f32,
    pub contrast: f32,
    pub max_parallel_passes: usize,
}

impl ReOcrSettings {
    pub fn from_config(config: &FormscanConfig) -> ReOcrSettings {
        ReOcrSettings {
            upscale: config.enhance.upscale,
            surname_upscale: config.enhance.surname_upscale,
            contrast: config.enhance.contrast,
            max_parallel_passes: config.ocr.max_parallel_passes,
        }
    }
}

impl Default for ReOcrSettings {
    fn default() -> Self {
        ReOcrSettings::from_config(&FormscanConfig::default())
    }
}

#[derive(Clone)]
pub struct ReOcr<'a> {
    engine: &'a dyn OcrEngine,
    preprocessor: Option<&'a dyn ImagePreprocessor>,
    settings: ReOcrSettings,
}

impl<'a> ReOcr<'a> {
    pub fn new(
        engine: &'a dyn OcrEngine,
        preprocessor: Option<&'a dyn ImagePreprocessor>,
        settings: ReOcrSettings,
    ) -> ReOcr<'a> {
        ReOcr {
            engine,
            preprocessor,
            settings,
        }
    }

    pub fn settings(&self) -> &ReOcrSettings {
        &self.settings
    }

    /// Crops `roi`, enhances it and reads it at PSM 8 and PSM 7 with the
    /// whitelist for `hint`. Any failure reads as empty.
    pub fn region(&self, page: &DynamicImage, roi: &Roi, hint: FieldHint) -> Passes {
        let crop = match imaging::crop(page, roi) {
            Some(crop) => crop,
            None => {
                debug!("region {:?} lies outside the page, nothing to read", roi);
                return Passes::default();
            }
        };
        let enhanced = imaging::enhance(
            &crop,
            &Enhancement::crop(self.settings.upscale, self.settings.contrast),
        );
        let requests = [Psm::SingleWord, Psm::SingleLine].map(|psm| {
            OcrRequest::text(psm)
                .whitelist(hint.whitelist())
                .without_dictionary()
        });
        let mut outputs = self.read(&enhanced, Some(false), &requests).into_iter();
        let passes = Passes {
            word: outputs.next().unwrap_or_default().trim().to_owned(),
            line: outputs.next().unwrap_or_default().trim().to_owned(),
        };
        debug!("re-read {:?} as {:?} ({:?})", roi, passes, hint);
        passes
    }

    /// Reads `image` once per request, in request order.
    ///
    /// The image goes through the companion script first when `deskew` is
    /// set and a script is available; a failing script leaves it unprocessed.
    pub fn read(&self, image: &GrayImage, deskew: Option<bool>, requests: &[OcrRequest]) -> Vec<String> {
        match self.prepare(image, deskew) {
            Ok(prepared) => run_bounded(
                self.engine,
                prepared.path(),
                requests,
                self.settings.max_parallel_passes,
            ),
            Err(e) => {
                warn!("unable to stage crop for OCR: {:#}", e);
                vec![String::new(); requests.len()]
            }
        }
    }

    /// Like `read`, with `backup` standing in for every request that came
    /// back empty.
    pub fn read_with_backup(
        &self,
        image: &GrayImage,
        deskew: Option<bool>,
        requests: &[OcrRequest],
        backup: &OcrRequest,
    ) -> Vec<String> {
        let prepared = match self.prepare(image, deskew) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("unable to stage crop for OCR: {:#}", e);
                return vec![String::new(); requests.len()];
            }
        };
        let outputs = run_bounded(
            self.engine,
            prepared.path(),
            requests,
            self.settings.max_parallel_passes,
        );
        if outputs.iter().all(|o| !o.trim().is_empty()) {
            return outputs;
        }
        let fallback = ocr_or_empty(self.engine, prepared.path(), backup);
        outputs
            .into_iter()
            .map(|o| if o.trim().is_empty() { fallback.clone() } else { o })
            .collect()
    }

    fn prepare(&self, image: &GrayImage, deskew: Option<bool>) -> Result<PreparedImage> {
        let original = temp_png()?;
        image.save_with_format(original.path(), ImageFormat::Png)?;

        let processed = match (deskew, self.preprocessor) {
            (Some(deskew), Some(preprocessor)) => {
                let output = temp_png()?;
                match preprocessor.preprocess(original.path(), output.path(), deskew) {
                    Ok(()) => Some(output),
                    Err(e) => {
                        debug!("preprocessing skipped: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };
        Ok(PreparedImage {
            original,
            processed,
        })
    }
}

fn temp_png() -> Result<NamedTempFile> {
    Ok(Builder::new().prefix("formscan-").suffix(".png").tempfile()?)
}

/// Staged crop; both files are removed when dropped.
struct PreparedImage {
    original: NamedTempFile,
    processed: Option<NamedTempFile>,
}

impl PreparedImage {
    fn path(&self) -> &Path {
        self.processed
            .as_ref()
            .map_or(self.original.path(), |p| p.path())
    }
}

/// Issues `requests` against `image` with at most `max_parallel` in flight,
/// collecting outputs in request order.
pub fn run_bounded(
    engine: &dyn OcrEngine,
    image: &Path,
    requests: &[OcrRequest],
    max_parallel: usize,
) -> Vec<String> {
    let mut outputs = Vec::with_capacity(requests.len());
    for chunk in requests.chunks(max_parallel.max(1)) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|request| scope.spawn(move || ocr_or_empty(engine, image, request)))
                .collect();
            outputs.extend(handles.into_iter().map(|h| h.join().unwrap_or_default()));
        });
    }
    outputs
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::Luma;

    use super::*;
    use crate::{
        error::FormError,
        ocr::{scripted::ScriptedEngine, OutputMode},
    };

    struct FailingPreprocessor;

    impl ImagePreprocessor for FailingPreprocessor {
        fn preprocess(&self, _: &Path, _: &Path, _: bool) -> Result<(), FormError> {
            Err(FormError::subprocess("python3", "No such file or directory"))
        }
    }

    struct CopyingPreprocessor;

    impl ImagePreprocessor for CopyingPreprocessor {
        fn preprocess(&self, input: &Path, output: &Path, _: bool) -> Result<(), FormError> {
            fs::copy(input, output)?;
            Ok(())
        }
    }

    fn page() -> DynamicImage {
        let mut gray = GrayImage::from_pixel(200, 100, Luma([255]));
        for x in 20..120 {
            for y in 20..40 {
                gray.put_pixel(x, y, Luma([10]));
            }
        }
        DynamicImage::ImageLuma8(gray)
    }

    fn roi() -> Roi {
        Roi {
            x: 10,
            y: 10,
            width: 120,
            height: 40,
        }
    }

    #[test]
    fn region_returns_both_passes() {
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleWord, "REYES\n")
            .answer(OutputMode::Text, Psm::SingleLine, "REYES");
        let reocr = ReOcr::new(&engine, None, ReOcrSettings::default());
        let passes = reocr.region(&page(), &roi(), FieldHint::Surname);
        assert_eq!(
            passes,
            Passes {
                word: "REYES".to_owned(),
                line: "REYES".to_owned()
            }
        );
        assert_eq!(passes.reading(""), ("REYES".to_owned(), Corroboration::Consensus));

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.whitelist == Some(UPPER_WHITELIST)));
        assert!(calls.iter().all(|c| !c.dictionary));
    }

    #[test]
    fn region_outside_the_page_reads_nothing() {
        let engine = ScriptedEngine::new().answer(OutputMode::Text, Psm::SingleWord, "REYES");
        let reocr = ReOcr::new(&engine, None, ReOcrSettings::default());
        let outside = Roi {
            x: 500,
            y: 0,
            width: 50,
            height: 50,
        };
        assert!(reocr.region(&page(), &outside, FieldHint::Surname).is_empty());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn failing_engine_reads_empty() {
        let engine = ScriptedEngine::failing();
        let reocr = ReOcr::new(&engine, None, ReOcrSettings::default());
        assert!(reocr.region(&page(), &roi(), FieldHint::GivenName).is_empty());
        assert_eq!(engine.calls().len(), 2);
    }

    #[test]
    fn preprocessor_failure_falls_back_to_the_crop() {
        let engine = ScriptedEngine::new().answer(OutputMode::Text, Psm::SingleLine, "Maria");
        let reocr = ReOcr::new(&engine, Some(&FailingPreprocessor), ReOcrSettings::default());
        let passes = reocr.region(&page(), &roi(), FieldHint::GivenName);
        assert_eq!(passes.line, "Maria");
        assert_eq!(passes.reading("Maria"), ("Maria".to_owned(), Corroboration::None));
    }

    #[test]
    fn preprocessed_crop_is_read() {
        let engine = ScriptedEngine::new().answer(OutputMode::Text, Psm::SingleWord, "SANTOS");
        let reocr = ReOcr::new(&engine, Some(&CopyingPreprocessor), ReOcrSettings::default());
        let gray = page().to_luma8();
        let out = reocr.read(&gray, Some(true), &[OcrRequest::text(Psm::SingleWord)]);
        assert_eq!(out, vec!["SANTOS".to_owned()]);
    }

    #[test]
    fn backup_fills_empty_passes_only() {
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleLine, "DELACRUZ")
            .answer(OutputMode::Text, Psm::Block, "DELA CRUZ");
        let reocr = ReOcr::new(&engine, None, ReOcrSettings::default());
        let gray = page().to_luma8();
        let out = reocr.read_with_backup(
            &gray,
            None,
            &[OcrRequest::text(Psm::SingleLine), OcrRequest::text(Psm::SingleWord)],
            &OcrRequest::text(Psm::Block),
        );
        assert_eq!(out, vec!["DELACRUZ".to_owned(), "DELA CRUZ".to_owned()]);
    }

    #[test]
    fn bounded_runs_keep_request_order() {
        let engine = ScriptedEngine::new()
            .answer(OutputMode::Text, Psm::SingleWord, "one")
            .answer(OutputMode::Text, Psm::SingleLine, "two")
            .answer(OutputMode::Text, Psm::RawLine, "three");
        let requests = [Psm::SingleWord, Psm::SingleLine, Psm::RawLine].map(OcrRequest::text);
        let out = run_bounded(&engine, Path::new("unused.png"), &requests, 2);
        assert_eq!(out, vec!["one", "two", "three"]);
    }
}

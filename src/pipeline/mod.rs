//! One scanned form in, three name fields out.

use std::{fs, io::Write, path::Path};

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use log::{debug, info, warn};
use serde::Serialize;
use tempfile::Builder;

use crate::{
    assembler::{assemble, FieldResult},
    chain::ExtractionContext,
    config::{Backend, FormscanConfig},
    error::FormError,
    geometry::{PageBounds, Token},
    ocr::{cli::TesseractCli, parse_tokens, OcrEngine, OcrRequest, Psm, NAME_WHITELIST},
    raw_text::LabelPatterns,
    reocr::{run_bounded, ImagePreprocessor, ReOcr, ReOcrSettings, ScriptPreprocessor},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormExtraction {
    #[serde(flatten)]
    pub names: FieldResult,
    /// Whole-page plain OCR text.
    pub raw_text: String,
}

/// Reads forms with one OCR engine and one optional preprocessing script.
pub struct FormReader {
    engine: Box<dyn OcrEngine>,
    preprocessor: Option<Box<dyn ImagePreprocessor>>,
    config: FormscanConfig,
    patterns: LabelPatterns,
}

impl FormReader {
    pub fn new(config: FormscanConfig) -> Result<FormReader> {
        let engine: Box<dyn OcrEngine> = match config.ocr.backend {
            Backend::Cli => Box::new(TesseractCli {
                program: config.ocr.program.clone(),
                lang: config.ocr.lang.clone(),
                timeout: config.ocr.timeout,
            }),
            #[cfg(feature = "libtesseract")]
            Backend::Library => Box::new(crate::ocr::library::LibTesseractEngine {
                lang: config.ocr.lang.clone(),
                timeout: config.ocr.timeout,
            }),
            #[cfg(not(feature = "libtesseract"))]
            Backend::Library => {
                anyhow::bail!("the library backend needs the `libtesseract` feature")
            }
        };
        let preprocessor = ScriptPreprocessor::from_config(&config.preprocess)
            .map(|p| Box::new(p) as Box<dyn ImagePreprocessor>);
        Ok(FormReader {
            engine,
            preprocessor,
            patterns: LabelPatterns::new()?,
            config,
        })
    }

    pub fn with_engine(self, engine: impl OcrEngine + 'static) -> FormReader {
        FormReader {
            engine: Box::new(engine),
            ..self
        }
    }

    pub fn with_preprocessor(self, preprocessor: impl ImagePreprocessor + 'static) -> FormReader {
        FormReader {
            preprocessor: Some(Box::new(preprocessor)),
            ..self
        }
    }

    pub fn config(&self) -> &FormscanConfig {
        &self.config
    }

    /// Checks an upload's name and size, returning its lowercase extension.
    pub fn validate_upload(&self, file_name: &str, len: u64) -> Result<String, FormError> {
        let upload = &self.config.upload;
        let extension = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !upload.extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
            return Err(FormError::Validation(format!(
                "unsupported file type {:?}, expected one of {}",
                file_name,
                upload.extensions.join(", ")
            )));
        }
        if len > upload.max_bytes {
            return Err(FormError::Validation(format!(
                "{} is {} bytes, the limit is {}",
                file_name, len, upload.max_bytes
            )));
        }
        Ok(extension)
    }

    /// Extracts the name fields of the form stored at `path`.
    ///
    /// Only a rejected upload or an unreadable file is an error; OCR and
    /// decoding failures degrade to an empty result.
    pub fn read(&self, path: &Path) -> Result<FormExtraction, FormError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.validate_upload(&file_name, fs::metadata(path)?.len())?;

        let page = match image::open(path) {
            Ok(page) => Some(page),
            Err(source) => {
                let e = FormError::ImageDecode {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}, image strategies are skipped", e);
                None
            }
        };

        let requests = [
            OcrRequest::text(Psm::SparseText),
            OcrRequest::tsv(Psm::SparseText).whitelist(NAME_WHITELIST),
        ];
        let mut outputs = run_bounded(
            self.engine.as_ref(),
            path,
            &requests,
            self.config.ocr.max_parallel_passes,
        )
        .into_iter();
        let raw_text = outputs.next().unwrap_or_default();
        let tokens = parse_tokens(&outputs.next().unwrap_or_default());
        debug!("{} tokens, {} chars of page text", tokens.len(), raw_text.len());

        let ctx = ExtractionContext {
            tokens: &tokens,
            bounds: page_bounds(&tokens, page.as_ref()),
            page: page.as_ref(),
            raw_text: &raw_text,
            reocr: ReOcr::new(
                self.engine.as_ref(),
                self.preprocessor.as_deref(),
                ReOcrSettings::from_config(&self.config),
            ),
        };
        let names = assemble(&ctx, &self.patterns);
        if names.is_empty() {
            info!("no name found in {:?}", file_name);
        }
        Ok(FormExtraction { names, raw_text })
    }

    /// Same as `read` for an upload held in memory. The bytes are staged in a
    /// temporary file that is removed on return.
    pub fn read_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<FormExtraction, FormError> {
        let extension = self.validate_upload(file_name, bytes.len() as u64)?;
        let mut staged = Builder::new()
            .prefix("formscan-upload-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        staged.write_all(bytes)?;
        staged.flush()?;
        self.read(staged.path())
    }
}

/// Token extent, or the image size when OCR found no words.
fn page_bounds(tokens: &[Token], page: Option<&DynamicImage>) -> PageBounds {
    let bounds = PageBounds::of(tokens);
    match page {
        Some(page) if bounds.is_empty() => {
            let (width, height) = page.dimensions();
            PageBounds {
                width: width as i32,
                height: height as i32,
            }
        }
        _ => bounds,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{GrayImage, ImageOutputFormat, Luma};

    use super::*;
    use crate::ocr::{
        scripted::{tsv_table, ScriptedEngine},
        OutputMode,
    };

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn labelled_form() -> ScriptedEngine {
        ScriptedEngine::new()
            .answer(
                OutputMode::Tsv,
                Psm::SparseText,
                tsv_table(&[
                    ("DELACRUZ", 90, 10, 110, 35),
                    ("Last", 100, 50, 40, 14),
                    ("Name", 160, 52, 40, 14),
                ]),
            )
            .answer(OutputMode::Text, Psm::SparseText, "DELACRUZ\nLast Name\n")
    }

    fn reader() -> FormReader {
        FormReader::new(FormscanConfig::default()).unwrap()
    }

    #[test]
    fn uploads_are_checked_by_extension_and_size() {
        let reader = reader();
        assert_eq!(reader.validate_upload("form.JPG", 10).unwrap(), "jpg");
        assert_eq!(reader.validate_upload("scan.pdf", 10).unwrap(), "pdf");
        assert!(matches!(
            reader.validate_upload("notes.txt", 10),
            Err(FormError::Validation(_))
        ));
        assert!(matches!(
            reader.validate_upload("form", 10),
            Err(FormError::Validation(_))
        ));
        assert!(matches!(
            reader.validate_upload("form.png", 11 * 1024 * 1024),
            Err(FormError::Validation(_))
        ));
    }

    #[test]
    fn labelled_form_is_read_from_memory() {
        let reader = reader().with_engine(labelled_form());
        let extraction = reader.read_bytes("form.png", &white_png(400, 200)).unwrap();
        assert_eq!(extraction.names.last_name, "DELACRUZ");
        assert_eq!(extraction.names.first_name, "");
        assert!(!extraction.names.fallback_used);
        assert_eq!(extraction.raw_text, "DELACRUZ\nLast Name\n");
    }

    #[test]
    fn undecodable_upload_still_uses_ocr_output() {
        let reader = reader().with_engine(labelled_form());
        let extraction = reader.read_bytes("form.png", b"not really a png").unwrap();
        assert_eq!(extraction.names.last_name, "DELACRUZ");
    }

    #[test]
    fn missing_engine_gives_an_empty_result() {
        let reader = reader().with_engine(ScriptedEngine::failing());
        let extraction = reader.read_bytes("form.png", &white_png(64, 64)).unwrap();
        assert!(extraction.names.is_empty());
        assert!(!extraction.names.fallback_used);
        assert_eq!(extraction.raw_text, "");
    }

    #[test]
    fn rejected_upload_is_an_error() {
        let reader = reader().with_engine(labelled_form());
        assert!(matches!(
            reader.read_bytes("form.gif", &white_png(10, 10)),
            Err(FormError::Validation(_))
        ));
    }

    #[test]
    fn result_serializes_flat() {
        let extraction = FormExtraction {
            names: FieldResult {
                last_name: "SANTOS".to_owned(),
                first_name: "MARIA".to_owned(),
                middle_name: "REYES".to_owned(),
                fallback_used: true,
            },
            raw_text: "SANTOS MARIA REYES".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&extraction).unwrap(),
            serde_json::json!({
                "last_name": "SANTOS",
                "first_name": "MARIA",
                "middle_name": "REYES",
                "fallback_used": true,
                "raw_text": "SANTOS MARIA REYES",
            })
        );
    }
}

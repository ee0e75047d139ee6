use std::{
    path::Path,
    sync::mpsc,
    thread,
    time::Duration,
};

use anyhow::{anyhow, Result};
use tesseract::Tesseract;

use super::{OcrEngine, OcrRequest, OutputMode};
use crate::error::FormError;

/// In-process Tesseract through libtesseract.
///
/// Each pass runs on its own thread; a pass that outlives `timeout` is
/// abandoned and reported as timed out.
#[derive(Debug, Clone)]
pub struct LibTesseractEngine {
    pub lang: String,
    pub timeout: Duration,
}

impl OcrEngine for LibTesseractEngine {
    fn ocr(&self, image: &Path, request: &OcrRequest) -> Result<String, FormError> {
        let (tx, rx) = mpsc::channel();
        let image = image.to_path_buf();
        let lang = self.lang.clone();
        let request = request.clone();
        thread::spawn(move || {
            let _ = tx.send(recognize(&image, &lang, &request));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(FormError::subprocess("libtesseract", format!("{:#}", e))),
            Err(_) => Err(FormError::Timeout {
                program: "libtesseract".to_owned(),
                timeout: self.timeout,
            }),
        }
    }
}

// dictionary toggles are init-only variables, so crops keep the defaults here
fn recognize(image: &Path, lang: &str, request: &OcrRequest) -> Result<String> {
    let path = image
        .to_str()
        .ok_or_else(|| anyhow!("non UTF-8 image path: {:?}", image))?;

    let mut tess = Tesseract::new(None, Some(lang))?
        .set_variable("tessedit_pageseg_mode", &request.psm.code().to_string())?;
    if let Some(whitelist) = request.whitelist {
        tess = tess.set_variable("tessedit_char_whitelist", whitelist)?;
    }
    if request.mode == OutputMode::Tsv {
        tess = tess.set_variable("preserve_interword_spaces", "1")?;
    }

    let mut tess = tess.set_image(path)?.recognize()?;
    Ok(match request.mode {
        OutputMode::Text => tess.get_text()?,
        OutputMode::Tsv => tess.get_tsv_text(0)?,
    })
}

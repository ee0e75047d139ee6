use std::{path::Path, process::Command, time::Duration};

use super::{OcrEngine, OcrRequest, OutputMode};
use crate::{error::FormError, process};

/// Drives the `tesseract` command line tool, one process per pass.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub program: String,
    pub lang: String,
    pub timeout: Duration,
}

impl TesseractCli {
    fn command(&self, image: &Path, request: &OcrRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image)
            .arg("stdout")
            .args(["-l", &self.lang])
            .args(["--psm", &request.psm.code().to_string()]);
        if !request.dictionary {
            cmd.args(["-c", "load_system_dawg=0", "-c", "load_freq_dawg=0"]);
        }
        if let Some(whitelist) = request.whitelist {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        if request.mode == OutputMode::Tsv {
            cmd.args(["-c", "preserve_interword_spaces=1", "tsv"]);
        }
        cmd
    }
}

impl OcrEngine for TesseractCli {
    fn ocr(&self, image: &Path, request: &OcrRequest) -> Result<String, FormError> {
        process::run(&mut self.command(image, request), self.timeout)
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use log::warn;

use crate::{config::PreprocessConfig, error::FormError, process};

/// Deskew and denoise capability applied to crops before OCR.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, input: &Path, output: &Path, deskew: bool) -> Result<(), FormError>;
}

/// Companion script invoked as
/// `<interpreter> <script> --in <input> --out <output> --deskew 0|1`.
#[derive(Debug, Clone)]
pub struct ScriptPreprocessor {
    pub interpreter: String,
    pub script: PathBuf,
    pub timeout: Duration,
}

impl ScriptPreprocessor {
    /// `None` when no script is configured or the configured one is missing.
    pub fn from_config(config: &PreprocessConfig) -> Option<ScriptPreprocessor> {
        let script = config.script.as_ref()?;
        if !script.is_file() {
            warn!(
                "preprocessing script {:?} not found, crops will be used as is",
                script
            );
            return None;
        }
        Some(ScriptPreprocessor {
            interpreter: config.interpreter.clone(),
            script: script.clone(),
            timeout: config.timeout,
        })
    }
}

impl ImagePreprocessor for ScriptPreprocessor {
    fn preprocess(&self, input: &Path, output: &Path, deskew: bool) -> Result<(), FormError> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .arg("--in")
            .arg(input)
            .arg("--out")
            .arg(output)
            .args(["--deskew", if deskew { "1" } else { "0" }]);
        process::run(&mut cmd, self.timeout)?;

        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(FormError::subprocess(
                &self.interpreter,
                "no output image written",
            )),
        }
    }
}

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures a form read can run into.
///
/// Only `Validation` and `Io` ever leave `FormReader::read`; the others are
/// raised by OCR and imaging helpers and recovered into empty output.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("{0}")]
    Validation(String),
    #[error("{program} failed: {reason}")]
    Subprocess { program: String, reason: String },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("unable to decode image {path:?}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FormError {
    pub fn subprocess(program: impl Into<String>, reason: impl ToString) -> Self {
        FormError::Subprocess {
            program: program.into(),
            reason: reason.to_string(),
        }
    }
}

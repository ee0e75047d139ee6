//! Reads the handwritten last, first and middle name off a scanned
//! registration form.

pub mod assembler;
pub mod candidate;
pub mod chain;
pub mod config;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod imaging;
pub mod labels;
pub mod ocr;
pub mod pipeline;
pub mod process;
pub mod raw_text;
pub mod reocr;
pub mod roi;
pub mod text;

pub use assembler::FieldResult;
pub use error::FormError;
pub use pipeline::{FormExtraction, FormReader};

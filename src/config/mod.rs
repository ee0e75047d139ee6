use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Result};
use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use directories::BaseDirs;
use log::warn;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

const CONFIG_FILE: &str = "formscan.toml";
const ENV_PREFIX: &str = "FORMSCAN";

/// Loads `path`, or `formscan.toml` from the user config directory, with
/// `FORMSCAN__SECTION__KEY` environment overrides on top.
pub fn load_config(path: Option<&Path>) -> Result<FormscanConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path().ok_or_else(|| anyhow!("no user config directory for {}", CONFIG_FILE))?,
    };
    deserialize(
        config::Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)),
    )
}

/// Parses a configuration from TOML text.
pub fn parse_config(toml: &str) -> Result<FormscanConfig> {
    deserialize(config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

fn deserialize(builder: ConfigBuilder<DefaultState>) -> Result<FormscanConfig> {
    builder
        .build()
        .map_err(|e| {
            warn!("Failed to load config file: {:?}", e);
            e
        })?
        .try_deserialize()
        .map_err(|e| {
            warn!("Incompatible configuration: {:?}", e);
            anyhow!("Incompatible configuration: {:?}", e)
        })
}

fn config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FormscanConfig {
    #[serde(default = "OcrConfig::default")]
    pub ocr: OcrConfig,
    #[serde(default = "PreprocessConfig::default")]
    pub preprocess: PreprocessConfig,
    #[serde(default = "EnhanceConfig::default")]
    pub enhance: EnhanceConfig,
    #[serde(default = "UploadConfig::default")]
    pub upload: UploadConfig,
    #[serde(default = "ServerSection::default")]
    pub server: ServerSection,
}

// OCR engine

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One `tesseract` process per pass.
    Cli,
    /// libtesseract in-process, needs the `libtesseract` feature.
    Library,
}

fn default_backend() -> Backend {
    Backend::Cli
}

fn default_program() -> String {
    "tesseract".to_owned()
}

fn default_lang() -> String {
    "eng".to_owned()
}

fn default_ocr_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_max_parallel_passes() -> usize {
    3
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_ocr_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_max_parallel_passes")]
    pub max_parallel_passes: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            program: default_program(),
            lang: default_lang(),
            timeout: default_ocr_timeout(),
            max_parallel_passes: default_max_parallel_passes(),
        }
    }
}

// companion preprocessing script

fn default_interpreter() -> String {
    "python3".to_owned()
}

fn default_preprocess_timeout() -> Duration {
    Duration::from_secs(10)
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_preprocess_timeout")]
    pub timeout: Duration,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            script: None,
            interpreter: default_interpreter(),
            timeout: default_preprocess_timeout(),
        }
    }
}

// crop enhancement

fn default_upscale() -> f32 {
    1.8
}

fn default_contrast() -> f32 {
    30.
}

fn default_surname_upscale() -> f32 {
    2.5
}

#[derive(Deserialize, Debug, Clone)]
pub struct EnhanceConfig {
    #[serde(default = "default_upscale")]
    pub upscale: f32,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
    #[serde(default = "default_surname_upscale")]
    pub surname_upscale: f32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            upscale: default_upscale(),
            contrast: default_contrast(),
            surname_upscale: default_surname_upscale(),
        }
    }
}

// uploads

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "pdf"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

#[derive(Deserialize, Debug, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            extensions: default_extensions(),
        }
    }
}

// HTTP server

fn default_address() -> String {
    "0.0.0.0:8080".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct ServerSection {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.ocr.backend, Backend::Cli);
        assert_eq!(config.ocr.lang, "eng");
        assert_eq!(config.ocr.timeout, Duration::from_secs(8));
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert!(config.preprocess.script.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [ocr]
            lang = "fil"
            timeout = 5

            [preprocess]
            script = "/opt/formscan/ocr_preprocess.py"

            [enhance]
            upscale = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.ocr.lang, "fil");
        assert_eq!(config.ocr.timeout, Duration::from_secs(5));
        assert_eq!(config.ocr.program, "tesseract");
        assert_eq!(
            config.preprocess.script,
            Some(PathBuf::from("/opt/formscan/ocr_preprocess.py"))
        );
        assert_eq!(config.enhance.upscale, 2.0);
        assert_eq!(config.enhance.contrast, 30.);
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(parse_config("[ocr]\ntimeout = \"soon\"").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/formscan.toml"))).is_err());
    }
}

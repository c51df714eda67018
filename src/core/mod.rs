// image-convert/src/core/mod.rs
pub mod converter;
pub mod request;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Inputs larger than this are rejected before decoding.
pub const MAX_FILE_SIZE_MB: u64 = 100;
/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 10_000;
/// Extensions (lowercase, without the dot) picked up by batch enumeration.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tiff", "bmp", "webp"];

pub const DEFAULT_WEBP_QUALITY: u8 = 80;
pub const DEFAULT_AVIF_QUALITY: u8 = 50;

/// Which encodings a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Avif,
    #[default]
    Both,
}

/// A single encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Avif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Single,
    Batch,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Both => "both",
        }
    }

    /// Encodings to produce, in write order.
    pub fn targets(self) -> &'static [TargetFormat] {
        match self {
            OutputFormat::Webp => &[TargetFormat::Webp],
            OutputFormat::Avif => &[TargetFormat::Avif],
            OutputFormat::Both => &[TargetFormat::Webp, TargetFormat::Avif],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            "both" => Ok(OutputFormat::Both),
            other => Err(ConvertError::InvalidParameter(format!(
                "Invalid format: {}",
                other
            ))),
        }
    }
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Avif => "avif",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetFormat::Webp => "WebP",
            TargetFormat::Avif => "AVIF",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Mode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Mode::Single),
            "batch" => Ok(Mode::Batch),
            other => Err(ConvertError::InvalidParameter(format!(
                "Invalid mode: {}",
                other
            ))),
        }
    }
}

/// Conversion parameters shared by every front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub format: OutputFormat,
    pub webp_quality: u8,
    pub avif_quality: u8,
    pub lossless: bool,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Both,
            webp_quality: DEFAULT_WEBP_QUALITY,
            avif_quality: DEFAULT_AVIF_QUALITY,
            lossless: false,
            max_width: None,
            max_height: None,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<()> {
        validation::check_quality("webp_quality", i64::from(self.webp_quality))?;
        validation::check_quality("avif_quality", i64::from(self.avif_quality))?;

        if self.max_width == Some(0) {
            return Err(ConvertError::InvalidParameter(
                "max_width must be a positive integer, got 0".to_string(),
            ));
        }

        if self.max_height == Some(0) {
            return Err(ConvertError::InvalidParameter(
                "max_height must be a positive integer, got 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets both codec qualities to the same value.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.webp_quality = quality;
        self.avif_quality = quality;
        self
    }
}

/// Outcome of converting one input file.
///
/// Serializes to the flat objects `{"input", "webp"?, "avif"?}` and
/// `{"input", "error"}`. `Failed` is listed first so untagged decoding never
/// mistakes an error record for a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversionResult {
    Failed {
        input: PathBuf,
        error: String,
    },
    Converted {
        input: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webp: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avif: Option<PathBuf>,
    },
}

impl ConversionResult {
    pub fn failed(input: &Path, error: impl Into<String>) -> Self {
        ConversionResult::Failed {
            input: input.to_path_buf(),
            error: error.into(),
        }
    }

    pub fn input(&self) -> &Path {
        match self {
            ConversionResult::Failed { input, .. } | ConversionResult::Converted { input, .. } => {
                input
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConversionResult::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConversionResult::Failed { error, .. } => Some(error),
            ConversionResult::Converted { .. } => None,
        }
    }

    pub fn webp(&self) -> Option<&Path> {
        match self {
            ConversionResult::Converted { webp, .. } => webp.as_deref(),
            ConversionResult::Failed { .. } => None,
        }
    }

    pub fn avif(&self) -> Option<&Path> {
        match self {
            ConversionResult::Converted { avif, .. } => avif.as_deref(),
            ConversionResult::Failed { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Path error: {0}")]
    Path(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown preset '{name}'. Available presets: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("Conversion failed for {}: {message}", path.display())]
    ConversionFailed { path: PathBuf, message: String },

    #[error("Could not read input file: {}", path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Wraps a load/resize/encode failure, keeping an existing wrap intact.
    pub fn conversion_failed(path: &Path, error: ConvertError) -> Self {
        match error {
            ConvertError::ConversionFailed { .. } => error,
            other => ConvertError::ConversionFailed {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        }
    }

    /// Bad input rejected before any work started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConvertError::Path(_)
                | ConvertError::LimitExceeded(_)
                | ConvertError::InvalidParameter(_)
                | ConvertError::UnknownPreset { .. }
        )
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, ConvertError::ConversionFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_targets() {
        assert_eq!(OutputFormat::Webp.targets(), &[TargetFormat::Webp]);
        assert_eq!(OutputFormat::Avif.targets(), &[TargetFormat::Avif]);
        assert_eq!(
            OutputFormat::Both.targets(),
            &[TargetFormat::Webp, TargetFormat::Avif]
        );
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        let err = "gif".parse::<OutputFormat>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Invalid format: gif"));
    }

    #[test]
    fn test_options_validate() {
        assert!(ConvertOptions::default().validate().is_ok());

        let zero_quality = ConvertOptions {
            webp_quality: 0,
            ..Default::default()
        };
        assert!(zero_quality
            .validate()
            .unwrap_err()
            .to_string()
            .contains("webp_quality"));

        let too_high = ConvertOptions::default().with_quality(101);
        assert!(too_high.validate().is_err());

        let zero_width = ConvertOptions {
            max_width: Some(0),
            ..Default::default()
        };
        assert!(zero_width.validate().is_err());
    }

    #[test]
    fn test_result_serialization_shape() {
        let converted = ConversionResult::Converted {
            input: PathBuf::from("/in/a.png"),
            webp: Some(PathBuf::from("/out/a.webp")),
            avif: None,
        };
        let value = serde_json::to_value(&converted).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"input": "/in/a.png", "webp": "/out/a.webp"})
        );

        let failed = ConversionResult::failed(Path::new("/in/b.png"), "boom");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value, serde_json::json!({"input": "/in/b.png", "error": "boom"}));

        let decoded: ConversionResult = serde_json::from_value(value).unwrap();
        assert!(decoded.is_failed());
        assert_eq!(decoded.error(), Some("boom"));
    }

    #[test]
    fn test_conversion_failed_is_not_rewrapped() {
        let inner = ConvertError::LimitExceeded("too big".to_string());
        let wrapped = ConvertError::conversion_failed(Path::new("a.png"), inner);
        let message = wrapped.to_string();
        assert!(message.starts_with("Conversion failed for a.png"));
        assert!(message.contains("too big"));

        let again = ConvertError::conversion_failed(Path::new("other.png"), wrapped);
        assert_eq!(again.to_string(), message);
        assert!(again.is_conversion());
        assert!(!again.is_validation());
    }
}

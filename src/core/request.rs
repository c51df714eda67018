// image-convert/src/core/request.rs
use super::validation::{validate_path, validate_request};
use super::{ConvertError, ConvertOptions, Mode, Result};
use crate::presets::apply_preset;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// A conversion request as received from any front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub options: ConvertOptions,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub preset: Option<String>,
    /// Overrides both codec qualities after any preset.
    #[serde(default)]
    pub quality: Option<u8>,
}

/// A request whose paths are resolved and whose output directory exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub options: ConvertOptions,
    pub workers: Option<usize>,
}

impl ConversionRequest {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: None,
            options: ConvertOptions::default(),
            workers: None,
            mode: None,
            preset: None,
            quality: None,
        }
    }

    /// Validates untyped parameters, then deserializes them with defaults.
    pub fn from_params(params: &Value) -> Result<Self> {
        validate_request(params)?;
        serde_json::from_value(strip_nulls(params))
            .map_err(|e| ConvertError::InvalidParameter(e.to_string()))
    }

    /// Options after the preset overlay and the quality override.
    pub fn effective_options(&self) -> Result<ConvertOptions> {
        let options = apply_preset(self.options, self.preset.as_deref(), self.quality)?;
        options.validate()?;
        Ok(options)
    }

    /// Resolves paths for `mode` and creates the output directory.
    ///
    /// All checks run before the directory is created. Without an explicit
    /// `output_dir`, single mode writes next to the input file and batch mode
    /// writes into the input directory.
    pub fn prepare(&self, mode: Mode) -> Result<PreparedRequest> {
        let input = validate_path(&self.input_path, true)?;

        match mode {
            Mode::Single if !input.is_file() => {
                return Err(ConvertError::InvalidParameter(
                    "Single mode requires a file as input_path".to_string(),
                ))
            }
            Mode::Batch if !input.is_dir() => {
                return Err(ConvertError::InvalidParameter(
                    "Batch mode requires a directory as input_path".to_string(),
                ))
            }
            _ => {}
        }

        let output_dir = match (&self.output_dir, mode) {
            (Some(dir), _) => dir.clone(),
            (None, Mode::Single) => input
                .parent()
                .map(PathBuf::from)
                .ok_or_else(|| {
                    ConvertError::Path(format!("Input has no parent directory: {}", input.display()))
                })?,
            (None, Mode::Batch) => input.clone(),
        };
        let output_dir = validate_path(&output_dir, false)?;
        if output_dir.exists() && !output_dir.is_dir() {
            return Err(ConvertError::Path(format!(
                "Output path exists but is not a directory: {}",
                output_dir.display()
            )));
        }

        let options = self.effective_options()?;

        std::fs::create_dir_all(&output_dir)?;

        Ok(PreparedRequest {
            input,
            output_dir,
            options,
            workers: self.workers.filter(|n| *n > 0),
        })
    }
}

/// Drops `null` fields and an empty `mode`, both of which mean "absent".
fn strip_nulls(params: &Value) -> Value {
    match params {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(_, value)| !value.is_null())
                .filter(|(key, value)| key.as_str() != "mode" || value.as_str() != Some(""))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

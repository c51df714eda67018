// image-convert/src/core/validation.rs
//! Static limit and parameter checks. Nothing here writes to disk.

use super::{ConvertError, Mode, OutputFormat, Result};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Resolves `path` to an absolute, normalized path.
///
/// Existing paths are canonicalized. A missing path is accepted when
/// `must_exist` is false: its longest existing ancestor is canonicalized and
/// the remaining components are appended.
pub fn validate_path(path: &Path, must_exist: bool) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| invalid_path(path, &e))?
            .join(path)
    };

    match absolute.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if must_exist {
                return Err(ConvertError::Path(format!(
                    "Path does not exist: {}",
                    path.display()
                )));
            }
            resolve_missing(path, &absolute)
        }
        Err(e) => Err(invalid_path(path, &e)),
    }
}

fn resolve_missing(original: &Path, absolute: &Path) -> Result<PathBuf> {
    let normalized = normalize_lexically(absolute);
    let mut existing = normalized.as_path();
    let mut tail = Vec::new();

    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| invalid_path(original, &e))?;
    for component in tail.iter().rev() {
        resolved.push(component);
    }

    Ok(resolved)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn invalid_path(path: &Path, error: &std::io::Error) -> ConvertError {
    ConvertError::Path(format!("Invalid path: {} - {}", path.display(), error))
}

/// Fails when the file is larger than `max_size_mb`. Missing files pass.
pub fn validate_file_size(path: &Path, max_size_mb: u64) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_size_mb as f64 {
        return Err(ConvertError::LimitExceeded(format!(
            "File too large: {:.2}MB (max: {}MB)",
            size_mb, max_size_mb
        )));
    }

    Ok(())
}

pub fn validate_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width > max_dimension || height > max_dimension {
        return Err(ConvertError::LimitExceeded(format!(
            "Image dimensions too large: {}x{} (max: {})",
            width, height, max_dimension
        )));
    }

    Ok(())
}

/// Range check shared by the typed and untyped validators.
pub fn check_quality(field: &str, quality: i64) -> Result<u8> {
    if !(1..=100).contains(&quality) {
        return Err(ConvertError::InvalidParameter(format!(
            "{} must be 1-100, got {}",
            field, quality
        )));
    }

    u8::try_from(quality).map_err(|_| {
        ConvertError::InvalidParameter(format!("{} must be 1-100, got {}", field, quality))
    })
}

/// Checks an untyped request object before it is deserialized.
///
/// `input_path` is required. `format`, `mode`, the quality fields and the
/// size limits are optional but must be well-formed when present; `null`
/// counts as absent.
pub fn validate_request(params: &Value) -> Result<()> {
    let object = params.as_object().ok_or_else(|| {
        ConvertError::InvalidParameter("Request parameters must be a JSON object".to_string())
    })?;

    match present(object, "input_path") {
        None => {
            return Err(ConvertError::InvalidParameter(
                "Missing required parameter: input_path".to_string(),
            ))
        }
        Some(Value::String(path)) if !path.trim().is_empty() => {}
        Some(other) => {
            return Err(ConvertError::InvalidParameter(format!(
                "input_path must be a non-empty string, got {}",
                display_value(other)
            )))
        }
    }

    if let Some(output_dir) = present(object, "output_dir") {
        if !output_dir.is_string() {
            return Err(ConvertError::InvalidParameter(format!(
                "output_dir must be a string, got {}",
                display_value(output_dir)
            )));
        }
    }

    if let Some(format) = present(object, "format") {
        let parsed = format.as_str().map(str::parse::<OutputFormat>);
        if !matches!(parsed, Some(Ok(_))) {
            return Err(ConvertError::InvalidParameter(format!(
                "Invalid format: {}",
                display_value(format)
            )));
        }
    }

    for field in ["webp_quality", "avif_quality", "quality"] {
        if let Some(value) = present(object, field) {
            let quality = value.as_i64().ok_or_else(|| {
                ConvertError::InvalidParameter(format!(
                    "{} must be an integer, got {}",
                    field,
                    display_value(value)
                ))
            })?;
            check_quality(field, quality)?;
        }
    }

    if let Some(lossless) = present(object, "lossless") {
        if !lossless.is_boolean() {
            return Err(ConvertError::InvalidParameter(format!(
                "lossless must be a boolean, got {}",
                display_value(lossless)
            )));
        }
    }

    for field in ["max_width", "max_height"] {
        if let Some(value) = present(object, field) {
            let positive = value.as_u64().filter(|n| *n > 0 && *n <= u64::from(u32::MAX));
            if positive.is_none() {
                return Err(ConvertError::InvalidParameter(format!(
                    "{} must be a positive integer, got {}",
                    field,
                    display_value(value)
                )));
            }
        }
    }

    // 0 asks for one worker per CPU.
    if let Some(value) = present(object, "workers") {
        if value.as_u64().filter(|n| *n <= u64::from(u32::MAX)).is_none() {
            return Err(ConvertError::InvalidParameter(format!(
                "workers must be a non-negative integer, got {}",
                display_value(value)
            )));
        }
    }

    if let Some(preset) = present(object, "preset") {
        let name = preset.as_str().ok_or_else(|| {
            ConvertError::InvalidParameter(format!(
                "preset must be a string, got {}",
                display_value(preset)
            ))
        })?;
        crate::presets::get_preset(name)?;
    }

    if let Some(mode) = present(object, "mode") {
        match mode.as_str() {
            Some("") => {}
            Some(name) => {
                name.parse::<Mode>()?;
            }
            None => {
                return Err(ConvertError::InvalidParameter(format!(
                    "Invalid mode: {}",
                    display_value(mode)
                )))
            }
        }
    }

    Ok(())
}

fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_input_path() {
        let err = validate_request(&json!({})).unwrap_err();
        assert!(err.to_string().contains("Missing required parameter: input_path"));

        let err = validate_request(&json!({"input_path": null})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_mode() {
        let err = validate_request(&json!({"input_path": "/tmp/test.png", "mode": "invalid"}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid mode"));
        assert!(validate_request(&json!({"input_path": "/tmp/test.png", "mode": "batch"})).is_ok());
    }

    #[test]
    fn test_invalid_format() {
        let err = validate_request(&json!({"input_path": "/tmp/test.png", "format": "invalid"}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid format: invalid"));

        let err = validate_request(&json!({"input_path": "/tmp/test.png", "format": 3}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid format"));
    }

    #[test]
    fn test_quality_out_of_range_names_field() {
        for bad in [-5, 0, 101, 150, 1000] {
            let err = validate_request(&json!({"input_path": "/tmp/x.png", "webp_quality": bad}))
                .unwrap_err();
            assert!(err.to_string().contains("webp_quality must be 1-100"), "{}", err);

            let err = validate_request(&json!({"input_path": "/tmp/x.png", "avif_quality": bad}))
                .unwrap_err();
            assert!(err.to_string().contains("avif_quality must be 1-100"), "{}", err);
        }
    }

    #[test]
    fn test_quality_must_be_integer() {
        let err = validate_request(&json!({"input_path": "/tmp/x.png", "avif_quality": "high"}))
            .unwrap_err();
        assert!(err.to_string().contains("avif_quality must be an integer"));

        let err = validate_request(&json!({"input_path": "/tmp/x.png", "webp_quality": 80.5}))
            .unwrap_err();
        assert!(err.to_string().contains("webp_quality must be an integer"));
    }

    #[test]
    fn test_valid_params() {
        let params = json!({
            "input_path": "/tmp/test.png",
            "mode": "single",
            "format": "webp",
            "webp_quality": 80,
            "avif_quality": 50,
            "max_width": 640,
            "lossless": false,
            "preset": "web",
        });
        assert!(validate_request(&params).is_ok());
    }

    #[test]
    fn test_size_limits_must_be_positive() {
        let err = validate_request(&json!({"input_path": "/tmp/x.png", "max_width": 0}))
            .unwrap_err();
        assert!(err.to_string().contains("max_width must be a positive integer"));

        let err = validate_request(&json!({"input_path": "/tmp/x.png", "workers": -2}))
            .unwrap_err();
        assert!(err.to_string().contains("workers must be a non-negative integer, got -2"));
    }

    #[test]
    fn test_zero_workers_means_per_cpu() {
        assert!(validate_request(&json!({"input_path": "/tmp/in", "workers": 0})).is_ok());

        let err = validate_request(&json!({"input_path": "/tmp/in", "workers": 1.5})).unwrap_err();
        assert!(err.to_string().contains("workers must be a non-negative integer"));
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let err = validate_request(&json!({"input_path": "/tmp/x.png", "preset": "poster"}))
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnknownPreset { .. }));
    }

    #[test]
    fn test_validate_path_existing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("image.png");
        std::fs::write(&file, b"data").unwrap();

        let resolved = validate_path(&file, true).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, file.canonicalize().unwrap());
    }

    #[test]
    fn test_validate_path_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope").join("..").join("out").join("deeper");

        let err = validate_path(&missing, true).unwrap_err();
        assert!(err.to_string().contains("Path does not exist"));

        let resolved = validate_path(&missing, false).unwrap();
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("out").join("deeper")
        );
    }

    #[test]
    fn test_file_size_limit() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("big.bin");
        std::fs::write(&file, vec![0u8; 2 * 1024 * 1024]).unwrap();

        assert!(validate_file_size(&file, 2).is_ok());
        let err = validate_file_size(&file, 1).unwrap_err();
        assert!(err.to_string().contains("File too large: 2.00MB (max: 1MB)"));

        assert!(validate_file_size(&dir.path().join("missing.png"), 1).is_ok());
    }

    #[test]
    fn test_dimension_limit() {
        assert!(validate_dimensions(10_000, 10_000, 10_000).is_ok());
        let err = validate_dimensions(10_001, 5, 10_000).unwrap_err();
        assert!(err.to_string().contains("Image dimensions too large: 10001x5 (max: 10000)"));
        assert!(validate_dimensions(5, 10_001, 10_000).is_err());
    }
}

// image-convert/src/utils/mod.rs
use crate::core::{ConvertError, Result, TargetFormat, SUPPORTED_EXTENSIONS};
use std::path::{Path, PathBuf};

/// `<output_dir>/<input stem>.<target extension>`.
pub fn output_path(input_path: &Path, output_dir: &Path, target: TargetFormat) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            ConvertError::InvalidParameter(format!(
                "Invalid file name: {}",
                input_path.display()
            ))
        })?;

    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(target.extension());

    Ok(output_dir.join(file_name))
}

/// Human readable size: bytes below 1 KiB, one decimal in KB, two in MB.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

/// Case-insensitive extension check against the batch allow-list.
pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

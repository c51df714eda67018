// image-convert/src/stats.rs
//! Size comparisons between an input file and its converted outputs.

use crate::core::{ConvertError, Result, TargetFormat};
use crate::utils::format_size;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Savings {
    pub original_size: String,
    pub new_size: String,
    pub saved_bytes: String,
    pub savings_percent: String,
    pub compression_ratio: String,
    /// The output is larger than the input.
    pub increased: bool,
}

pub fn calculate_savings(original_size: u64, new_size: u64) -> Savings {
    let saved = original_size as i128 - new_size as i128;

    let (percent, ratio) = if original_size > 0 {
        let percent = saved as f64 / original_size as f64 * 100.0;
        let ratio = if new_size > 0 {
            format!("{:.1}:1", original_size as f64 / new_size as f64)
        } else {
            "∞:1".to_string()
        };
        (percent, ratio)
    } else {
        (0.0, "1.0:1".to_string())
    };

    Savings {
        original_size: format_size(original_size),
        new_size: format_size(new_size),
        saved_bytes: format_size(original_size.abs_diff(new_size)),
        savings_percent: format!("{:.1}%", percent),
        compression_ratio: ratio,
        increased: saved < 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub savings: Savings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub input: PathBuf,
    pub input_size: String,
    pub input_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp: Option<FormatStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avif: Option<FormatStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_format: Option<TargetFormat>,
}

impl ConversionStats {
    /// Builds stats from already known sizes; touches no files.
    pub fn from_sizes(
        input: &Path,
        input_size: u64,
        webp: Option<(PathBuf, u64)>,
        avif: Option<(PathBuf, u64)>,
    ) -> Self {
        let best_format = match (&webp, &avif) {
            (Some((_, webp_size)), Some((_, avif_size))) => {
                if avif_size < webp_size {
                    Some(TargetFormat::Avif)
                } else {
                    Some(TargetFormat::Webp)
                }
            }
            (Some(_), None) => Some(TargetFormat::Webp),
            (None, Some(_)) => Some(TargetFormat::Avif),
            (None, None) => None,
        };

        let describe = |(path, size): (PathBuf, u64)| FormatStats {
            savings: calculate_savings(input_size, size),
            path,
            size_bytes: size,
        };

        Self {
            input: input.to_path_buf(),
            input_size: format_size(input_size),
            input_size_bytes: input_size,
            webp: webp.map(describe),
            avif: avif.map(describe),
            best_format,
        }
    }

    /// Reads sizes from disk. Outputs that do not exist are left out.
    pub fn collect(input: &Path, webp: Option<&Path>, avif: Option<&Path>) -> Result<Self> {
        let input_size = std::fs::metadata(input)
            .map_err(|source| ConvertError::UnreadableInput {
                path: input.to_path_buf(),
                source,
            })?
            .len();

        let sized = |path: Option<&Path>| {
            path.and_then(|p| {
                std::fs::metadata(p)
                    .ok()
                    .map(|metadata| (p.to_path_buf(), metadata.len()))
            })
        };

        Ok(Self::from_sizes(input, input_size, sized(webp), sized(avif)))
    }

    pub fn output(&self, target: TargetFormat) -> Option<&FormatStats> {
        match target {
            TargetFormat::Webp => self.webp.as_ref(),
            TargetFormat::Avif => self.avif.as_ref(),
        }
    }
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compression Statistics")?;
        write!(f, "   Input: {}", self.input_size)?;

        for target in [TargetFormat::Webp, TargetFormat::Avif] {
            if let Some(stats) = self.output(target) {
                let trend = if stats.savings.increased { "larger" } else { "smaller" };
                write!(
                    f,
                    "\n   {}: {} ({} saved, {}, {})",
                    target.label(),
                    stats.savings.new_size,
                    stats.savings.savings_percent,
                    stats.savings.compression_ratio,
                    trend
                )?;
            }
        }

        if let Some(best) = self.best_format {
            write!(f, "\n   Best: {}", best.label().to_uppercase())?;
        }

        Ok(())
    }
}

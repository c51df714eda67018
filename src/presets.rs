// image-convert/src/presets.rs
//! Named parameter bundles for common conversion targets.

use crate::core::{ConvertError, ConvertOptions, OutputFormat, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresetConfig {
    pub format: OutputFormat,
    pub webp_quality: u8,
    pub avif_quality: u8,
    pub lossless: bool,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

struct Preset {
    name: &'static str,
    description: &'static str,
    config: PresetConfig,
}

const PRESETS: [Preset; 8] = [
    Preset {
        name: "web",
        description: "Optimized for web pages (WebP, quality 80, max 1920px wide)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 80,
            avif_quality: 50,
            lossless: false,
            max_width: Some(1920),
            max_height: None,
        },
    },
    Preset {
        name: "thumbnail",
        description: "Small thumbnails (WebP, quality 70, max 300x300)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 70,
            avif_quality: 50,
            lossless: false,
            max_width: Some(300),
            max_height: Some(300),
        },
    },
    Preset {
        name: "social",
        description: "Social media images (WebP, quality 85, 1200x630)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 85,
            avif_quality: 50,
            lossless: false,
            max_width: Some(1200),
            max_height: Some(630),
        },
    },
    Preset {
        name: "hd",
        description: "HD resolution (WebP, quality 90, 1920x1080)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 90,
            avif_quality: 80,
            lossless: false,
            max_width: Some(1920),
            max_height: Some(1080),
        },
    },
    Preset {
        name: "4k",
        description: "4K resolution (WebP, quality 90, 3840x2160)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 90,
            avif_quality: 80,
            lossless: false,
            max_width: Some(3840),
            max_height: Some(2160),
        },
    },
    Preset {
        name: "archive",
        description: "High quality archival (Both formats, quality 95/90)",
        config: PresetConfig {
            format: OutputFormat::Both,
            webp_quality: 95,
            avif_quality: 90,
            lossless: false,
            max_width: None,
            max_height: None,
        },
    },
    Preset {
        name: "lossless",
        description: "Lossless WebP compression (no quality loss)",
        config: PresetConfig {
            format: OutputFormat::Webp,
            webp_quality: 100,
            avif_quality: 100,
            lossless: true,
            max_width: None,
            max_height: None,
        },
    },
    Preset {
        name: "max-compression",
        description: "Maximum file size reduction (AVIF, quality 40)",
        config: PresetConfig {
            format: OutputFormat::Avif,
            webp_quality: 50,
            avif_quality: 40,
            lossless: false,
            max_width: None,
            max_height: None,
        },
    },
];

/// Returns an owned copy of the named preset.
pub fn get_preset(name: &str) -> Result<PresetConfig> {
    PRESETS
        .iter()
        .find(|preset| preset.name == name)
        .map(|preset| preset.config)
        .ok_or_else(|| ConvertError::UnknownPreset {
            name: name.to_string(),
            available: preset_names().join(", "),
        })
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|preset| preset.name).collect()
}

/// `(name, description)` pairs in table order.
pub fn list_presets() -> Vec<(&'static str, &'static str)> {
    PRESETS
        .iter()
        .map(|preset| (preset.name, preset.description))
        .collect()
}

impl PresetConfig {
    /// Overlays every preset field onto `options`.
    pub fn apply_to(&self, mut options: ConvertOptions) -> ConvertOptions {
        options.format = self.format;
        options.webp_quality = self.webp_quality;
        options.avif_quality = self.avif_quality;
        options.lossless = self.lossless;
        options.max_width = self.max_width;
        options.max_height = self.max_height;
        options
    }
}

/// Defaults, then the named preset, then the single quality override.
pub fn apply_preset(
    defaults: ConvertOptions,
    preset: Option<&str>,
    quality: Option<u8>,
) -> Result<ConvertOptions> {
    let mut options = match preset {
        Some(name) => get_preset(name)?.apply_to(defaults),
        None => defaults,
    };

    if let Some(quality) = quality {
        options = options.with_quality(quality);
    }

    Ok(options)
}

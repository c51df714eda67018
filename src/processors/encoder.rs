// image-convert/src/processors/encoder.rs
use crate::core::{ConvertError, Result, TargetFormat};
use image::codecs::avif::AvifEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::path::Path;

/// AVIF encoder speed: 0 is slowest/best, 10 fastest.
pub const DEFAULT_AVIF_SPEED: u8 = 4;

pub struct Encoder {
    avif_speed: u8,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            avif_speed: DEFAULT_AVIF_SPEED,
        }
    }

    pub fn with_avif_speed(mut self, speed: u8) -> Self {
        self.avif_speed = speed.min(10);
        self
    }

    /// Encodes and writes `path`, replacing any existing file.
    pub fn save(
        &self,
        image: &RgbaImage,
        path: &Path,
        target: TargetFormat,
        quality: u8,
        lossless: bool,
    ) -> Result<()> {
        log::debug!(
            "Encoding {} to {} (quality: {}, lossless: {})",
            target.label(),
            path.display(),
            quality,
            lossless
        );

        let bytes = match target {
            TargetFormat::Webp => self.encode_webp(image, quality, lossless)?,
            TargetFormat::Avif => self.encode_avif(image, quality)?,
        };

        std::fs::write(path, bytes)?;
        self.log_save_result(path, target)
    }

    pub fn encode_webp(&self, image: &RgbaImage, quality: u8, lossless: bool) -> Result<Vec<u8>> {
        let encoder = webp::Encoder::from_rgba(image.as_raw(), image.width(), image.height());
        let memory = encoder
            .encode_simple(lossless, f32::from(quality.clamp(1, 100)))
            .map_err(|e| ConvertError::Encode(format!("WebP encoding failed: {:?}", e)))?;

        Ok(memory.to_vec())
    }

    /// AVIF has no lossless mode here; `lossless` only applies to WebP.
    pub fn encode_avif(&self, image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        AvifEncoder::new_with_speed_quality(&mut buffer, self.avif_speed, quality.clamp(1, 100))
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )?;

        Ok(buffer)
    }

    fn log_save_result(&self, path: &Path, target: TargetFormat) -> Result<()> {
        let file_size = std::fs::metadata(path)?.len();
        log::info!(
            "Created {}: {} ({} bytes)",
            target.label(),
            path.display(),
            file_size
        );
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

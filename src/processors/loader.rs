// image-convert/src/processors/loader.rs
use crate::core::validation::{validate_dimensions, validate_file_size};
use crate::core::{ConvertError, Result, MAX_DIMENSION, MAX_FILE_SIZE_MB};
use image::{ImageReader, Limits, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Widest decoded pixel the `image` crate produces (RGBA, f32 per channel).
const MAX_BYTES_PER_PIXEL: u64 = 16;
/// Floor for decoder scratch buffers when the dimension cap is small.
const MIN_DECODE_ALLOC: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Loader {
    max_file_size_mb: u64,
    max_dimension: u32,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_file_size_mb: MAX_FILE_SIZE_MB,
            max_dimension: MAX_DIMENSION,
        }
    }

    pub fn with_limits(mut self, max_file_size_mb: u64, max_dimension: u32) -> Self {
        self.max_file_size_mb = max_file_size_mb;
        self.max_dimension = max_dimension;
        self
    }

    /// Decodes `path` (format sniffed from content) into RGBA8.
    ///
    /// Dimensions are read from the header and checked before any pixel
    /// data is decoded.
    pub fn load(&self, path: &Path) -> Result<RgbaImage> {
        log::info!("Loading image: {}", path.display());

        self.validate_path(path)?;
        validate_file_size(path, self.max_file_size_mb)?;

        let (width, height) = open_reader(path)?.into_dimensions()?;
        validate_dimensions(width, height, self.max_dimension)?;

        let mut reader = open_reader(path)?;
        reader.limits(self.decode_limits());
        let image = reader.decode()?;

        log::debug!(
            "Decoded {}: {}x{} pixels, color: {:?}",
            path.display(),
            width,
            height,
            image.color()
        );

        Ok(image.into_rgba8())
    }

    /// Decoder limits sized to the dimension cap: room for a full-size
    /// 32-bit float RGBA buffer.
    fn decode_limits(&self) -> Limits {
        let side = u64::from(self.max_dimension);
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some((side * side * MAX_BYTES_PER_PIXEL).max(MIN_DECODE_ALLOC));
        limits
    }

    fn validate_path(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(ConvertError::Path(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let metadata = path.metadata()?;
        if metadata.len() == 0 {
            return Err(ConvertError::InvalidParameter(format!(
                "File is empty: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>> {
    Ok(ImageReader::open(path)?.with_guessed_format()?)
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

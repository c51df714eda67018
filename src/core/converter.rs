// image-convert/src/core/converter.rs
use super::{ConversionResult, ConvertError, ConvertOptions, Result, TargetFormat};
use crate::processors::{Encoder, Loader, Resizer};
use crate::utils::output_path;
use std::path::{Path, PathBuf};

/// Load, resize and encode pipeline for one image.
pub struct Converter {
    options: ConvertOptions,
    loader: Loader,
    resizer: Resizer,
    encoder: Encoder,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            loader: Loader::new(),
            resizer: Resizer::default(),
            encoder: Encoder::new(),
        }
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Converts `image_path` into `output_dir`.
    ///
    /// Every failure comes back as [`ConvertError::ConversionFailed`] naming
    /// the input. Outputs written before a failure stay on disk.
    pub fn convert(&self, image_path: &Path, output_dir: &Path) -> Result<ConversionResult> {
        self.convert_inner(image_path, output_dir)
            .map_err(|e| ConvertError::conversion_failed(image_path, e))
    }

    fn convert_inner(&self, image_path: &Path, output_dir: &Path) -> Result<ConversionResult> {
        self.options.validate()?;

        let image = self.loader.load(image_path)?;
        let image = self
            .resizer
            .fit_within(image, self.options.max_width, self.options.max_height);

        let mut webp: Option<PathBuf> = None;
        let mut avif: Option<PathBuf> = None;

        for &target in self.options.format.targets() {
            let path = output_path(image_path, output_dir, target)?;
            let quality = match target {
                TargetFormat::Webp => self.options.webp_quality,
                TargetFormat::Avif => self.options.avif_quality,
            };

            self.encoder
                .save(&image, &path, target, quality, self.options.lossless)?;

            match target {
                TargetFormat::Webp => webp = Some(path),
                TargetFormat::Avif => avif = Some(path),
            }
        }

        Ok(ConversionResult::Converted {
            input: image_path.to_path_buf(),
            webp,
            avif,
        })
    }
}

/// Converts one image with `options`; see [`Converter::convert`].
pub fn convert_one(
    image_path: &Path,
    output_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConversionResult> {
    Converter::new(*options).convert(image_path, output_dir)
}

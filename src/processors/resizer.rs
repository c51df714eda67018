// image-convert/src/processors/resizer.rs
use image::{imageops, imageops::FilterType, RgbaImage};

/// Downscales into a bounding box, preserving aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resizer {
    filter: FilterType,
}

impl Resizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Shrinks `image` so it fits `max_width` x `max_height`. Never enlarges.
    pub fn fit_within(
        &self,
        image: RgbaImage,
        max_width: Option<u32>,
        max_height: Option<u32>,
    ) -> RgbaImage {
        let (orig_width, orig_height) = image.dimensions();
        let (width, height) = Self::target_dimensions(orig_width, orig_height, max_width, max_height);

        if (width, height) == (orig_width, orig_height) {
            log::debug!("Image dimensions unchanged, skipping resize");
            return image;
        }

        log::info!(
            "Resized image from {}x{} to {}x{}",
            orig_width,
            orig_height,
            width,
            height
        );

        imageops::resize(&image, width, height, self.filter)
    }

    /// Dimensions after scaling by one factor so both sides fit the box.
    ///
    /// A missing (or zero) limit leaves that axis unconstrained. The factor
    /// is clamped to 1, so small images are returned unchanged.
    pub fn target_dimensions(
        orig_width: u32,
        orig_height: u32,
        max_width: Option<u32>,
        max_height: Option<u32>,
    ) -> (u32, u32) {
        let max_width = max_width.filter(|w| *w > 0);
        let max_height = max_height.filter(|h| *h > 0);

        if (max_width.is_none() && max_height.is_none()) || orig_width == 0 || orig_height == 0 {
            return (orig_width, orig_height);
        }

        let box_width = max_width.unwrap_or(orig_width) as f64;
        let box_height = max_height.unwrap_or(orig_height) as f64;

        let ratio = (box_width / orig_width as f64).min(box_height / orig_height as f64);
        if ratio >= 1.0 {
            return (orig_width, orig_height);
        }

        let new_width = (orig_width as f64 * ratio).round() as u32;
        let new_height = (orig_height as f64 * ratio).round() as u32;

        (new_width.max(1), new_height.max(1))
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new(FilterType::Lanczos3)
    }
}

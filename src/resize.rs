//! # Image Resize Module
//!
//! Ridimensionamento in memoria prima dell'encoding.
//!
//! ## Caratteristiche
//! - **Shrink only**: le immagini più piccole del box non vengono mai ingrandite
//! - **Aspect ratio preservato**: fit all'interno di `max_width x max_height`
//! - **Filtro**: Lanczos3, migliore qualità per downscaling
//!
//! ## Esempio
//! ```text
//! 4000x3000, box 1200x630  →  840x630
//! 800x600,   box 1200x630  →  800x600 (invariato)
//! ```

use crate::config::ResizeSettings;
use crate::encoder::ImageDimensions;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Target dimensions for a shrink-only, aspect-preserving fit.
///
/// Returns the input unchanged when resizing is disabled or the image already fits.
pub fn fit_dimensions(source: ImageDimensions, resize: &ResizeSettings) -> ImageDimensions {
    let ImageDimensions { width, height } = source;

    if !resize.enabled
        || resize.max_width == 0
        || resize.max_height == 0
        || (width <= resize.max_width && height <= resize.max_height)
    {
        return source;
    }

    let ratio = f64::min(
        resize.max_width as f64 / width as f64,
        resize.max_height as f64 / height as f64,
    );

    ImageDimensions {
        width: ((width as f64 * ratio).round() as u32).max(1),
        height: ((height as f64 * ratio).round() as u32).max(1),
    }
}

/// Apply the resize box to a decoded image
pub fn apply(image: DynamicImage, resize: &ResizeSettings) -> DynamicImage {
    let source = ImageDimensions::from(&image);
    let target = fit_dimensions(source, resize);

    if target == source {
        return image;
    }

    debug!(
        "Resizing {}x{} -> {}x{}",
        source.width, source.height, target.width, target.height
    );
    image.resize_exact(target.width, target.height, FilterType::Lanczos3)
}

//! # Encoder Capability Module
//!
//! Primitiva di encoding trattata come capability opaca: un'immagine decodificata
//! più una qualità producono un buffer di byte.
//!
//! ## Responsabilità:
//! - Definisce il trait `Encoder` usato dalla ricerca della qualità
//! - Fornisce `JpegEncoder`, implementazione lossy basata sul crate `image`
//! - Fornisce `decode_metadata()` per leggere le dimensioni senza decodificare i pixel
//!
//! ## Contratto:
//! Per un'immagine fissata la dimensione dell'output è non decrescente nella qualità.
//! La ricerca binaria in `quality_search` si basa su questa monotonia.

use crate::error::{ConvertError, Result};
use image::{DynamicImage, GenericImageView};
use std::ops::RangeInclusive;
use std::path::Path;

/// Stateless lossy encoder: `encode(image, quality) -> bytes`
pub trait Encoder: Send + Sync {
    /// Encode `image` at `quality` (0-100)
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>>;

    /// File extension for the produced format, without the dot
    fn extension(&self) -> &'static str;

    /// Qualities the codec actually honours. The search never reports a value outside it.
    fn quality_range(&self) -> RangeInclusive<u8> {
        0..=100
    }

    /// Adapt a freshly decoded image to what the codec accepts.
    /// Called once per task, before the search.
    fn prepare(&self, image: DynamicImage) -> DynamicImage {
        image
    }
}

/// Lossy JPEG encoder backed by `image::codecs::jpeg`
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl Encoder for JpegEncoder {
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // The codec rejects 0 and anything above 100
        let quality = quality.clamp(1, 100);
        let mut buffer = Vec::new();

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        match image {
            DynamicImage::ImageRgb8(rgb) => encoder.encode_image(rgb),
            DynamicImage::ImageLuma8(luma) => encoder.encode_image(luma),
            other => encoder.encode_image(&other.to_rgb8()),
        }
        .map_err(|e| ConvertError::Encode(e.to_string()))?;

        Ok(buffer)
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn quality_range(&self) -> RangeInclusive<u8> {
        1..=100
    }

    fn prepare(&self, image: DynamicImage) -> DynamicImage {
        // JPEG has no alpha channel: flatten once instead of on every attempt
        match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }
}

/// Dimensions of an image on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl From<&DynamicImage> for ImageDimensions {
    fn from(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

/// Read width/height from the file header only
pub fn decode_metadata(path: &Path) -> Result<ImageDimensions> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| ConvertError::Decode(format!("{}: {}", path.display(), e)))?;
    Ok(ImageDimensions { width, height })
}

/// Decode a full image from disk
pub fn decode(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| ConvertError::Decode(format!("{}: {}", path.display(), e)))
}

/// Size of an encoded buffer in KB
pub fn size_kb(bytes: &[u8]) -> f64 {
    bytes.len() as f64 / 1024.0
}

//! Image decoding and encoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces RGBA
//! buffers with any embedded orientation metadata already applied, so
//! pixel data matches visual orientation everywhere downstream.
//!
//! This is the first step in the pipeline: raw bytes in, `RgbaImage` out.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, metadata::Orientation};

use crate::types::{FitError, RgbaImage};

/// Decode raw image bytes into an RGBA buffer.
///
/// JPEG EXIF orientation tags (2–8) are applied to the pixel data
/// during decode, so a phone photo taken sideways arrives upright.
/// Formats without orientation metadata pass through unchanged.
///
/// # Errors
///
/// Returns [`FitError::EmptyInput`] if `bytes` is empty.
/// Returns [`FitError::InvalidImage`] if the format is unrecognized or
/// the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, FitError> {
    if bytes.is_empty() {
        return Err(FitError::EmptyInput);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img.to_rgba8())
}

/// Encode an RGBA buffer as PNG bytes.
///
/// PNG is the pipeline's interchange format: it is lossless and carries
/// the alpha channel the masking contract depends on.
///
/// # Errors
///
/// Returns [`FitError::InvalidImage`] if encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, FitError> {
    let mut bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Encode a single-channel buffer (mask or alpha plane) as PNG bytes.
///
/// # Errors
///
/// Returns [`FitError::InvalidImage`] if encoding fails.
pub fn encode_gray_png(image: &image::GrayImage) -> Result<Vec<u8>, FitError> {
    let mut bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(bytes)
}

/// Whether the buffer carries any transparency at all.
///
/// Used to decide whether a garment image still needs background
/// removal before alpha-derived masking or placement.
#[must_use]
pub fn has_alpha(image: &RgbaImage) -> bool {
    image.pixels().any(|p| p.0[3] < u8::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_rgba(&[]), Err(FitError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_return_invalid_image() {
        assert!(matches!(
            decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]),
            Err(FitError::InvalidImage(_)),
        ));
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let img = RgbaImage::from_fn(5, 3, |x, y| {
            image::Rgba([x as u8 * 40, y as u8 * 80, 7, 200])
        });
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        assert_eq!(img, decoded);
    }

    #[test]
    fn decoded_dimensions_match_input() {
        let img = RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 31);
    }

    #[test]
    fn gray_png_round_trips_through_rgba() {
        let gray = image::GrayImage::from_fn(4, 4, |x, _| image::Luma([x as u8 * 60]));
        let bytes = encode_gray_png(&gray).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        for (x, y, p) in decoded.enumerate_pixels() {
            assert_eq!(p.0[0], gray.get_pixel(x, y).0[0]);
            assert_eq!(p.0[3], 255);
        }
    }

    #[test]
    fn has_alpha_detects_transparency() {
        let opaque = RgbaImage::from_fn(4, 4, |_, _| image::Rgba([1, 2, 3, 255]));
        assert!(!has_alpha(&opaque));

        let mut cutout = opaque;
        cutout.put_pixel(0, 0, image::Rgba([1, 2, 3, 0]));
        assert!(has_alpha(&cutout));
    }
}

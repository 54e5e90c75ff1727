//! Garment cutout standardization.
//!
//! Background-removed garment art arrives at arbitrary sizes with the
//! subject floating somewhere in a transparent field. This stage crops
//! to the alpha bounding box, adds proportional padding, and centers
//! the result on a fixed transparent square canvas, so every cutout
//! entering placement has comparable framing.
//!
//! Oversized inputs are scaled down before the bounding-box scan to
//! bound memory on phone-camera originals.

use image::imageops::{self, FilterType};

use crate::types::{FitError, RgbaImage};

/// Default output canvas side in pixels.
pub const DEFAULT_CANVAS_SIDE: u32 = 1024;

/// Default padding around the subject, as a fraction of the larger
/// bounding-box side.
pub const DEFAULT_PADDING_RATIO: f64 = 0.08;

/// Default alpha threshold: pixels at or above this count as subject.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 8;

/// Inputs larger than this on either side are scaled down first.
const MAX_WORKING_DIMENSION: u32 = 4000;

/// Crop a transparent cutout to its subject, pad, and center it on a
/// transparent square canvas of `canvas_side` pixels.
///
/// # Errors
///
/// Returns [`FitError::DimensionError`] when `canvas_side` is zero.
/// Returns [`FitError::MaskDerivationFailed`] when no pixel reaches
/// `alpha_threshold` (the cutout is effectively empty).
pub fn flatten_cutout(
    cutout: &RgbaImage,
    canvas_side: u32,
    padding_ratio: f64,
    alpha_threshold: u8,
) -> Result<RgbaImage, FitError> {
    if canvas_side == 0 {
        return Err(FitError::DimensionError {
            stage: "flatten",
            width: canvas_side,
            height: canvas_side,
        });
    }

    let working = shrink_oversized(cutout);

    let Some((min_x, min_y, max_x, max_y)) = alpha_bounding_box(&working, alpha_threshold)
    else {
        return Err(FitError::MaskDerivationFailed {
            stage: "flatten",
            reason: "no subject found (alpha is below threshold everywhere)".to_owned(),
        });
    };

    let box_w = max_x - min_x + 1;
    let box_h = max_y - min_y + 1;
    let subject = imageops::crop_imm(&working, min_x, min_y, box_w, box_h).to_image();

    // Proportional padding, at least one pixel.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pad = ((f64::from(box_w.max(box_h)) * padding_ratio).round() as u32).max(1);
    let padded_w = box_w + 2 * pad;
    let padded_h = box_h + 2 * pad;

    // Contain the padded box within the square canvas, preserving
    // aspect, then center it.
    let scale = (f64::from(canvas_side) / f64::from(padded_w))
        .min(f64::from(canvas_side) / f64::from(padded_h));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled_w = ((f64::from(subject.width()) * scale).round() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled_h = ((f64::from(subject.height()) * scale).round() as u32).max(1);
    let scaled = imageops::resize(&subject, scaled_w, scaled_h, FilterType::Triangle);

    let mut canvas = RgbaImage::new(canvas_side, canvas_side);
    let offset_x = i64::from((canvas_side - scaled_w.min(canvas_side)) / 2);
    let offset_y = i64::from((canvas_side - scaled_h.min(canvas_side)) / 2);
    imageops::overlay(&mut canvas, &scaled, offset_x, offset_y);
    Ok(canvas)
}

/// Scale an image down so neither side exceeds the working maximum.
fn shrink_oversized(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w <= MAX_WORKING_DIMENSION && h <= MAX_WORKING_DIMENSION {
        return image.clone();
    }
    let scale = (f64::from(MAX_WORKING_DIMENSION) / f64::from(w))
        .min(f64::from(MAX_WORKING_DIMENSION) / f64::from(h));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nw = ((f64::from(w) * scale).floor() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nh = ((f64::from(h) * scale).floor() as u32).max(1);
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

/// Inclusive bounding box of pixels whose alpha reaches the threshold.
fn alpha_bounding_box(image: &RgbaImage, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[3] >= threshold {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
    }
    bounds
}

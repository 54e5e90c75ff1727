//! Editable-region mask construction.
//!
//! A mask is a single-channel buffer over the canonical canvas where
//! each pixel is either **editable** (0) or **protected** (255). The
//! external edit service contract requires a strictly binary mask, so
//! both construction modes end with a binarization pass; softness at
//! the boundary is reintroduced later, at blend time, via
//! [`feathered_alpha`].
//!
//! Two construction modes:
//!
//! 1. [`garment_box_mask`] -- a proportional centered rectangle covering
//!    chest/torso plus sleeve margins, used when no prior segmentation
//!    exists.
//! 2. [`alpha_mask`] -- derive the editable region from an existing
//!    cutout's alpha silhouette.

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::types::{BoxProportions, CanvasSize, FitError, RgbaImage};

/// Mask pixel value for the editable region.
pub const EDITABLE: u8 = 0;

/// Mask pixel value for the protected region.
pub const PROTECTED: u8 = 255;

/// Threshold used when re-binarizing a blurred plane: anything above
/// ~4% of the channel maximum counts as set.
const BINARIZE_THRESHOLD: u8 = 10;

/// Build the heuristic garment-box mask: a centered rectangular region
/// marked editable, everything else protected.
///
/// Offsets are proportional, not fixed pixels, so the box tracks any
/// canvas size. The returned mask is strictly binary.
#[must_use = "returns the constructed mask"]
pub fn garment_box_mask(canvas: CanvasSize, frame: &BoxProportions) -> GrayImage {
    let x0 = canvas.w() * frame.left;
    let y0 = canvas.h() * frame.top;
    let x1 = x0 + canvas.w() * frame.width;
    let y1 = y0 + canvas.h() * frame.height;

    GrayImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let (fx, fy) = (f64::from(x), f64::from(y));
        if fx >= x0 && fx < x1 && fy >= y0 && fy < y1 {
            image::Luma([EDITABLE])
        } else {
            image::Luma([PROTECTED])
        }
    })
}

/// Derive a mask from a cutout's alpha channel: the subject silhouette
/// becomes the editable region.
///
/// The alpha plane is thresholded, feathered to smooth ragged
/// segmentation edges, then re-binarized so the result handed to an
/// external service contains no partial values.
///
/// # Errors
///
/// Returns [`FitError::MaskDerivationFailed`] when the cutout carries
/// no usable silhouette: fully transparent (nothing above `threshold`)
/// or fully opaque (no background was ever removed).
pub fn alpha_mask(
    cutout: &RgbaImage,
    threshold: u8,
    feather_px: f32,
) -> Result<GrayImage, FitError> {
    let mut any_subject = false;
    let mut any_background = false;
    let silhouette = GrayImage::from_fn(cutout.width(), cutout.height(), |x, y| {
        let alpha = cutout.get_pixel(x, y).0[3];
        if alpha >= threshold {
            any_subject = true;
            image::Luma([255])
        } else {
            any_background = true;
            image::Luma([0])
        }
    });

    if !any_subject {
        return Err(FitError::MaskDerivationFailed {
            stage: "alpha_mask",
            reason: "cutout is fully transparent".to_owned(),
        });
    }
    if !any_background {
        return Err(FitError::MaskDerivationFailed {
            stage: "alpha_mask",
            reason: "cutout has no alpha silhouette (fully opaque)".to_owned(),
        });
    }

    let feathered = blur_plane(&silhouette, feather_px);

    // Silhouette (255) -> editable (0), background -> protected (255).
    Ok(GrayImage::from_fn(
        feathered.width(),
        feathered.height(),
        |x, y| {
            if feathered.get_pixel(x, y).0[0] > BINARIZE_THRESHOLD {
                image::Luma([EDITABLE])
            } else {
                image::Luma([PROTECTED])
            }
        },
    ))
}

/// Turn a binary mask into the feathered alpha plane used at blend time.
///
/// Editable pixels become opaque alpha (the edited layer shows through),
/// protected pixels become zero alpha, and a Gaussian blur softens the
/// boundary into a band of roughly `feather_px` pixels. Outside that
/// band the plane is exactly 0 or 255, which is what makes the guard's
/// identity invariant provable.
#[must_use = "returns the feathered alpha plane"]
pub fn feathered_alpha(mask: &GrayImage, feather_px: f32) -> GrayImage {
    let inverted = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        // Editable (0) -> 255, protected (255) -> 0; binarize in the
        // same pass in case the caller handed us a non-binary plane.
        if mask.get_pixel(x, y).0[0] <= BINARIZE_THRESHOLD {
            image::Luma([255])
        } else {
            image::Luma([0])
        }
    });

    blur_plane(&inverted, feather_px)
}

/// Whether a plane contains only fully-set or fully-clear pixels.
///
/// This is the invariant required of every mask before it crosses the
/// external service boundary.
#[must_use]
pub fn is_binary(plane: &GrayImage) -> bool {
    plane
        .pixels()
        .all(|p| p.0[0] == EDITABLE || p.0[0] == PROTECTED)
}

/// Gaussian blur with the feather width expressed in pixels.
///
/// The sigma is `px / 3`, so ~3 standard deviations (where the kernel
/// tail becomes negligible) land at the requested pixel width.
/// Non-positive feather widths return the plane unchanged, since the
/// underlying filter panics on `sigma <= 0`.
fn blur_plane(plane: &GrayImage, feather_px: f32) -> GrayImage {
    if feather_px <= 0.0 {
        return plane.clone();
    }
    gaussian_blur_f32(plane, feather_px / 3.0)
}

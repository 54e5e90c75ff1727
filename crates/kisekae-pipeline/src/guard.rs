//! Mask-guarded reconciliation of externally edited images.
//!
//! An external edit service is trusted to synthesize pixels, never to
//! decide *where*. This stage reconstructs the final image so that
//! every pixel outside the mask's editable region is provably -- bit for
//! bit -- the original photo, no matter what the service returned:
//!
//! 1. re-normalize the returned image to the canonical canvas (the
//!    service may exercise its right to return different-but-comparable
//!    dimensions under "auto" sizing);
//! 2. derive a feathered alpha plane from the mask (editable → opaque,
//!    protected → clear, a few blurred pixels at the boundary);
//! 3. apply that plane to the edited layer;
//! 4. alpha-over the result onto the original.
//!
//! The blend is written per pixel with exact-copy branches at alpha 0
//! and 255: outside the feather band the output bytes are copied from
//! the original (or the edited layer) verbatim, so the identity
//! invariant does not depend on rounding behavior.

use image::GrayImage;

use crate::mask;
use crate::normalize;
use crate::types::{CanvasSize, FitError, RgbaImage};

/// Reconcile an externally edited image with the original under a mask.
///
/// `original` must already be on the canonical canvas; `mask` must
/// match it. `edited` may arrive at any size and is re-normalized
/// (fill, no crop) before blending. `feather_px` controls the width of
/// the boundary band where blending is permitted -- the only region
/// where exactness is intentionally relaxed.
///
/// # Errors
///
/// Returns [`FitError::CanvasMismatch`] when the mask does not share
/// the original's canvas.
pub fn reconcile(
    original: &RgbaImage,
    mask: &GrayImage,
    edited: &RgbaImage,
    feather_px: f32,
) -> Result<RgbaImage, FitError> {
    if mask.dimensions() != original.dimensions() {
        return Err(FitError::CanvasMismatch {
            stage: "guard",
            actual: mask.dimensions(),
            expected: original.dimensions(),
        });
    }
    let canvas = CanvasSize::new(original.width(), original.height())?;

    let aligned = normalize::fill_to(edited, canvas);
    let alpha = mask::feathered_alpha(mask, feather_px);

    Ok(blend_over(original, &aligned, &alpha))
}

/// Alpha-over blend of `patch` onto `base` using an external alpha
/// plane, with exact-copy fast paths.
///
/// All three buffers must share dimensions (callers in this module
/// guarantee it).
fn blend_over(base: &RgbaImage, patch: &RgbaImage, alpha: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(base.width(), base.height(), |x, y| {
        let a = alpha.get_pixel(x, y).0[0];
        match a {
            0 => *base.get_pixel(x, y),
            255 => {
                let p = patch.get_pixel(x, y).0;
                image::Rgba([p[0], p[1], p[2], 255])
            }
            _ => {
                let b = base.get_pixel(x, y).0;
                let p = patch.get_pixel(x, y).0;
                let t = f32::from(a) / 255.0;
                let mix = |pc: u8, bc: u8| -> u8 {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let v = f32::from(pc)
                        .mul_add(t, f32::from(bc) * (1.0 - t))
                        .round() as i32;
                    u8::try_from(v.clamp(0, 255)).unwrap_or(u8::MAX)
                };
                image::Rgba([mix(p[0], b[0]), mix(p[1], b[1]), mix(p[2], b[2]), b[3]])
            }
        }
    })
}

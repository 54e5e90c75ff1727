//! Normalization onto the canonical canvas.
//!
//! Every cross-image operation in the pipeline (masking, placement,
//! guarded reconciliation) requires identical pixel grids, so all
//! person, garment-board, and mask buffers are stretched to one
//! canonical size before anything else happens.
//!
//! The resize uses a *fill* policy: the image is stretched or squeezed
//! to exactly the target dimensions without cropping. Extreme aspect
//! mismatches distort geometry, but no content is lost -- cropping would
//! break the pixel-identity guarantee for the original-photo region
//! that the guard stage enforces later.

use image::imageops::{self, FilterType};

use crate::types::{CanvasSize, RgbaImage};

/// Stretch an image to exactly the canonical canvas size (fill, no crop).
///
/// An input that already matches the target is returned as an exact
/// pixel copy: resampling is skipped entirely so normalization is
/// idempotent down to the bit.
#[must_use = "returns the normalized image"]
pub fn fill_to(image: &RgbaImage, target: CanvasSize) -> RgbaImage {
    if image.width() == target.width() && image.height() == target.height() {
        return image.clone();
    }

    imageops::resize(image, target.width(), target.height(), FilterType::Triangle)
}

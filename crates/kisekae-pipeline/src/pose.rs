//! Proportional pose estimation.
//!
//! Derives named anatomical keypoints from a human region's bounding
//! box using fixed anthropometric ratios. Nothing is measured: the head
//! is assumed to take the top ~20% of the box, shoulders sit just below
//! it, hips a little past halfway, knees at three quarters. This is a
//! documented approximation, good enough to anchor garment rectangles,
//! and the ratios are the first thing to recalibrate against real
//! imagery.
//!
//! A manual-calibration path accepts two operator-supplied shoulder
//! points and re-derives the remaining keypoints from the manual span
//! with the same ratios.

use crate::types::{HumanRegion, Point, PoseKeypoints};

/// Head height as a fraction of region height.
const HEAD_ROW: f64 = 0.2;
/// Shoulder row: head plus a shoulder-slope allowance.
const SHOULDER_ROW: f64 = HEAD_ROW + 0.1;
/// Hip row as a fraction of region height.
const HIP_ROW: f64 = 0.55;
/// Knee row as a fraction of region height.
const KNEE_ROW: f64 = 0.75;

/// Horizontal half-spreads as fractions of region width.
const SHOULDER_SPREAD: f64 = 0.15;
const HIP_SPREAD: f64 = 0.12;
const KNEE_SPREAD: f64 = 0.1;

/// Manual span to virtual-region conversion: the shoulder span covers
/// `2 * SHOULDER_SPREAD` of the region width, and the region is assumed
/// 2.5x taller than wide (a standing figure).
const MANUAL_REGION_ASPECT: f64 = 2.5;

/// Estimate keypoints for a region from its bounding box proportions.
///
/// Elbows and ankles are not derivable from a box alone and stay
/// `None`; downstream placement degrades gracefully.
#[must_use = "returns the estimated keypoints"]
pub fn estimate(region: &HumanRegion) -> PoseKeypoints {
    let center_x = region.center().x;
    let width = region.width();
    let shoulder_y = region.min_y + region.height() * SHOULDER_ROW;
    let hip_y = region.min_y + region.height() * HIP_ROW;
    let knee_y = region.min_y + region.height() * KNEE_ROW;

    PoseKeypoints {
        left_shoulder: Some(Point::new(center_x - width * SHOULDER_SPREAD, shoulder_y)),
        right_shoulder: Some(Point::new(center_x + width * SHOULDER_SPREAD, shoulder_y)),
        left_hip: Some(Point::new(center_x - width * HIP_SPREAD, hip_y)),
        right_hip: Some(Point::new(center_x + width * HIP_SPREAD, hip_y)),
        left_knee: Some(Point::new(center_x - width * KNEE_SPREAD, knee_y)),
        right_knee: Some(Point::new(center_x + width * KNEE_SPREAD, knee_y)),
        ..PoseKeypoints::default()
    }
}

/// Estimate keypoints from two operator-supplied shoulder points.
///
/// The points are normalized by x so click order does not matter. A
/// virtual region is reconstructed around the manual span -- width
/// `span / (2 * SHOULDER_SPREAD)`, height `2.5x` that -- and the shared
/// row ratios derive hips and knees from it. The manual points
/// themselves are kept verbatim as the shoulders.
#[must_use = "returns the calibrated keypoints"]
pub fn estimate_manual(a: Point, b: Point) -> PoseKeypoints {
    let (left, right) = if a.x <= b.x { (a, b) } else { (b, a) };
    let center = left.midpoint(right);
    let span = right.x - left.x;

    let width = span / (2.0 * SHOULDER_SPREAD);
    let height = width * MANUAL_REGION_ASPECT;
    // Place the virtual box so its shoulder row passes through the
    // manual shoulder center.
    let min_y = center.y - height * SHOULDER_ROW;
    let hip_y = min_y + height * HIP_ROW;
    let knee_y = min_y + height * KNEE_ROW;

    PoseKeypoints {
        left_shoulder: Some(left),
        right_shoulder: Some(right),
        left_hip: Some(Point::new(center.x - width * HIP_SPREAD, hip_y)),
        right_hip: Some(Point::new(center.x + width * HIP_SPREAD, hip_y)),
        left_knee: Some(Point::new(center.x - width * KNEE_SPREAD, knee_y)),
        right_knee: Some(Point::new(center.x + width * KNEE_SPREAD, knee_y)),
        ..PoseKeypoints::default()
    }
}

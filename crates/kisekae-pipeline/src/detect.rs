//! Heuristic human-region detection.
//!
//! Scans the canonical canvas on a coarse grid, classifying pixels as
//! skin-tone via an RGB range test, grows connected clusters with a
//! 4-directional flood fill over that grid, discards noise, and merges
//! clusters that plausibly belong to the same person (face + hands).
//!
//! This is deliberately not a pose model: it finds *where* a person
//! probably is, and the proportional estimator in [`crate::pose`] does
//! the rest. When nothing survives, a default region is synthesized so
//! the pipeline never produces zero regions -- precision is traded for
//! availability.
//!
//! Determinism: the scan is row-major, the flood fill uses a FIFO
//! queue over fixed neighbor order, and merging walks clusters in scan
//! order, so a given buffer always yields the same ordered region list.

use std::collections::VecDeque;

use crate::types::{CanvasSize, HumanRegion, RgbaImage};

/// Coarse sampling step in pixels: every 4th pixel in each direction.
const GRID_STEP: u32 = 4;

/// Inclusive RGB ranges that classify a sample as skin-tone.
///
/// A single broad range tuned on real imagery; generous on purpose,
/// since the flood fill and the noise threshold do the narrowing.
const SKIN_R: (u8, u8) = (95, 255);
const SKIN_G: (u8, u8) = (40, 200);
const SKIN_B: (u8, u8) = (20, 180);

/// Samples with alpha below this are treated as background, not skin.
const ALPHA_OPAQUE_MIN: u8 = 128;

/// Clusters with fewer coarse-grid samples than this are noise.
const MIN_CLUSTER_SAMPLES: usize = 100;

/// Below this many skin samples in the whole frame, detection is not
/// trusted at all and the default region is synthesized directly.
const MIN_TOTAL_SAMPLES: usize = 50;

/// Two regions whose centers are closer than this multiple of their
/// average width are considered the same person and merged.
const MERGE_DISTANCE_FACTOR: f64 = 1.5;

/// Whether one RGBA pixel reads as skin-tone.
fn is_skin(pixel: image::Rgba<u8>) -> bool {
    let [r, g, b, a] = pixel.0;
    a >= ALPHA_OPAQUE_MIN
        && (SKIN_R.0..=SKIN_R.1).contains(&r)
        && (SKIN_G.0..=SKIN_G.1).contains(&g)
        && (SKIN_B.0..=SKIN_B.1).contains(&b)
}

/// Detect candidate human regions on the canonical canvas.
///
/// Always returns at least one region: when no skin cluster survives,
/// a single synthesized default region (centered, conservative
/// proportions) is returned instead. When more than one region is
/// returned, the caller must disambiguate before pose estimation.
#[must_use = "returns the ordered candidate regions"]
pub fn detect_regions(canvas: &RgbaImage) -> Vec<HumanRegion> {
    let grid_w = canvas.width().div_ceil(GRID_STEP) as usize;
    let grid_h = canvas.height().div_ceil(GRID_STEP) as usize;

    // Classify the coarse grid in one row-major pass.
    let mut skin = vec![false; grid_w * grid_h];
    let mut total_samples = 0usize;
    for gy in 0..grid_h {
        for gx in 0..grid_w {
            let pixel = canvas.get_pixel(gx as u32 * GRID_STEP, gy as u32 * GRID_STEP);
            if is_skin(*pixel) {
                skin[gy * grid_w + gx] = true;
                total_samples += 1;
            }
        }
    }

    if total_samples < MIN_TOTAL_SAMPLES {
        return vec![default_region(canvas_size_of(canvas))];
    }

    // Flood fill connected clusters over the coarse grid.
    let mut visited = vec![false; grid_w * grid_h];
    let mut regions: Vec<HumanRegion> = Vec::new();
    for seed in 0..skin.len() {
        if !skin[seed] || visited[seed] {
            continue;
        }

        let mut samples = 0usize;
        let (mut min_gx, mut min_gy) = (usize::MAX, usize::MAX);
        let (mut max_gx, mut max_gy) = (0usize, 0usize);

        let mut queue = VecDeque::new();
        queue.push_back(seed);
        visited[seed] = true;
        while let Some(cell) = queue.pop_front() {
            let (gx, gy) = (cell % grid_w, cell / grid_w);
            samples += 1;
            min_gx = min_gx.min(gx);
            min_gy = min_gy.min(gy);
            max_gx = max_gx.max(gx);
            max_gy = max_gy.max(gy);

            // 4-neighborhood in fixed order: left, right, up, down.
            let neighbors = [
                (gx.checked_sub(1), Some(gy)),
                (gx.checked_add(1).filter(|&n| n < grid_w), Some(gy)),
                (Some(gx), gy.checked_sub(1)),
                (Some(gx), gy.checked_add(1).filter(|&n| n < grid_h)),
            ];
            for (nx, ny) in neighbors {
                let (Some(nx), Some(ny)) = (nx, ny) else {
                    continue;
                };
                let idx = ny * grid_w + nx;
                if skin[idx] && !visited[idx] {
                    visited[idx] = true;
                    queue.push_back(idx);
                }
            }
        }

        if samples < MIN_CLUSTER_SAMPLES {
            continue;
        }

        regions.push(HumanRegion {
            min_x: (min_gx as u32 * GRID_STEP) as f64,
            min_y: (min_gy as u32 * GRID_STEP) as f64,
            max_x: (max_gx as u32 * GRID_STEP) as f64,
            max_y: (max_gy as u32 * GRID_STEP) as f64,
            samples,
        });
    }

    let merged = merge_regions(regions);
    if merged.is_empty() {
        return vec![default_region(canvas_size_of(canvas))];
    }
    merged
}

/// Merge regions that belong to the same person.
///
/// Disjoint skin patches (face, hands) land in separate clusters; two
/// regions whose centers sit closer than 1.5x their average width are
/// treated as one person, keeping the larger region. Walks input in
/// detection order so the merge outcome is deterministic.
fn merge_regions(regions: Vec<HumanRegion>) -> Vec<HumanRegion> {
    let mut merged: Vec<HumanRegion> = Vec::new();
    for region in regions {
        let mut absorbed = false;
        for kept in &mut merged {
            let distance = region.center().distance(kept.center());
            let avg_width = (region.width() + kept.width()) / 2.0;
            if distance < avg_width * MERGE_DISTANCE_FACTOR {
                if region.area() > kept.area() {
                    *kept = region;
                }
                absorbed = true;
                break;
            }
        }
        if !absorbed {
            merged.push(region);
        }
    }
    merged
}

/// The synthesized fallback region: centered on the canvas, 40% of its
/// width by 70% of its height.
///
/// Conservative proportions chosen so the shared row ratios in
/// [`crate::pose`] land the shoulders below any plausible head.
#[must_use]
pub fn default_region(canvas: CanvasSize) -> HumanRegion {
    let width = canvas.w() * 0.4;
    let height = canvas.h() * 0.7;
    let min_x = (canvas.w() - width) / 2.0;
    let min_y = (canvas.h() - height) / 2.0;
    HumanRegion {
        min_x,
        min_y,
        max_x: min_x + width,
        max_y: min_y + height,
        samples: 0,
    }
}

fn canvas_size_of(canvas: &RgbaImage) -> CanvasSize {
    // A decoded buffer always has non-zero dimensions, so this cannot
    // fail; fall back to the portrait canvas defensively if it ever did.
    CanvasSize::new(canvas.width(), canvas.height()).unwrap_or(CanvasSize::PORTRAIT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SKIN: image::Rgba<u8> = image::Rgba([200, 150, 120, 255]);
    const CLOTH: image::Rgba<u8> = image::Rgba([30, 30, 200, 255]);

    /// A canvas with a skin-colored rectangle on a non-skin field.
    fn canvas_with_patch(
        w: u32,
        h: u32,
        x0: u32,
        y0: u32,
        pw: u32,
        ph: u32,
    ) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + pw && y >= y0 && y < y0 + ph {
                SKIN
            } else {
                CLOTH
            }
        })
    }

    #[test]
    fn skin_classifier_matches_documented_ranges() {
        assert!(is_skin(image::Rgba([95, 40, 20, 255])));
        assert!(is_skin(image::Rgba([255, 200, 180, 255])));
        assert!(!is_skin(image::Rgba([94, 100, 100, 255])), "red too low");
        assert!(!is_skin(image::Rgba([150, 201, 100, 255])), "green too high");
        assert!(!is_skin(image::Rgba([150, 100, 181, 255])), "blue too high");
        assert!(!is_skin(image::Rgba([200, 150, 120, 100])), "transparent");
    }

    #[test]
    fn single_patch_yields_single_region() {
        // 100x100 skin patch = 25x25 coarse samples = 625 >= threshold.
        let canvas = canvas_with_patch(400, 600, 100, 100, 100, 100);
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 1);

        let region = regions[0];
        assert!(region.samples >= MIN_CLUSTER_SAMPLES);
        // Bounding box should land on the patch, within one grid step.
        assert!((region.min_x - 100.0).abs() <= f64::from(GRID_STEP));
        assert!((region.min_y - 100.0).abs() <= f64::from(GRID_STEP));
        assert!((region.max_x - 199.0).abs() <= f64::from(GRID_STEP));
        assert!((region.max_y - 199.0).abs() <= f64::from(GRID_STEP));
    }

    #[test]
    fn no_skin_synthesizes_default_region() {
        let canvas = RgbaImage::from_fn(400, 600, |_, _| CLOTH);
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 1);

        let region = regions[0];
        assert_eq!(region.samples, 0, "synthesized region has no samples");
        assert!((region.width() - 160.0).abs() < f64::EPSILON);
        assert!((region.height() - 420.0).abs() < f64::EPSILON);
        assert_eq!(region.center().x, 200.0);
        assert_eq!(region.center().y, 300.0);
    }

    #[test]
    fn transparent_canvas_synthesizes_default_region() {
        let canvas = RgbaImage::new(400, 600);
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].samples, 0);
    }

    #[test]
    fn far_apart_patches_yield_two_regions() {
        // Two 100x100 patches, centers 500 px apart: far beyond
        // 1.5 x avg width (~150), so they stay separate people.
        let mut canvas = canvas_with_patch(800, 600, 50, 100, 100, 100);
        for y in 100..200 {
            for x in 550..650 {
                canvas.put_pixel(x, y, SKIN);
            }
        }
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 2, "expected two people, got {regions:?}");
        // Scan order: leftmost first.
        assert!(regions[0].min_x < regions[1].min_x);
    }

    #[test]
    fn nearby_patches_merge_into_one_region() {
        // Face above, torso-gap, hands below: centers ~120 px apart,
        // average width 100 -> merge distance 150 covers it.
        let mut canvas = canvas_with_patch(400, 600, 150, 100, 100, 100);
        for y in 240..280 {
            for x in 150..250 {
                canvas.put_pixel(x, y, SKIN);
            }
        }
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 1, "expected one merged person, got {regions:?}");
        // The larger cluster (the 100x100 face patch) wins the merge.
        assert!((regions[0].min_y - 100.0).abs() <= f64::from(GRID_STEP));
    }

    #[test]
    fn tiny_specks_are_discarded_as_noise() {
        // An 8x8 patch is 2x2 = 4 coarse samples: below the cluster
        // minimum, and below the total-sample trust threshold, so the
        // default region is synthesized.
        let canvas = canvas_with_patch(400, 600, 200, 200, 8, 8);
        let regions = detect_regions(&canvas);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].samples, 0);
    }

    #[test]
    fn detection_is_deterministic() {
        let mut canvas = canvas_with_patch(800, 600, 50, 100, 100, 100);
        for y in 300..420 {
            for x in 500..640 {
                canvas.put_pixel(x, y, SKIN);
            }
        }
        let first = detect_regions(&canvas);
        for _ in 0..3 {
            assert_eq!(detect_regions(&canvas), first);
        }
    }
}

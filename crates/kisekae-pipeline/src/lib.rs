//! kisekae-pipeline: pure garment fitting compositing core (sans-IO).
//!
//! Produces a composite of a person wearing one or more garments
//! through: decode -> canvas normalization -> human region detection ->
//! proportional pose estimation -> category-driven placement. The
//! masking and guarded-reconciliation stages used by the external-edit
//! path live here too ([`mask`], [`guard`]); the network boundary that
//! drives them lives in `kisekae-service`.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and `image` buffers and returns structured data. All
//! network and filesystem interaction lives in the service and CLI
//! crates.

pub mod decode;
pub mod detect;
pub mod diagnostics;
pub mod flatten;
pub mod garment;
pub mod guard;
pub mod mask;
pub mod normalize;
pub mod place;
pub mod pose;
pub mod types;

use std::time::Instant;

pub use garment::{GarmentCategory, GarmentItem};
pub use types::{
    BoxProportions, CanvasSize, FitConfig, FitError, GrayImage, HumanRegion, Point,
    PoseKeypoints, RegionChoice, RgbaImage,
};

use diagnostics::{FitDiagnostics, StageDiagnostics, StageMetrics};

/// Result of a heuristic fitting run with intermediate stages preserved.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// The final composite on the canonical canvas.
    pub composite: RgbaImage,
    /// The person photo after normalization, before any garment was
    /// drawn. This is the buffer the guard stage treats as "original".
    pub normalized_person: RgbaImage,
    /// Candidate regions from detection (empty under manual
    /// calibration).
    pub regions: Vec<HumanRegion>,
    /// The pose that anchored placement.
    pub pose: PoseKeypoints,
    /// Per-stage timings and metrics.
    pub diagnostics: FitDiagnostics,
}

/// Run the heuristic fitting pipeline and return only the composite.
///
/// See [`compose_staged`] for the staged variant.
///
/// # Errors
///
/// Propagates every error of [`compose_staged`].
pub fn compose(
    person_bytes: &[u8],
    garments: &[GarmentItem],
    config: &FitConfig,
    choice: &RegionChoice,
) -> Result<RgbaImage, FitError> {
    compose_staged(person_bytes, garments, config, choice).map(|outcome| outcome.composite)
}

/// Run the heuristic fitting pipeline with all stages preserved.
///
/// # Pipeline steps
///
/// 1. Decode the person photo (orientation metadata applied)
/// 2. Normalize onto the canonical canvas (fill, no crop)
/// 3. Detect human regions -- unless manual shoulder calibration was
///    supplied, which bypasses detection entirely
/// 4. Estimate pose keypoints for the chosen region
/// 5. Composite garments back-to-front by category z-priority
///
/// # Errors
///
/// Returns [`FitError::EmptyInput`] / [`FitError::InvalidImage`] for
/// undecodable person bytes.
/// Returns [`FitError::AmbiguousHumanRegion`] when detection finds
/// several candidates and `choice` does not select one (or selects an
/// index that does not exist). The error carries the candidates so the
/// caller can present a choice and re-submit.
pub fn compose_staged(
    person_bytes: &[u8],
    garments: &[GarmentItem],
    config: &FitConfig,
    choice: &RegionChoice,
) -> Result<FitOutcome, FitError> {
    let run_start = Instant::now();

    // 1. Decode.
    let stage_start = Instant::now();
    let decoded = decode::decode_rgba(person_bytes)?;
    let decode_diag = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Decode {
            input_bytes: person_bytes.len(),
            width: decoded.width(),
            height: decoded.height(),
        },
    };

    // 2. Normalize onto the canonical canvas.
    let stage_start = Instant::now();
    let normalized = normalize::fill_to(&decoded, config.canvas);
    let normalize_diag = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Normalize {
            from: decoded.dimensions(),
            to: normalized.dimensions(),
        },
    };

    // 3 + 4. Pose: manual calibration bypasses detection.
    let stage_start = Instant::now();
    let (regions, pose) = resolve_pose(&normalized, choice)?;
    let detect_diag = if choice.manual_shoulders.is_some() {
        None
    } else {
        Some(StageDiagnostics {
            duration: stage_start.elapsed(),
            metrics: StageMetrics::Detect {
                region_count: regions.len(),
                synthesized: regions.len() == 1 && regions[0].samples == 0,
            },
        })
    };

    // 5. Placement.
    let stage_start = Instant::now();
    let composite = place::compose(&normalized, garments, &pose);
    let placement_diag = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Placement {
            garment_count: garments.len(),
        },
    };

    Ok(FitOutcome {
        composite,
        normalized_person: normalized,
        regions,
        pose,
        diagnostics: FitDiagnostics {
            decode: decode_diag,
            normalize: normalize_diag,
            detect: detect_diag,
            placement: placement_diag,
            total_duration: run_start.elapsed(),
        },
    })
}

/// Resolve the pose that will anchor placement on a normalized canvas.
///
/// Manual shoulder calibration bypasses detection entirely and returns
/// an empty region list. Otherwise regions are detected and the
/// caller's selection is applied.
///
/// # Errors
///
/// Returns [`FitError::AmbiguousHumanRegion`] when several regions are
/// detected and `choice` does not select a valid one.
pub fn resolve_pose(
    normalized: &RgbaImage,
    choice: &RegionChoice,
) -> Result<(Vec<HumanRegion>, PoseKeypoints), FitError> {
    if let Some((left, right)) = choice.manual_shoulders {
        return Ok((Vec::new(), pose::estimate_manual(left, right)));
    }
    let regions = detect::detect_regions(normalized);
    let region = select_region(&regions, choice.selected)?;
    let pose = pose::estimate(&region);
    Ok((regions, pose))
}

/// Resolve the region the caller wants to fit.
///
/// A single candidate needs no selection. Multiple candidates require
/// an explicit, in-range index; anything else surfaces the candidates
/// as an [`FitError::AmbiguousHumanRegion`] choice request.
fn select_region(
    regions: &[HumanRegion],
    selected: Option<usize>,
) -> Result<HumanRegion, FitError> {
    match (regions, selected) {
        ([only], None) => Ok(*only),
        (many, Some(index)) if index < many.len() => Ok(many[index]),
        (many, _) => Err(FitError::AmbiguousHumanRegion {
            regions: many.to_vec(),
        }),
    }
}

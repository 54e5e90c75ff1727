//! Shared types for the kisekae fitting pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference pipeline
/// buffers without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `GrayImage`, the single-channel representation used for
/// masks and alpha planes.
pub use image::GrayImage;

/// A 2D point in canvas coordinates (pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Midpoint between this point and another.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// The canonical canvas dimensions all buffers are normalized to before
/// cross-image operations.
///
/// Construction is validated: zero dimensions are rejected with
/// [`FitError::DimensionError`], so a held `CanvasSize` is always
/// usable as a resize target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    /// Default portrait canvas, matching the external edit service's
    /// preferred output geometry.
    pub const PORTRAIT: Self = Self {
        width: 1024,
        height: 1536,
    };

    /// Create a validated canvas size.
    ///
    /// # Errors
    ///
    /// Returns [`FitError::DimensionError`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, FitError> {
        if width == 0 || height == 0 {
            return Err(FitError::DimensionError {
                stage: "canvas",
                width,
                height,
            });
        }
        Ok(Self { width, height })
    }

    /// Canvas width in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.height
    }

    /// Width as `f64`, for proportional geometry.
    #[must_use]
    pub fn w(self) -> f64 {
        f64::from(self.width)
    }

    /// Height as `f64`, for proportional geometry.
    #[must_use]
    pub fn h(self) -> f64 {
        f64::from(self.height)
    }

    /// Check that a buffer matches this canvas.
    ///
    /// Every buffer entering placement or guarding must share the
    /// canonical canvas; this is the stage-boundary check.
    ///
    /// # Errors
    ///
    /// Returns [`FitError::CanvasMismatch`] when the buffer has
    /// different dimensions.
    pub fn check(self, stage: &'static str, buffer: &RgbaImage) -> Result<(), FitError> {
        if buffer.width() == self.width && buffer.height() == self.height {
            Ok(())
        } else {
            Err(FitError::CanvasMismatch {
                stage,
                actual: (buffer.width(), buffer.height()),
                expected: (self.width, self.height),
            })
        }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

/// Named anatomical keypoints derived for one human region.
///
/// Partial population is valid: downstream placement degrades to
/// canvas-proportional defaults when a needed point is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseKeypoints {
    pub left_shoulder: Option<Point>,
    pub right_shoulder: Option<Point>,
    pub left_hip: Option<Point>,
    pub right_hip: Option<Point>,
    pub left_elbow: Option<Point>,
    pub right_elbow: Option<Point>,
    pub left_knee: Option<Point>,
    pub right_knee: Option<Point>,
    pub left_ankle: Option<Point>,
    pub right_ankle: Option<Point>,
}

impl PoseKeypoints {
    /// Shoulder center and span, when both shoulders are present.
    #[must_use]
    pub fn shoulder_line(&self) -> Option<(Point, f64)> {
        let left = self.left_shoulder?;
        let right = self.right_shoulder?;
        Some((left.midpoint(right), (right.x - left.x).abs()))
    }

    /// Hip center and span, when both hips are present.
    #[must_use]
    pub fn hip_line(&self) -> Option<(Point, f64)> {
        let left = self.left_hip?;
        let right = self.right_hip?;
        Some((left.midpoint(right), (right.x - left.x).abs()))
    }
}

/// A detected bounding area believed to contain one person.
///
/// Regions are ephemeral: created per detection call, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumanRegion {
    /// Bounding box, inclusive, in canvas pixels.
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// Number of coarse-grid skin samples in the originating cluster.
    /// Zero for a synthesized default region.
    pub samples: usize,
}

impl HumanRegion {
    /// Bounding box width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Bounding box height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Bounding box center.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Bounding box area, used to pick the winner when merging.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// Proportional offsets of the heuristic garment-box mask, as fractions
/// of canvas width/height.
///
/// The defaults were tuned on real imagery to cover chest and torso plus
/// sleeve margins; treat them as recalibration candidates rather than
/// ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxProportions {
    /// Left edge as a fraction of canvas width.
    pub left: f64,
    /// Top edge as a fraction of canvas height.
    pub top: f64,
    /// Box width as a fraction of canvas width.
    pub width: f64,
    /// Box height as a fraction of canvas height.
    pub height: f64,
}

impl Default for BoxProportions {
    fn default() -> Self {
        Self {
            left: 0.18,
            top: 0.28,
            width: 0.64,
            height: 0.38,
        }
    }
}

/// Configuration for the fitting pipeline.
///
/// All parameters have documented defaults. The tuned fractions here are
/// empirical; nothing downstream assumes any particular value beyond the
/// documented ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Canonical canvas all buffers are normalized to.
    pub canvas: CanvasSize,

    /// Proportions of the heuristic garment-box mask.
    pub mask_box: BoxProportions,

    /// Alpha threshold for the alpha-derived mask mode, in channel
    /// units (default 10 ≈ 4% of the maximum channel value).
    pub mask_alpha_threshold: u8,

    /// Feather width in pixels applied at mask boundaries before
    /// blending. The blend band stays within roughly this many pixels.
    pub feather_px: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::PORTRAIT,
            mask_box: BoxProportions::default(),
            mask_alpha_threshold: 10,
            feather_px: 4.0,
        }
    }
}

/// How the caller resolves multi-person ambiguity and optional manual
/// calibration for one fitting request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionChoice {
    /// Index into the detected region list. Required when detection
    /// finds more than one region.
    pub selected: Option<usize>,

    /// Operator-supplied shoulder points (left, right) in canvas
    /// coordinates. When present, detection is bypassed entirely.
    pub manual_shoulders: Option<(Point, Point)>,
}

/// Errors that can occur during fitting pipeline processing.
///
/// Fatal variants carry the stage name and offending dimensions so a
/// failure can be reproduced in a test.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// A requested target size was non-positive.
    #[error("{stage}: invalid target dimensions {width}x{height}")]
    DimensionError {
        stage: &'static str,
        width: u32,
        height: u32,
    },

    /// A buffer reached a stage boundary without matching the canonical
    /// canvas.
    #[error("{stage}: buffer is {actual:?}, expected canonical canvas {expected:?}")]
    CanvasMismatch {
        stage: &'static str,
        actual: (u32, u32),
        expected: (u32, u32),
    },

    /// A mask could not be derived in the requested mode. The caller
    /// may retry with the heuristic garment-box mode.
    #[error("{stage}: mask derivation failed: {reason}")]
    MaskDerivationFailed { stage: &'static str, reason: String },

    /// Multiple human regions were detected and no selection was
    /// supplied. Carries the candidates so the caller can present a
    /// choice and re-submit with an index.
    #[error("{} human regions detected; disambiguation required", regions.len())]
    AmbiguousHumanRegion { regions: Vec<HumanRegion> },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_midpoint() {
        let m = Point::new(0.0, 10.0).midpoint(Point::new(4.0, 0.0));
        assert_eq!(m, Point::new(2.0, 5.0));
    }

    #[test]
    fn canvas_size_rejects_zero() {
        assert!(matches!(
            CanvasSize::new(0, 100),
            Err(FitError::DimensionError {
                stage: "canvas",
                width: 0,
                height: 100,
            }),
        ));
        assert!(matches!(
            CanvasSize::new(100, 0),
            Err(FitError::DimensionError { .. }),
        ));
    }

    #[test]
    fn canvas_check_flags_mismatch() {
        let canvas = CanvasSize::new(8, 8).unwrap();
        let wrong = RgbaImage::new(8, 9);
        assert!(matches!(
            canvas.check("test", &wrong),
            Err(FitError::CanvasMismatch {
                stage: "test",
                actual: (8, 9),
                expected: (8, 8),
            }),
        ));
        let right = RgbaImage::new(8, 8);
        assert!(canvas.check("test", &right).is_ok());
    }

    #[test]
    fn default_canvas_is_portrait() {
        let canvas = CanvasSize::default();
        assert_eq!(canvas.width(), 1024);
        assert_eq!(canvas.height(), 1536);
    }

    #[test]
    fn shoulder_line_requires_both_points() {
        let mut pose = PoseKeypoints {
            left_shoulder: Some(Point::new(10.0, 20.0)),
            ..PoseKeypoints::default()
        };
        assert!(pose.shoulder_line().is_none());

        pose.right_shoulder = Some(Point::new(30.0, 20.0));
        let (center, span) = pose.shoulder_line().unwrap();
        assert_eq!(center, Point::new(20.0, 20.0));
        assert!((span - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn region_geometry() {
        let region = HumanRegion {
            min_x: 10.0,
            min_y: 20.0,
            max_x: 50.0,
            max_y: 120.0,
            samples: 7,
        };
        assert!((region.width() - 40.0).abs() < f64::EPSILON);
        assert!((region.height() - 100.0).abs() < f64::EPSILON);
        assert_eq!(region.center(), Point::new(30.0, 70.0));
        assert!((region.area() - 4000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn config_defaults_are_documented_values() {
        let config = FitConfig::default();
        assert_eq!(config.canvas, CanvasSize::PORTRAIT);
        assert_eq!(config.mask_alpha_threshold, 10);
        assert!((config.feather_px - 4.0).abs() < f32::EPSILON);
        assert!((config.mask_box.left - 0.18).abs() < f64::EPSILON);
        assert!((config.mask_box.top - 0.28).abs() < f64::EPSILON);
        assert!((config.mask_box.width - 0.64).abs() < f64::EPSILON);
        assert!((config.mask_box.height - 0.38).abs() < f64::EPSILON);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = FitConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: FitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn ambiguous_region_error_display_counts() {
        let region = HumanRegion {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
            samples: 1,
        };
        let err = FitError::AmbiguousHumanRegion {
            regions: vec![region, region],
        };
        assert_eq!(
            err.to_string(),
            "2 human regions detected; disambiguation required",
        );
    }
}

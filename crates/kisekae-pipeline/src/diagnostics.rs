//! Pipeline diagnostics: timing and counts for each fitting stage.
//!
//! Permanent instrumentation intended for heuristic tuning -- the skin
//! ranges, anthropometric ratios, and placement multipliers are all
//! empirical, and recalibrating them needs per-stage visibility into
//! what detection and placement actually did on real imagery.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single fitting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Stage 1: person photo decoding (with orientation correction).
    pub decode: StageDiagnostics,
    /// Stage 2: normalization onto the canonical canvas.
    pub normalize: StageDiagnostics,
    /// Stage 3: human region detection. `None` when manual calibration
    /// bypassed detection entirely.
    pub detect: Option<StageDiagnostics>,
    /// Stage 4: garment placement and compositing.
    pub placement: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by fitting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Person photo decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
    },
    /// Canvas normalization metrics.
    Normalize {
        /// Source dimensions before the fill resize.
        from: (u32, u32),
        /// Canonical canvas dimensions.
        to: (u32, u32),
    },
    /// Human region detection metrics.
    Detect {
        /// Number of candidate regions returned.
        region_count: usize,
        /// Whether the default region was synthesized (no cluster
        /// survived the noise and trust thresholds).
        synthesized: bool,
    },
    /// Garment placement metrics.
    Placement {
        /// Garments composited onto the canvas.
        garment_count: usize,
    },
}

//! The fitting orchestrator: one request in, one composite out.
//!
//! Drives the explicit state machine
//! `Idle -> Normalizing -> BuildingMask -> AwaitingExternalEdit ->
//! Guarding -> Done`, with the heuristic branch
//! `Normalizing -> HeuristicPlacement -> Done`. The external edit call
//! is raced against a timeout; a timed-out or failed call falls back to
//! the heuristic path unless the caller disabled fallback, in which
//! case the error surfaces.
//!
//! Duplicate submissions are handled by an explicit caller-supplied
//! idempotency key checked against a cache scoped to this orchestrator
//! value -- there is no process-wide state.

use std::collections::HashMap;
use std::time::Duration;

use kisekae_pipeline::{
    FitConfig, GarmentItem, RegionChoice, RgbaImage, decode, guard, mask, normalize, place,
    resolve_pose,
};

use crate::edit::{DEFAULT_INSTRUCTION, EditRequest, EditService, OutputSize};
use crate::error::ServiceError;

/// Default budget for the external edit call.
pub const DEFAULT_EDIT_TIMEOUT: Duration = Duration::from_secs(45);

/// States of one fitting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittingState {
    Idle,
    Normalizing,
    BuildingMask,
    AwaitingExternalEdit,
    Guarding,
    HeuristicPlacement,
    Done,
    Failed,
}

/// Which path produced the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittingPath {
    /// External edit service plus guarded reconciliation.
    External,
    /// Local detection, pose estimation, and placement.
    Heuristic,
}

/// One fitting request.
#[derive(Debug, Clone)]
pub struct FittingRequest {
    /// Raw person photo bytes.
    pub person: Vec<u8>,
    /// Garments to fit. Only the first is sent through the external
    /// path; the heuristic path layers all of them.
    pub garments: Vec<GarmentItem>,
    /// Region disambiguation and optional manual calibration.
    pub choice: RegionChoice,
    /// Optional person cutout (alpha populated) requesting the
    /// alpha-derived mask mode. When derivation fails, the garment-box
    /// mode is retried automatically.
    pub person_cutout: Option<RgbaImage>,
    /// Caller-supplied idempotency key. Requests repeating a key
    /// return the cached outcome without re-running anything.
    pub idempotency_key: Option<String>,
    /// Whether a failed or timed-out external call may fall back to
    /// the heuristic path.
    pub allow_fallback: bool,
}

impl FittingRequest {
    /// A request with the common defaults: no cutout, no idempotency
    /// key, fallback allowed.
    #[must_use]
    pub fn new(person: Vec<u8>, garments: Vec<GarmentItem>) -> Self {
        Self {
            person,
            garments,
            choice: RegionChoice::default(),
            person_cutout: None,
            idempotency_key: None,
            allow_fallback: true,
        }
    }
}

/// Outcome of a fitting request.
#[derive(Debug, Clone)]
pub struct FittingOutcome {
    /// The final composite on the canonical canvas.
    pub composite: RgbaImage,
    /// Which path produced it.
    pub path: FittingPath,
}

/// Drives fitting requests against an optional external edit service.
///
/// Create one orchestrator per caller session: the idempotency cache
/// lives on this value and dies with it.
pub struct Orchestrator<E> {
    edit: Option<E>,
    config: FitConfig,
    timeout: Duration,
    cache: HashMap<String, FittingOutcome>,
}

impl<E: EditService> Orchestrator<E> {
    /// Create an orchestrator. Passing `None` for `edit` pins every
    /// request to the heuristic path.
    #[must_use]
    pub fn new(edit: Option<E>, config: FitConfig) -> Self {
        Self {
            edit,
            config,
            timeout: DEFAULT_EDIT_TIMEOUT,
            cache: HashMap::new(),
        }
    }

    /// Override the external edit timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one fitting request to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Pipeline`] for fatal pipeline failures
    /// (undecodable input, ambiguous regions) and [`ServiceError`]
    /// transport/timeout variants when the external path fails with
    /// fallback disabled.
    pub async fn run(&mut self, request: &FittingRequest) -> Result<FittingOutcome, ServiceError> {
        if let Some(key) = &request.idempotency_key {
            if let Some(cached) = self.cache.get(key) {
                tracing::info!(key = %key, "idempotency cache hit");
                return Ok(cached.clone());
            }
        }

        let outcome = self.run_uncached(request).await?;

        if let Some(key) = &request.idempotency_key {
            self.cache.insert(key.clone(), outcome.clone());
        }
        Ok(outcome)
    }

    async fn run_uncached(
        &self,
        request: &FittingRequest,
    ) -> Result<FittingOutcome, ServiceError> {
        let mut state = FittingState::Idle;

        transition(&mut state, FittingState::Normalizing);
        let decoded = match decode::decode_rgba(&request.person) {
            Ok(img) => img,
            Err(err) => return Err(fail(&mut state, err.into())),
        };
        let normalized = normalize::fill_to(&decoded, self.config.canvas);

        // External path: only when a service is configured and there is
        // a garment to reference.
        if let (Some(edit), Some(first_garment)) = (&self.edit, request.garments.first()) {
            transition(&mut state, FittingState::BuildingMask);
            let mask_plane = self.build_mask(request);

            transition(&mut state, FittingState::AwaitingExternalEdit);
            let edit_request = match build_edit_request(&normalized, first_garment, &mask_plane) {
                Ok(req) => req,
                Err(err) => return Err(fail(&mut state, err)),
            };
            if request.garments.len() > 1 {
                tracing::warn!(
                    skipped = request.garments.len() - 1,
                    "external path fits one garment per request; extra garments ignored",
                );
            }

            let attempt = tokio::time::timeout(self.timeout, edit.edit(&edit_request)).await;
            match attempt {
                Ok(Ok(edited)) => {
                    transition(&mut state, FittingState::Guarding);
                    let composite = match guard::reconcile(
                        &normalized,
                        &mask_plane,
                        &edited,
                        self.config.feather_px,
                    ) {
                        Ok(img) => img,
                        Err(err) => return Err(fail(&mut state, err.into())),
                    };
                    transition(&mut state, FittingState::Done);
                    return Ok(FittingOutcome {
                        composite,
                        path: FittingPath::External,
                    });
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "external edit failed");
                    if !(request.allow_fallback && err.is_recoverable()) {
                        return Err(fail(&mut state, err));
                    }
                }
                Err(_elapsed) => {
                    let err = ServiceError::Timeout(self.timeout);
                    tracing::warn!(error = %err, "external edit timed out");
                    if !request.allow_fallback {
                        return Err(fail(&mut state, err));
                    }
                }
            }
        }

        transition(&mut state, FittingState::HeuristicPlacement);
        let (regions, pose) = match resolve_pose(&normalized, &request.choice) {
            Ok(resolved) => resolved,
            Err(err) => return Err(fail(&mut state, err.into())),
        };
        tracing::debug!(regions = regions.len(), "heuristic pose resolved");
        let composite = place::compose(&normalized, &request.garments, &pose);

        transition(&mut state, FittingState::Done);
        Ok(FittingOutcome {
            composite,
            path: FittingPath::Heuristic,
        })
    }

    /// Build the editable-region mask for the external path.
    ///
    /// Alpha-derived mode is attempted when the request carries a
    /// person cutout; a derivation failure is recoverable per the error
    /// contract, so it retries with the garment-box mode rather than
    /// aborting.
    fn build_mask(&self, request: &FittingRequest) -> kisekae_pipeline::GrayImage {
        if let Some(cutout) = &request.person_cutout {
            let aligned = normalize::fill_to(cutout, self.config.canvas);
            match mask::alpha_mask(
                &aligned,
                self.config.mask_alpha_threshold,
                self.config.feather_px,
            ) {
                Ok(plane) => return plane,
                Err(err) => {
                    tracing::warn!(error = %err, "alpha mask failed; retrying with garment box");
                }
            }
        }
        mask::garment_box_mask(self.config.canvas, &self.config.mask_box)
    }
}

/// Encode the PNG payloads for one external edit call.
fn build_edit_request(
    normalized: &RgbaImage,
    garment: &GarmentItem,
    mask_plane: &kisekae_pipeline::GrayImage,
) -> Result<EditRequest, ServiceError> {
    Ok(EditRequest {
        person_png: decode::encode_png(normalized)?,
        garment_pngs: vec![decode::encode_png(&garment.image)?],
        mask_png: decode::encode_gray_png(mask_plane)?,
        instruction: DEFAULT_INSTRUCTION.to_owned(),
        size: OutputSize::Auto,
    })
}

/// Advance the state machine, logging the edge.
fn transition(state: &mut FittingState, next: FittingState) {
    tracing::debug!(from = ?state, to = ?next, "fitting state");
    *state = next;
}

/// Mark the request failed, preserving the originating error.
fn fail(state: &mut FittingState, err: ServiceError) -> ServiceError {
    transition(state, FittingState::Failed);
    tracing::error!(error = %err, "fitting request failed");
    err
}

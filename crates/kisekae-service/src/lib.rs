//! kisekae-service: the async boundary of the fitting pipeline.
//!
//! Hosts the external edit-service and background-removal clients and
//! the [`Orchestrator`](orchestrator::Orchestrator) that drives one
//! fitting request through its state machine: normalize, build the
//! mask, race the external edit against a timeout, guard the result --
//! or fall back to the pure heuristic path in `kisekae-pipeline`.
//!
//! Everything network-shaped lives here; the pipeline crate stays
//! sans-IO.

pub mod edit;
pub mod error;
pub mod orchestrator;
pub mod removal;

pub use edit::{DEFAULT_INSTRUCTION, EditRequest, EditService, HttpEditClient, OutputSize};
pub use error::ServiceError;
pub use orchestrator::{
    DEFAULT_EDIT_TIMEOUT, FittingOutcome, FittingPath, FittingRequest, FittingState, Orchestrator,
};
pub use removal::{HttpRemovalClient, RemovalService};

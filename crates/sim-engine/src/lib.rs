#![deny(warnings)]

//! Mission lifecycle engine for Astromine.
//!
//! Owns the shared mutable world: the ship registry, the asteroid
//! ledger and the per-mission state machines. All daily advancement
//! goes through [`MissionEngine::advance_day`], which is serialized per
//! mission and deterministic for a fixed configuration seed.

mod engine;
mod ledger;
mod ships;

pub use engine::{DayReport, MissionEngine};
pub use ledger::AsteroidLedger;
pub use ships::ShipRegistry;

use sim_core::{AsteroidId, MissionId, ShipId, ValidationError};
use sim_econ::EconError;
use thiserror::Error;

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation precondition not met; no state was changed.
    #[error("operation not ready: {0}")]
    NotReady(String),
    /// The ship is already assigned or under repair.
    #[error("ship unavailable: {0:?}")]
    ShipUnavailable(ShipId),
    /// Another call is advancing this mission right now.
    #[error("mission is being advanced concurrently: {0:?}")]
    ConcurrencyConflict(MissionId),
    /// Referenced mission does not exist.
    #[error("unknown mission: {0:?}")]
    UnknownMission(MissionId),
    /// Referenced ship does not exist.
    #[error("unknown ship: {0:?}")]
    UnknownShip(ShipId),
    /// Referenced asteroid does not exist.
    #[error("unknown asteroid: {0:?}")]
    UnknownAsteroid(AsteroidId),
    /// Domain invariant violation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Economic helper failure.
    #[error(transparent)]
    Econ(#[from] EconError),
}

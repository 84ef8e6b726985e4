#![deny(warnings)]

//! Core domain models and invariants for Astromine.
//!
//! This crate defines the serializable types shared across the mission
//! simulator with validation helpers to guarantee basic invariants:
//! cargo never exceeds ship capacity, remaining asteroid mass never goes
//! negative, and mission day counters only move forward.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Unique identifier for a mission.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MissionId(pub String);

/// Unique identifier for a ship.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShipId(pub String);

/// Unique identifier for an asteroid, e.g. "101955 Bennu".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AsteroidId(pub String);

/// Unique identifier for a loan.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoanId(pub String);

/// Unique identifier for the owning user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Discrete state of a mission's lifecycle state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Mission being drafted by the planning flow; not owned by the engine.
    Planning,
    /// Planned and waiting for an explicit `launch` command.
    LaunchReady,
    /// Transient day-0 state; becomes `Traveling` in the same transition.
    Launched,
    /// Outbound leg toward the asteroid.
    Traveling,
    /// Deploying mining equipment on site.
    MiningSetup,
    /// Daily extraction against the asteroid ledger.
    Mining,
    /// Securing cargo before departure.
    CargoLoading,
    /// Inbound leg back to Earth.
    Returning,
    /// Terminal: returned with cargo, awaiting or past settlement.
    Completed,
    /// Terminal: mission lost (hull failure).
    Failed,
}

impl Phase {
    /// Whether the phase is terminal (no further mutation allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Whether the engine may advance this phase by a day.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            Phase::Planning | Phase::LaunchReady | Phase::Completed | Phase::Failed
        )
    }
}

/// Availability state of a ship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipStatus {
    /// Docked and assignable to a new mission.
    Available,
    /// Exclusively assigned to one in-flight mission.
    Active,
    /// Grounded until repaired.
    Repairing,
}

/// Coarse ship position; travel time is day-granular, not positional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipLocation {
    /// Docked on Earth.
    Earth,
    /// Outbound or inbound transit.
    EnRoute,
    /// Stationed at the target asteroid.
    Asteroid,
}

/// Spectral classification governing ore grade and hazard weighting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsteroidClass {
    /// Carbonaceous: abundant but low-grade.
    C,
    /// Silicaceous: average grade.
    S,
    /// Metallic: highest concentrations.
    M,
}

impl AsteroidClass {
    /// Fractional yield efficiency of extraction for this class.
    pub fn ore_grade(self) -> Decimal {
        match self {
            // scale 2: 0.30 / 0.45 / 0.60
            AsteroidClass::C => Decimal::new(30, 2),
            AsteroidClass::S => Decimal::new(45, 2),
            AsteroidClass::M => Decimal::new(60, 2),
        }
    }
}

/// Cumulative mission costs; `total` also folds in accrued loan interest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionCosts {
    /// Daily ground-control burn.
    pub ground_control: Decimal,
    /// Cumulative hazard-event cost.
    pub space_events: Decimal,
    /// Repair charges attributed to the mission.
    pub repairs: Decimal,
    /// Loan interest accrued so far.
    pub interest: Decimal,
    /// Sum of all of the above. Monotone non-decreasing.
    pub total: Decimal,
}

impl MissionCosts {
    /// Recompute `total` from the parts.
    pub fn recompute_total(&mut self) {
        self.total = self.ground_control + self.space_events + self.repairs + self.interest;
    }
}

/// One entry in a mission's append-only event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionEvent {
    /// Mission day on which the event occurred.
    pub day: u32,
    /// Machine-readable event kind, e.g. "micrometeorite".
    pub event_type: String,
    /// Human-readable description.
    pub description: String,
    /// Cost applied to `costs.space_events`.
    pub cost: Decimal,
    /// Days of delay added to the current phase.
    pub impact_days: u32,
    /// Hull integrity points lost.
    pub hull_damage: u32,
}

/// One-time financial outcome of a completed mission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    /// Market value of the returned cargo at settlement time.
    pub cargo_value: Decimal,
    /// `cargo_value - costs.total - loan_payoff`.
    pub net_profit: Decimal,
    /// `net_profit / costs.total * 100`; zero when costs are zero.
    pub roi_percentage: Decimal,
    /// Principal plus accrued interest repaid at settlement.
    pub loan_payoff: Decimal,
    /// Whether a loan was repaid as part of settlement.
    pub loans_repaid: bool,
}

/// Unit of simulation: one ship, one asteroid, one multi-day plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mission {
    /// Mission identifier.
    pub id: MissionId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub user_id: UserId,
    /// Assigned ship.
    pub ship_id: ShipId,
    /// Target asteroid.
    pub asteroid_id: AsteroidId,
    /// Financing, when the budget requires one.
    pub loan_id: Option<LoanId>,
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Days elapsed since launch. Monotone non-decreasing.
    pub current_day: u32,
    /// Days elapsed inside the current phase.
    pub phase_day: u32,
    /// One-way travel duration derived from the asteroid distance metric.
    pub travel_days: u32,
    /// Planned mining duration.
    pub mining_days: u32,
    /// Fixed on-site setup duration.
    pub mining_setup_days: u32,
    /// Fixed cargo securing duration.
    pub cargo_loading_days: u32,
    /// Upper bound: `2*travel + setup + mining + loading`, extended by delays.
    pub total_days: u32,
    /// Delay days accumulated from hazard events.
    pub delay_days: u32,
    /// Accumulated cargo, element name -> kg. Sum never exceeds capacity.
    pub cargo: BTreeMap<String, Decimal>,
    /// Cumulative cost breakdown.
    pub costs: MissionCosts,
    /// Append-only hazard log.
    pub events: Vec<MissionEvent>,
    /// When false, the scheduler skips this mission.
    pub auto_progress: bool,
    /// Populated exactly once at settlement.
    pub final_results: Option<FinalResults>,
    /// Creation timestamp (set by the planning flow).
    pub created_at: DateTime<Utc>,
    /// Set when the mission reaches a terminal phase.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Mission {
    /// Total cargo mass currently on board, in kg.
    pub fn cargo_total(&self) -> Decimal {
        self.cargo.values().copied().sum()
    }

    /// Derived schedule bound before any delays.
    pub fn planned_days(&self) -> u32 {
        2 * self.travel_days + self.mining_setup_days + self.mining_days + self.cargo_loading_days
    }
}

/// A mining ship; shared, mutable, exclusively assigned while active.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ship {
    /// Ship identifier.
    pub id: ShipId,
    /// Display name.
    pub name: String,
    /// Cargo capacity in kg.
    pub capacity_kg: Decimal,
    /// Mining efficiency, 1..=100 (kg of ore per hour at grade 1.0).
    pub mining_power: u32,
    /// Current hull integrity, 0..=100. Zero means lost.
    pub hull: u32,
    /// Cumulative unrepaired damage points.
    pub hull_damage: u32,
    /// Shield strength, 0..=100.
    pub shield: u32,
    /// Earned by accumulated mission history.
    pub veteran_status: bool,
    /// Multiplicative yield/resistance bonus, e.g. 0.15.
    pub veteran_bonus: f64,
    /// Availability state.
    pub status: ShipStatus,
    /// Coarse position.
    pub location: ShipLocation,
    /// Completed mission count.
    pub missions_completed: u32,
    /// Cumulative round-trip days flown.
    pub total_distance_traveled: u32,
}

/// Read-mostly composition reference for one asteroid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asteroid {
    /// Asteroid identifier.
    pub id: AsteroidId,
    /// Display name.
    pub name: String,
    /// Spectral class.
    pub class: AsteroidClass,
    /// Remaining mass per element, in kg. Monotone non-increasing.
    pub elements: BTreeMap<String, Decimal>,
    /// Mean diameter in meters.
    pub diameter_m: f64,
    /// Distance metric: one-way travel duration in days.
    pub moid_days: u32,
    /// Provenance marker for generated records; informational only.
    pub synthetic: bool,
}

impl Asteroid {
    /// Total remaining mass across all elements.
    pub fn remaining_total(&self) -> Decimal {
        self.elements.values().copied().sum()
    }

    /// True when no element has mass left to extract.
    pub fn is_exhausted(&self) -> bool {
        self.elements.values().all(|m| *m <= Decimal::ZERO)
    }
}

/// Repayment state of a loan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    /// Accruing interest.
    Active,
    /// Settled in full. Immutable afterwards.
    Repaid,
    /// The financed mission failed before settlement.
    Defaulted,
}

/// Financing instrument backing a mission budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Loan identifier.
    pub id: LoanId,
    /// Principal in USD.
    pub principal: Decimal,
    /// Annual percentage rate, e.g. 8 for 8%.
    pub apr_percent: Decimal,
    /// Contractual term in days.
    pub term_days: u32,
    /// Origination timestamp.
    pub created_at: DateTime<Utc>,
    /// Repayment state.
    pub state: LoanState,
}

/// Simulation policy knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seed for deterministic RNG derivation.
    pub rng_seed: u64,
    /// Fixed on-site setup duration in days.
    pub mining_setup_days: u32,
    /// Fixed cargo securing duration in days.
    pub cargo_loading_days: u32,
    /// Daily ground-control cost in USD.
    pub daily_ground_control_cost: Decimal,
    /// Lower bound of the daily yield variance multiplier.
    pub variance_min: f64,
    /// Upper bound of the daily yield variance multiplier.
    pub variance_max: f64,
    /// Repair cost per hull damage point, in USD.
    pub repair_cost_per_point: Decimal,
    /// Cap on a single repair charge, in USD.
    pub max_repair_cost: Decimal,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            mining_setup_days: 3,
            cargo_loading_days: 2,
            daily_ground_control_cost: Decimal::new(75_000, 0),
            variance_min: 0.8,
            variance_max: 1.2,
            repair_cost_per_point: Decimal::new(1_000_000, 0),
            max_repair_cost: Decimal::new(25_000_000, 0),
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Ship capacity must be strictly positive.
    #[error("ship capacity must be > 0")]
    NonPositiveCapacity,
    /// Mining power outside 1..=100.
    #[error("mining power {0} is out of range [1, 100]")]
    MiningPowerOutOfRange(u32),
    /// Hull or shield outside 0..=100.
    #[error("integrity value {0} is out of range [0, 100]")]
    IntegrityOutOfRange(u32),
    /// Monetary or mass value must be non-negative.
    #[error("negative quantity is invalid")]
    NegativeQuantity,
    /// Cargo sum exceeds ship capacity.
    #[error("cargo {cargo_kg} kg exceeds capacity {capacity_kg} kg")]
    CargoOverCapacity {
        /// Offending cargo total.
        cargo_kg: Decimal,
        /// Ship capacity.
        capacity_kg: Decimal,
    },
    /// Veteran bonus must be a finite fraction in [0, 1).
    #[error("veteran bonus must be in [0, 1)")]
    InvalidVeteranBonus,
    /// Variance bounds must satisfy 0 < min <= max.
    #[error("variance bounds must satisfy 0 < min <= max")]
    InvalidVariance,
}

/// Validate a ship's static and dynamic fields.
pub fn validate_ship(ship: &Ship) -> Result<(), ValidationError> {
    if ship.capacity_kg <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveCapacity);
    }
    if !(1..=100).contains(&ship.mining_power) {
        return Err(ValidationError::MiningPowerOutOfRange(ship.mining_power));
    }
    if ship.hull > 100 {
        return Err(ValidationError::IntegrityOutOfRange(ship.hull));
    }
    if ship.shield > 100 {
        return Err(ValidationError::IntegrityOutOfRange(ship.shield));
    }
    if !ship.veteran_bonus.is_finite() || !(0.0..1.0).contains(&ship.veteran_bonus) {
        return Err(ValidationError::InvalidVeteranBonus);
    }
    Ok(())
}

/// Validate an asteroid's composition ledger.
pub fn validate_asteroid(asteroid: &Asteroid) -> Result<(), ValidationError> {
    for mass in asteroid.elements.values() {
        if *mass < Decimal::ZERO {
            return Err(ValidationError::NegativeQuantity);
        }
    }
    Ok(())
}

/// Validate a mission against the ship carrying it.
pub fn validate_mission(mission: &Mission, ship: &Ship) -> Result<(), ValidationError> {
    for mass in mission.cargo.values() {
        if *mass < Decimal::ZERO {
            return Err(ValidationError::NegativeQuantity);
        }
    }
    let cargo_kg = mission.cargo_total();
    if cargo_kg > ship.capacity_kg {
        return Err(ValidationError::CargoOverCapacity {
            cargo_kg,
            capacity_kg: ship.capacity_kg,
        });
    }
    if mission.costs.total < Decimal::ZERO {
        return Err(ValidationError::NegativeQuantity);
    }
    Ok(())
}

/// Validate a loan's terms.
pub fn validate_loan(loan: &Loan) -> Result<(), ValidationError> {
    if loan.principal < Decimal::ZERO || loan.apr_percent < Decimal::ZERO {
        return Err(ValidationError::NegativeQuantity);
    }
    Ok(())
}

/// Validate simulation policy knobs.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ValidationError> {
    if cfg.daily_ground_control_cost < Decimal::ZERO
        || cfg.repair_cost_per_point < Decimal::ZERO
        || cfg.max_repair_cost < Decimal::ZERO
    {
        return Err(ValidationError::NegativeQuantity);
    }
    if !cfg.variance_min.is_finite()
        || !cfg.variance_max.is_finite()
        || cfg.variance_min <= 0.0
        || cfg.variance_min > cfg.variance_max
    {
        return Err(ValidationError::InvalidVariance);
    }
    Ok(())
}

//! The mission state machine and its daily advancement.

use crate::{AsteroidLedger, EngineError, ShipRegistry};
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    validate_config, validate_mission, Asteroid, FinalResults, Loan, Mission, MissionEvent,
    MissionId, Phase, Ship, SimConfig,
};
use sim_econ::{accrued_interest, FinancingLedger, PriceOracle};
use sim_events::{HazardContext, HazardTable};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// Snapshot returned after one daily advancement.
#[derive(Clone, Debug, Serialize)]
pub struct DayReport {
    /// Mission that was advanced.
    pub mission_id: MissionId,
    /// Mission day after advancement.
    pub day: u32,
    /// Phase after advancement.
    pub phase: Phase,
    /// Total cargo on board, in kg.
    pub cargo_kg: Decimal,
    /// Cumulative mission cost.
    pub costs_total: Decimal,
    /// Ship hull integrity after the day's events.
    pub hull: u32,
    /// The hazard that fired today, if any.
    pub event: Option<MissionEvent>,
}

/// Central engine owning the shared world state.
///
/// Per-mission state lives in its own `Mutex` slot so missions advance
/// independently; the outer `RwLock` only guards slot creation and
/// lookup. `advance_day` takes a slot with `try_lock` and rejects a
/// second concurrent call instead of interleaving.
pub struct MissionEngine {
    cfg: SimConfig,
    hazards: HazardTable,
    ships: ShipRegistry,
    asteroids: AsteroidLedger,
    financing: Mutex<FinancingLedger>,
    oracle: Box<dyn PriceOracle + Send + Sync>,
    missions: RwLock<BTreeMap<MissionId, Arc<Mutex<Mission>>>>,
}

impl MissionEngine {
    /// Build an engine from policy knobs, a hazard table and an oracle.
    pub fn new(
        cfg: SimConfig,
        hazards: HazardTable,
        oracle: Box<dyn PriceOracle + Send + Sync>,
    ) -> Result<Self, EngineError> {
        validate_config(&cfg)?;
        Ok(Self {
            cfg,
            hazards,
            ships: ShipRegistry::new(),
            asteroids: AsteroidLedger::new(),
            financing: Mutex::new(FinancingLedger::new()),
            oracle,
            missions: RwLock::new(BTreeMap::new()),
        })
    }

    /// The ship registry, for fleet setup and repairs.
    pub fn ships(&self) -> &ShipRegistry {
        &self.ships
    }

    /// The asteroid ledger, for world setup.
    pub fn asteroids(&self) -> &AsteroidLedger {
        &self.asteroids
    }

    /// Originate a loan for a mission budget.
    pub fn create_loan(
        &self,
        principal: Decimal,
        apr_percent: Decimal,
        term_days: u32,
    ) -> Loan {
        self.financing_guard()
            .create_loan(principal, apr_percent, term_days)
    }

    /// Look up a loan.
    pub fn loan(&self, id: &sim_core::LoanId) -> Result<Loan, EngineError> {
        Ok(self.financing_guard().get(id)?)
    }

    /// Register an externally planned mission.
    ///
    /// The engine never creates missions; the planning flow hands them
    /// over in `Planning` or `LaunchReady` phase. The referenced ship,
    /// asteroid and loan must already exist.
    pub fn admit(&self, mission: Mission) -> Result<(), EngineError> {
        if !matches!(mission.phase, Phase::Planning | Phase::LaunchReady) {
            return Err(EngineError::NotReady(format!(
                "mission {} is already in flight",
                mission.id.0
            )));
        }
        let ship = self.ships.get(&mission.ship_id)?;
        validate_mission(&mission, &ship)?;
        self.asteroids.get(&mission.asteroid_id)?;
        if let Some(loan_id) = &mission.loan_id {
            self.financing_guard().get(loan_id)?;
        }
        let mut missions = self.missions_write();
        missions.insert(mission.id.clone(), Arc::new(Mutex::new(mission)));
        Ok(())
    }

    /// Launch a `LaunchReady` mission.
    ///
    /// Readiness checks run before any state changes, so a failed launch
    /// leaves the world untouched. On success the ship is atomically
    /// acquired and the mission moves `Launched` -> `Traveling` as its
    /// day-0 transition.
    pub fn launch(&self, id: &MissionId) -> Result<(), EngineError> {
        let slot = self.slot(id)?;
        let mut mission = slot
            .try_lock()
            .map_err(|_| EngineError::ConcurrencyConflict(id.clone()))?;

        if mission.phase != Phase::LaunchReady {
            return Err(EngineError::NotReady(format!(
                "mission {} is not launch-ready",
                id.0
            )));
        }
        let asteroid = self.asteroids.get(&mission.asteroid_id)?;
        if asteroid.is_exhausted() {
            return Err(EngineError::NotReady(format!(
                "asteroid {} has no remaining mass",
                asteroid.id.0
            )));
        }
        if let Some(loan_id) = &mission.loan_id {
            let loan = self.financing_guard().get(loan_id)?;
            if loan.state != sim_core::LoanState::Active {
                return Err(EngineError::NotReady(format!(
                    "loan {} is not active",
                    loan_id.0
                )));
            }
        }
        // Last check: this one mutates, but only on success.
        self.ships.acquire_for_launch(&mission.ship_id)?;

        mission.phase = Phase::Traveling;
        mission.current_day = 0;
        mission.phase_day = 0;
        mission.total_days = mission.planned_days();
        info!(
            mission = %id.0,
            ship = %mission.ship_id.0,
            asteroid = %mission.asteroid_id.0,
            total_days = mission.total_days,
            "mission launched"
        );
        Ok(())
    }

    /// Advance one mission by one simulated day.
    ///
    /// Serialized per mission: a second call while one is in flight gets
    /// `ConcurrencyConflict` instead of blocking. Terminal missions are
    /// an idempotent no-op. The whole day (costs, hazard, yield, phase
    /// transition) is one atomic unit under the mission lock.
    pub fn advance_day(&self, id: &MissionId) -> Result<DayReport, EngineError> {
        let slot = self.slot(id)?;
        let mut mission = slot
            .try_lock()
            .map_err(|_| EngineError::ConcurrencyConflict(id.clone()))?;

        if mission.phase.is_terminal() {
            let hull = self.ships.get(&mission.ship_id).map(|s| s.hull).unwrap_or(0);
            return Ok(report(&mission, hull, None));
        }
        if !mission.phase.is_active() {
            return Err(EngineError::NotReady(format!(
                "mission {} has not launched",
                id.0
            )));
        }

        mission.current_day += 1;
        mission.phase_day += 1;
        mission.costs.ground_control += self.cfg.daily_ground_control_cost;
        if let Some(loan_id) = mission.loan_id.clone() {
            let loan = self.financing_guard().get(&loan_id)?;
            if loan.state == sim_core::LoanState::Active {
                mission.costs.interest = accrued_interest(&loan, mission.current_day);
            }
        }

        let ship = self.ships.get(&mission.ship_id)?;
        let mut rng = self.day_rng(id, mission.current_day);

        let hazard = self.hazards.roll(
            &HazardContext {
                phase: mission.phase,
                elapsed_days: mission.current_day,
                veteran_bonus: ship.veteran_bonus,
                base_daily_cost: self.cfg.daily_ground_control_cost,
            },
            &mut rng,
        );
        let mut logged = None;
        if let Some(hazard) = hazard {
            let event = hazard.into_mission_event(mission.current_day);
            mission.costs.space_events += event.cost;
            if event.impact_days > 0 {
                // A delay holds the current phase back by rewinding its
                // day counter; the schedule bound stretches to match.
                mission.phase_day = mission.phase_day.saturating_sub(event.impact_days);
                mission.delay_days += event.impact_days;
                mission.total_days += event.impact_days;
            }
            let hull_left = if event.hull_damage > 0 {
                self.ships.apply_damage(&mission.ship_id, event.hull_damage)?
            } else {
                ship.hull
            };
            warn!(
                mission = %id.0,
                day = mission.current_day,
                event = %event.event_type,
                cost = %event.cost,
                hull_left,
                "hazard applied"
            );
            mission.events.push(event.clone());
            logged = Some(event);

            if hull_left == 0 {
                return self.fail_mission(&mut mission, logged);
            }
        }

        match mission.phase {
            Phase::Traveling => {
                if mission.phase_day >= mission.travel_days {
                    self.ships.arrive_at_asteroid(&mission.ship_id)?;
                    enter_phase(&mut mission, Phase::MiningSetup);
                }
            }
            Phase::MiningSetup => {
                if mission.phase_day >= mission.mining_setup_days {
                    enter_phase(&mut mission, Phase::Mining);
                }
            }
            Phase::Mining => {
                self.mine_one_day(&mut mission, &ship, &mut rng)?;
                let full = mission.cargo_total() >= ship.capacity_kg;
                let out_of_days = mission.phase_day >= mission.mining_days;
                let exhausted = self.asteroids.is_exhausted(&mission.asteroid_id)?;
                if full || out_of_days || exhausted {
                    enter_phase(&mut mission, Phase::CargoLoading);
                }
            }
            Phase::CargoLoading => {
                if mission.phase_day >= mission.cargo_loading_days {
                    self.ships.depart_for_earth(&mission.ship_id)?;
                    enter_phase(&mut mission, Phase::Returning);
                }
            }
            Phase::Returning => {
                if mission.phase_day >= mission.travel_days {
                    mission.phase = Phase::Completed;
                    mission.completed_at = Some(Utc::now());
                    // Odometer credit is the round trip only, not time
                    // spent on site or lost to delays.
                    self.ships
                        .complete_return(&mission.ship_id, 2 * mission.travel_days)?;
                    info!(
                        mission = %id.0,
                        day = mission.current_day,
                        cargo_kg = %mission.cargo_total(),
                        "mission returned to Earth"
                    );
                }
            }
            // Launched exists only inside the launch transition itself;
            // pre-launch and terminal phases were filtered above.
            Phase::Launched
            | Phase::Planning
            | Phase::LaunchReady
            | Phase::Completed
            | Phase::Failed => {}
        }

        mission.costs.recompute_total();
        let hull = self.ships.get(&mission.ship_id)?.hull;
        Ok(report(&mission, hull, logged))
    }

    /// Settle a completed mission: value the cargo, close out the loan.
    ///
    /// Idempotent: a second call returns the stored results without
    /// recomputation, so a later price change never rewrites history.
    pub fn sell_cargo(&self, id: &MissionId) -> Result<FinalResults, EngineError> {
        let slot = self.slot(id)?;
        let mut mission = slot
            .try_lock()
            .map_err(|_| EngineError::ConcurrencyConflict(id.clone()))?;

        if let Some(results) = &mission.final_results {
            return Ok(results.clone());
        }
        if mission.phase != Phase::Completed {
            return Err(EngineError::NotReady(format!(
                "mission {} has not completed",
                id.0
            )));
        }

        let loan = match &mission.loan_id {
            Some(loan_id) => Some(self.financing_guard().get(loan_id)?),
            None => None,
        };
        let results = sim_econ::settle(
            &mission.cargo,
            &mission.costs,
            loan.as_ref().map(|l| (l, mission.current_day)),
            self.oracle.as_ref(),
        )?;
        if let (Some(loan_id), true) = (&mission.loan_id, results.loans_repaid) {
            self.financing_guard().mark_repaid(loan_id)?;
        }
        info!(
            mission = %id.0,
            cargo_value = %results.cargo_value,
            net_profit = %results.net_profit,
            roi = %results.roi_percentage,
            "mission settled"
        );
        mission.final_results = Some(results.clone());
        Ok(results)
    }

    /// Exclude a mission from scheduler ticks.
    pub fn pause(&self, id: &MissionId) -> Result<(), EngineError> {
        self.set_auto_progress(id, false)
    }

    /// Re-include a mission in scheduler ticks.
    pub fn resume(&self, id: &MissionId) -> Result<(), EngineError> {
        self.set_auto_progress(id, true)
    }

    /// Snapshot of one mission.
    pub fn mission(&self, id: &MissionId) -> Result<Mission, EngineError> {
        let slot = self.slot(id)?;
        let mission = match slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(mission.clone())
    }

    /// Snapshot of one ship.
    pub fn ship(&self, id: &sim_core::ShipId) -> Result<Ship, EngineError> {
        self.ships.get(id)
    }

    /// Snapshot of one asteroid.
    pub fn asteroid(&self, id: &sim_core::AsteroidId) -> Result<Asteroid, EngineError> {
        self.asteroids.get(id)
    }

    /// Missions the tick scheduler should advance: active and unpaused.
    pub fn active_auto_missions(&self) -> Vec<MissionId> {
        let missions = match self.missions.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        missions
            .iter()
            .filter_map(|(id, slot)| {
                let mission = match slot.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                (mission.phase.is_active() && mission.auto_progress).then(|| id.clone())
            })
            .collect()
    }

    /// One mining day: compute the yield, clamp it, extract, load.
    fn mine_one_day(
        &self,
        mission: &mut Mission,
        ship: &Ship,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let asteroid = self.asteroids.get(&mission.asteroid_id)?;
        // Rated extraction: mining_power kg of ore per hour at grade 1.0.
        let base = Decimal::from(ship.mining_power) * Decimal::new(24, 0) * asteroid.class.ore_grade();
        let veteran = Decimal::from_f64(1.0 + ship.veteran_bonus).unwrap_or(Decimal::ONE);
        let variance = rng.gen_range(self.cfg.variance_min..=self.cfg.variance_max);
        let variance = Decimal::from_f64(variance)
            .unwrap_or(Decimal::ONE)
            .round_dp(4);
        let daily_yield = (base * veteran * variance).round_dp(2);

        let headroom = (ship.capacity_kg - mission.cargo_total()).max(Decimal::ZERO);
        let requested = daily_yield.min(headroom);
        if requested <= Decimal::ZERO {
            return Ok(());
        }
        let granted = self
            .asteroids
            .extract_proportional(&mission.asteroid_id, requested)?;
        for (element, kg) in granted {
            *mission.cargo.entry(element).or_insert(Decimal::ZERO) += kg;
        }
        Ok(())
    }

    /// Terminal failure from any active phase: hull is gone.
    fn fail_mission(
        &self,
        mission: &mut Mission,
        event: Option<MissionEvent>,
    ) -> Result<DayReport, EngineError> {
        mission.phase = Phase::Failed;
        mission.completed_at = Some(Utc::now());
        self.ships.mark_repairing(&mission.ship_id)?;
        // The repair yard bill for the accumulated damage is booked
        // against the mission that caused it.
        let damaged = self.ships.get(&mission.ship_id)?;
        mission.costs.repairs += sim_econ::repair_cost(
            damaged.hull_damage,
            self.cfg.repair_cost_per_point,
            self.cfg.max_repair_cost,
        );
        if let Some(loan_id) = &mission.loan_id {
            self.financing_guard().mark_defaulted(loan_id)?;
        }
        mission.costs.recompute_total();
        warn!(
            mission = %mission.id.0,
            day = mission.current_day,
            "hull integrity lost, mission failed"
        );
        Ok(report(mission, 0, event))
    }

    fn set_auto_progress(&self, id: &MissionId, value: bool) -> Result<(), EngineError> {
        let slot = self.slot(id)?;
        let mut mission = match slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        mission.auto_progress = value;
        Ok(())
    }

    fn slot(&self, id: &MissionId) -> Result<Arc<Mutex<Mission>>, EngineError> {
        let missions = match self.missions.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        missions
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownMission(id.clone()))
    }

    fn missions_write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, BTreeMap<MissionId, Arc<Mutex<Mission>>>> {
        match self.missions.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn financing_guard(&self) -> std::sync::MutexGuard<'_, FinancingLedger> {
        match self.financing.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Per-(mission, day) RNG: the hazard and yield draws of any day are
    /// a pure function of the configuration seed.
    fn day_rng(&self, id: &MissionId, day: u32) -> ChaCha8Rng {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let mission_hash = hasher.finish();
        let day_mix = u64::from(day).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        ChaCha8Rng::seed_from_u64(self.cfg.rng_seed ^ mission_hash ^ day_mix)
    }
}

fn enter_phase(mission: &mut Mission, phase: Phase) {
    info!(
        mission = %mission.id.0,
        day = mission.current_day,
        from = ?mission.phase,
        to = ?phase,
        "phase transition"
    );
    mission.phase = phase;
    mission.phase_day = 0;
}

fn report(mission: &Mission, hull: u32, event: Option<MissionEvent>) -> DayReport {
    DayReport {
        mission_id: mission.id.clone(),
        day: mission.current_day,
        phase: mission.phase,
        cargo_kg: mission.cargo_total(),
        costs_total: mission.costs.total,
        hull,
        event,
    }
}

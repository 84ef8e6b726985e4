//! Ship registry: shared mutable ship state behind one lock.
//!
//! The exclusive-assignment invariant lives here: `acquire_for_launch`
//! is a single check-and-set under the registry lock, so two missions can
//! never grab the same ship.

use crate::EngineError;
use rust_decimal::Decimal;
use sim_core::{validate_ship, Ship, ShipId, ShipLocation, ShipStatus};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Missions completed before a ship earns veteran status.
const VETERAN_THRESHOLD: u32 = 3;
/// Yield/resistance bonus granted with veteran status.
const VETERAN_BONUS: f64 = 0.15;

/// Registry of all ships known to the engine.
#[derive(Debug, Default)]
pub struct ShipRegistry {
    ships: Mutex<BTreeMap<ShipId, Ship>>,
}

impl ShipRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<ShipId, Ship>> {
        match self.ships.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a ship. Replaces any previous entry with the same id.
    pub fn insert(&self, ship: Ship) -> Result<(), EngineError> {
        validate_ship(&ship)?;
        self.guard().insert(ship.id.clone(), ship);
        Ok(())
    }

    /// Snapshot of one ship.
    pub fn get(&self, id: &ShipId) -> Result<Ship, EngineError> {
        self.guard()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownShip(id.clone()))
    }

    /// Atomic check-and-set for launch: `Available` -> `Active`/`EnRoute`.
    ///
    /// Fails with `ShipUnavailable` without touching any state when the
    /// ship is already assigned or under repair.
    pub fn acquire_for_launch(&self, id: &ShipId) -> Result<(), EngineError> {
        let mut ships = self.guard();
        let ship = ships
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownShip(id.clone()))?;
        if ship.status != ShipStatus::Available {
            return Err(EngineError::ShipUnavailable(id.clone()));
        }
        ship.status = ShipStatus::Active;
        ship.location = ShipLocation::EnRoute;
        info!(ship = %id.0, "ship acquired for launch");
        Ok(())
    }

    /// Mark arrival at the target asteroid.
    pub fn arrive_at_asteroid(&self, id: &ShipId) -> Result<(), EngineError> {
        self.with_ship(id, |ship| {
            ship.location = ShipLocation::Asteroid;
        })
    }

    /// Mark departure from the asteroid for the return leg.
    pub fn depart_for_earth(&self, id: &ShipId) -> Result<(), EngineError> {
        self.with_ship(id, |ship| {
            ship.location = ShipLocation::EnRoute;
        })
    }

    /// Release the ship after a completed round trip and update its record.
    ///
    /// Veteran status is earned once the completed-missions count crosses
    /// the threshold.
    pub fn complete_return(&self, id: &ShipId, round_trip_days: u32) -> Result<(), EngineError> {
        self.with_ship(id, |ship| {
            ship.status = ShipStatus::Available;
            ship.location = ShipLocation::Earth;
            ship.missions_completed += 1;
            ship.total_distance_traveled += round_trip_days;
            if !ship.veteran_status && ship.missions_completed >= VETERAN_THRESHOLD {
                ship.veteran_status = true;
                ship.veteran_bonus = VETERAN_BONUS;
                info!(ship = %id.0, "ship promoted to veteran");
            }
        })
    }

    /// Ground a lost ship for repair after a mission failure.
    pub fn mark_repairing(&self, id: &ShipId) -> Result<(), EngineError> {
        self.with_ship(id, |ship| {
            ship.status = ShipStatus::Repairing;
            ship.location = ShipLocation::Earth;
        })
    }

    /// Apply hull damage and return the remaining hull integrity.
    pub fn apply_damage(&self, id: &ShipId, damage: u32) -> Result<u32, EngineError> {
        let mut ships = self.guard();
        let ship = ships
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownShip(id.clone()))?;
        ship.hull = ship.hull.saturating_sub(damage);
        ship.hull_damage += damage;
        Ok(ship.hull)
    }

    /// Repair a docked ship: hull back to 100, damage cleared.
    ///
    /// Cost is proportional to accumulated damage, capped at `max_cost`.
    /// Only permitted for `Repairing` or `Available` ships.
    pub fn repair(
        &self,
        id: &ShipId,
        cost_per_point: Decimal,
        max_cost: Decimal,
    ) -> Result<Decimal, EngineError> {
        let mut ships = self.guard();
        let ship = ships
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownShip(id.clone()))?;
        if ship.status == ShipStatus::Active {
            return Err(EngineError::ShipUnavailable(id.clone()));
        }
        let cost = sim_econ::repair_cost(ship.hull_damage, cost_per_point, max_cost);
        ship.hull = 100;
        ship.hull_damage = 0;
        ship.status = ShipStatus::Available;
        info!(ship = %id.0, cost = %cost, "ship repaired");
        Ok(cost)
    }

    fn with_ship(
        &self,
        id: &ShipId,
        f: impl FnOnce(&mut Ship),
    ) -> Result<(), EngineError> {
        let mut ships = self.guard();
        let ship = ships
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownShip(id.clone()))?;
        f(ship);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship(id: &str) -> Ship {
        Ship {
            id: ShipId(id.to_string()),
            name: format!("MV {id}"),
            capacity_kg: Decimal::new(50_000, 0),
            mining_power: 50,
            hull: 100,
            hull_damage: 0,
            shield: 100,
            veteran_status: false,
            veteran_bonus: 0.0,
            status: ShipStatus::Available,
            location: ShipLocation::Earth,
            missions_completed: 0,
            total_distance_traveled: 0,
        }
    }

    #[test]
    fn double_acquire_is_rejected() {
        let registry = ShipRegistry::new();
        registry.insert(ship("s-1")).unwrap();
        let id = ShipId("s-1".to_string());
        registry.acquire_for_launch(&id).unwrap();
        assert!(matches!(
            registry.acquire_for_launch(&id),
            Err(EngineError::ShipUnavailable(_))
        ));
        // State from the failed attempt is unchanged.
        assert_eq!(registry.get(&id).unwrap().status, ShipStatus::Active);
    }

    #[test]
    fn complete_return_updates_record_and_promotes() {
        let registry = ShipRegistry::new();
        registry.insert(ship("s-1")).unwrap();
        let id = ShipId("s-1".to_string());
        for _ in 0..3 {
            registry.acquire_for_launch(&id).unwrap();
            registry.complete_return(&id, 10).unwrap();
        }
        let s = registry.get(&id).unwrap();
        assert_eq!(s.missions_completed, 3);
        assert_eq!(s.total_distance_traveled, 30);
        assert!(s.veteran_status);
        assert_eq!(s.veteran_bonus, VETERAN_BONUS);
        assert_eq!(s.status, ShipStatus::Available);
        assert_eq!(s.location, ShipLocation::Earth);
    }

    #[test]
    fn damage_saturates_at_zero_hull() {
        let registry = ShipRegistry::new();
        registry.insert(ship("s-1")).unwrap();
        let id = ShipId("s-1".to_string());
        assert_eq!(registry.apply_damage(&id, 60).unwrap(), 40);
        assert_eq!(registry.apply_damage(&id, 80).unwrap(), 0);
        let s = registry.get(&id).unwrap();
        assert_eq!(s.hull, 0);
        assert_eq!(s.hull_damage, 140);
    }

    #[test]
    fn repair_resets_hull_and_charges_capped_cost() {
        let registry = ShipRegistry::new();
        registry.insert(ship("s-1")).unwrap();
        let id = ShipId("s-1".to_string());
        registry.apply_damage(&id, 40).unwrap();
        registry.mark_repairing(&id).unwrap();
        let cost = registry
            .repair(
                &id,
                Decimal::new(1_000_000, 0),
                Decimal::new(25_000_000, 0),
            )
            .unwrap();
        assert_eq!(cost, Decimal::new(25_000_000, 0));
        let s = registry.get(&id).unwrap();
        assert_eq!(s.hull, 100);
        assert_eq!(s.hull_damage, 0);
        assert_eq!(s.status, ShipStatus::Available);
    }

    #[test]
    fn repair_rejected_while_active() {
        let registry = ShipRegistry::new();
        registry.insert(ship("s-1")).unwrap();
        let id = ShipId("s-1".to_string());
        registry.acquire_for_launch(&id).unwrap();
        assert!(matches!(
            registry.repair(
                &id,
                Decimal::new(1_000_000, 0),
                Decimal::new(25_000_000, 0)
            ),
            Err(EngineError::ShipUnavailable(_))
        ));
    }
}

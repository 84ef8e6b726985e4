//! Asteroid resource ledger: atomic clamp-and-decrement over remaining mass.
//!
//! Many missions may mine the same asteroid concurrently, so extraction is
//! a single decrement-and-distribute operation under the ledger lock that
//! returns the amount actually granted. Callers must never assume more was
//! extracted than the ledger handed back.

use crate::EngineError;
use rust_decimal::Decimal;
use sim_core::{validate_asteroid, Asteroid, AsteroidId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Ledger of all asteroids known to the engine.
#[derive(Debug, Default)]
pub struct AsteroidLedger {
    asteroids: Mutex<BTreeMap<AsteroidId, Asteroid>>,
}

impl AsteroidLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<AsteroidId, Asteroid>> {
        match self.asteroids.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an asteroid. Replaces any previous entry with the same id.
    pub fn insert(&self, asteroid: Asteroid) -> Result<(), EngineError> {
        validate_asteroid(&asteroid)?;
        self.guard().insert(asteroid.id.clone(), asteroid);
        Ok(())
    }

    /// Snapshot of one asteroid.
    pub fn get(&self, id: &AsteroidId) -> Result<Asteroid, EngineError> {
        self.guard()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAsteroid(id.clone()))
    }

    /// True when no element has remaining mass.
    pub fn is_exhausted(&self, id: &AsteroidId) -> Result<bool, EngineError> {
        Ok(self.get(id)?.is_exhausted())
    }

    /// Extract up to `amount_kg`, distributed across elements in proportion
    /// to their remaining mass, without ever exceeding any element's own
    /// remainder. Returns what was actually granted per element.
    ///
    /// When the proportional share of an element exceeds its remainder the
    /// shortfall is redistributed among the elements still available in the
    /// same call, so a mining day is never wasted by depletion alone. The
    /// whole operation happens under one lock: concurrent missions can
    /// never jointly over-extract.
    pub fn extract_proportional(
        &self,
        id: &AsteroidId,
        amount_kg: Decimal,
    ) -> Result<BTreeMap<String, Decimal>, EngineError> {
        let mut asteroids = self.guard();
        let asteroid = asteroids
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownAsteroid(id.clone()))?;

        let mut granted: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut outstanding = amount_kg.max(Decimal::ZERO);

        // Each pass distributes the outstanding amount over the elements
        // that still have mass; elements that run dry drop out and their
        // share rolls over to the next pass.
        while outstanding > Decimal::ZERO {
            let available: Vec<(String, Decimal)> = asteroid
                .elements
                .iter()
                .filter(|(_, mass)| **mass > Decimal::ZERO)
                .map(|(name, mass)| (name.clone(), *mass))
                .collect();
            if available.is_empty() {
                break;
            }
            let total_remaining: Decimal = available.iter().map(|(_, m)| *m).sum();

            let mut granted_this_pass = Decimal::ZERO;
            for (name, mass) in &available {
                // Division rounds, so shares are also clamped against
                // what is still outstanding; the per-call total stays
                // hard-bounded by the request.
                let share = (outstanding * *mass / total_remaining)
                    .min(*mass)
                    .min(outstanding - granted_this_pass);
                if share <= Decimal::ZERO {
                    continue;
                }
                if let Some(remaining) = asteroid.elements.get_mut(name) {
                    *remaining -= share;
                }
                *granted.entry(name.clone()).or_insert(Decimal::ZERO) += share;
                granted_this_pass += share;
            }
            if granted_this_pass <= Decimal::ZERO {
                // Rounding left nothing to hand out; stop rather than spin.
                break;
            }
            outstanding -= granted_this_pass;
        }

        debug!(
            asteroid = %id.0,
            requested = %amount_kg,
            granted = %granted.values().copied().sum::<Decimal>(),
            "ledger extraction"
        );
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::AsteroidClass;

    fn asteroid(id: &str, elements: &[(&str, i64)]) -> Asteroid {
        Asteroid {
            id: AsteroidId(id.to_string()),
            name: id.to_string(),
            class: AsteroidClass::M,
            elements: elements
                .iter()
                .map(|(n, kg)| (n.to_string(), Decimal::new(*kg, 0)))
                .collect(),
            diameter_m: 490.0,
            moid_days: 5,
            synthetic: false,
        }
    }

    #[test]
    fn extraction_is_proportional_to_remaining_mass() {
        let ledger = AsteroidLedger::new();
        ledger
            .insert(asteroid("a-1", &[("Iron", 9_000), ("Gold", 1_000)]))
            .unwrap();
        let id = AsteroidId("a-1".to_string());
        let granted = ledger
            .extract_proportional(&id, Decimal::new(1_000, 0))
            .unwrap();
        // 9:1 split between the two elements.
        assert_eq!(granted["Iron"], Decimal::new(900, 0));
        assert_eq!(granted["Gold"], Decimal::new(100, 0));
        let rest = ledger.get(&id).unwrap();
        assert_eq!(rest.elements["Iron"], Decimal::new(8_100, 0));
        assert_eq!(rest.elements["Gold"], Decimal::new(900, 0));
    }

    #[test]
    fn depleted_element_share_is_redistributed_same_call() {
        let ledger = AsteroidLedger::new();
        ledger
            .insert(asteroid("a-1", &[("Iron", 1_000), ("Gold", 10)]))
            .unwrap();
        let id = AsteroidId("a-1".to_string());
        let granted = ledger
            .extract_proportional(&id, Decimal::new(600, 0))
            .unwrap();
        let total: Decimal = granted.values().copied().sum();
        // Gold runs dry but the full 600 kg is still granted out of Iron.
        assert_eq!(total, Decimal::new(600, 0));
        assert!(granted["Gold"] <= Decimal::new(10, 0));
    }

    #[test]
    fn extraction_clamps_to_what_is_left() {
        let ledger = AsteroidLedger::new();
        ledger.insert(asteroid("a-1", &[("Gold", 50)])).unwrap();
        let id = AsteroidId("a-1".to_string());
        let granted = ledger
            .extract_proportional(&id, Decimal::new(10_000, 0))
            .unwrap();
        assert_eq!(granted["Gold"], Decimal::new(50, 0));
        assert!(ledger.is_exhausted(&id).unwrap());
        // Nothing more to grant afterwards.
        let empty = ledger
            .extract_proportional(&id, Decimal::new(1, 0))
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn rounded_shares_never_exceed_the_request() {
        // Three equal thirds: each share is a repeating decimal whose
        // 28-digit rounding drifts upward, so the unclamped sum would
        // come out above the request by an ulp.
        let ledger = AsteroidLedger::new();
        ledger
            .insert(asteroid("a-1", &[("Cobalt", 1), ("Gold", 1), ("Iron", 1)]))
            .unwrap();
        let id = AsteroidId("a-1".to_string());
        let request = Decimal::new(2, 0);
        let granted = ledger.extract_proportional(&id, request).unwrap();
        let total: Decimal = granted.values().copied().sum();
        assert!(total <= request, "granted {total} exceeds request {request}");
        for mass in ledger.get(&id).unwrap().elements.values() {
            assert!(*mass >= Decimal::ZERO);
        }
    }

    #[test]
    fn concurrent_extraction_never_over_extracts() {
        use std::sync::Arc;
        let ledger = Arc::new(AsteroidLedger::new());
        ledger.insert(asteroid("a-1", &[("Gold", 1_000)])).unwrap();
        let id = AsteroidId("a-1".to_string());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            let id = id.clone();
            handles.push(std::thread::spawn(move || {
                let mut mine = Decimal::ZERO;
                for _ in 0..50 {
                    let granted = ledger
                        .extract_proportional(&id, Decimal::new(7, 0))
                        .unwrap();
                    mine += granted.values().copied().sum::<Decimal>();
                }
                mine
            }));
        }
        let total: Decimal = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, Decimal::new(1_000, 0));
        assert!(ledger.is_exhausted(&id).unwrap());
    }

    proptest! {
        #[test]
        fn granted_never_exceeds_request_or_reserves(
            iron in 0i64..10_000,
            gold in 0i64..10_000,
            request in 0i64..30_000,
        ) {
            let ledger = AsteroidLedger::new();
            ledger
                .insert(asteroid("a-1", &[("Iron", iron), ("Gold", gold)]))
                .unwrap();
            let id = AsteroidId("a-1".to_string());
            let before = ledger.get(&id).unwrap().remaining_total();
            let granted = ledger
                .extract_proportional(&id, Decimal::new(request, 0))
                .unwrap();
            let total: Decimal = granted.values().copied().sum();
            prop_assert!(total <= Decimal::new(request, 0));
            prop_assert!(total <= before);
            let after = ledger.get(&id).unwrap().remaining_total();
            prop_assert_eq!(before - total, after);
            for mass in ledger.get(&id).unwrap().elements.values() {
                prop_assert!(*mass >= Decimal::ZERO);
            }
        }
    }
}

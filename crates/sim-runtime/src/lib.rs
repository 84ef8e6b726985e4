#![deny(warnings)]

//! Tick scheduler driving auto-progress missions.
//!
//! Each tick advances every active, unpaused mission by one day on its
//! own task. Missions are isolated: one mission's error is logged and
//! never blocks or aborts the rest of the batch. By construction a
//! mission is advanced at most once per tick.

use sim_core::MissionId;
use sim_engine::{DayReport, EngineError, MissionEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Periodic driver for the mission engine.
pub struct TickScheduler {
    engine: Arc<MissionEngine>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TickScheduler {
    /// Scheduler ticking at a fixed wall-clock interval.
    pub fn new(engine: Arc<MissionEngine>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine,
            interval,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Signal the run loop to stop after the tick in flight.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Advance every active auto-progress mission by one day.
    ///
    /// Spawns one task per mission and joins the whole batch. Returns
    /// the day reports of the missions that advanced; failures are
    /// logged and dropped from the batch.
    pub async fn tick_once(&self) -> Vec<DayReport> {
        let ids = self.engine.active_auto_missions();
        if ids.is_empty() {
            return Vec::new();
        }
        debug!(missions = ids.len(), "tick started");

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let engine = Arc::clone(&self.engine);
            handles.push(tokio::spawn(async move {
                (id.clone(), engine.advance_day(&id))
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((_, Ok(report))) => reports.push(report),
                Ok((id, Err(err))) => log_tick_error(&id, &err),
                Err(join_err) => warn!(error = %join_err, "mission task panicked"),
            }
        }
        reports
    }

    /// Run ticks until shutdown is signalled or no active mission remains.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_ms = self.interval.as_millis() as u64, "scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once().await;
                    if self.engine.active_auto_missions().is_empty() {
                        info!("no active missions left, scheduler stopping");
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutdown requested");
                        return;
                    }
                }
            }
        }
    }
}

fn log_tick_error(id: &MissionId, err: &EngineError) {
    match err {
        // Expected under contention: the caller simply retries next tick.
        EngineError::ConcurrencyConflict(_) => {
            debug!(mission = %id.0, "advance skipped, already in flight")
        }
        other => warn!(mission = %id.0, error = %other, "advance failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sim_core::{
        Asteroid, AsteroidClass, AsteroidId, Mission, MissionCosts, Phase, Ship, ShipId,
        ShipLocation, ShipStatus, SimConfig, UserId,
    };
    use sim_econ::FixedPriceOracle;
    use sim_events::HazardTable;
    use std::collections::BTreeMap;

    fn engine_with_missions(n: usize) -> (Arc<MissionEngine>, Vec<MissionId>) {
        let engine = Arc::new(
            MissionEngine::new(
                SimConfig::default(),
                HazardTable::disabled(),
                Box::new(FixedPriceOracle::default()),
            )
            .unwrap(),
        );
        let mut elements = BTreeMap::new();
        elements.insert("Gold".to_string(), Decimal::new(1_000_000, 0));
        let rock = Asteroid {
            id: AsteroidId("a-1".to_string()),
            name: "a-1".to_string(),
            class: AsteroidClass::M,
            elements,
            diameter_m: 490.0,
            moid_days: 5,
            synthetic: true,
        };
        engine.asteroids().insert(rock.clone()).unwrap();

        let mut ids = Vec::new();
        for i in 0..n {
            let ship = Ship {
                id: ShipId(format!("s-{i}")),
                name: format!("MV {i}"),
                capacity_kg: Decimal::new(1_000, 0),
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
            };
            engine.ships().insert(ship).unwrap();
            let mission = Mission {
                id: MissionId(format!("m-{i}")),
                name: format!("run {i}"),
                user_id: UserId("u-1".to_string()),
                ship_id: ShipId(format!("s-{i}")),
                asteroid_id: rock.id.clone(),
                loan_id: None,
                phase: Phase::LaunchReady,
                current_day: 0,
                phase_day: 0,
                travel_days: 5,
                mining_days: 10,
                mining_setup_days: 3,
                cargo_loading_days: 2,
                total_days: 0,
                delay_days: 0,
                cargo: BTreeMap::new(),
                costs: MissionCosts::default(),
                events: vec![],
                auto_progress: true,
                final_results: None,
                created_at: chrono::Utc::now(),
                completed_at: None,
            };
            let id = mission.id.clone();
            engine.admit(mission).unwrap();
            engine.launch(&id).unwrap();
            ids.push(id);
        }
        (engine, ids)
    }

    #[tokio::test]
    async fn tick_advances_every_active_mission_once() {
        let (engine, ids) = engine_with_missions(3);
        let scheduler = TickScheduler::new(Arc::clone(&engine), Duration::from_millis(1));
        let reports = scheduler.tick_once().await;
        assert_eq!(reports.len(), 3);
        for id in &ids {
            assert_eq!(engine.mission(id).unwrap().current_day, 1);
        }
    }

    #[tokio::test]
    async fn paused_missions_are_skipped() {
        let (engine, ids) = engine_with_missions(2);
        engine.pause(&ids[0]).unwrap();
        let scheduler = TickScheduler::new(Arc::clone(&engine), Duration::from_millis(1));
        let reports = scheduler.tick_once().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(engine.mission(&ids[0]).unwrap().current_day, 0);
        assert_eq!(engine.mission(&ids[1]).unwrap().current_day, 1);
    }

    #[tokio::test]
    async fn run_drains_missions_to_completion() {
        let (engine, ids) = engine_with_missions(2);
        let scheduler = TickScheduler::new(Arc::clone(&engine), Duration::from_millis(1));
        scheduler.run().await;
        for id in &ids {
            assert_eq!(engine.mission(id).unwrap().phase, Phase::Completed);
        }
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (engine, ids) = engine_with_missions(1);
        let scheduler = Arc::new(TickScheduler::new(
            Arc::clone(&engine),
            Duration::from_secs(3600),
        ));
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };
        // First immediate tick fires, then the loop idles on the long interval.
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown();
        runner.await.unwrap();
        assert!(engine.mission(&ids[0]).unwrap().current_day <= 1);
    }
}

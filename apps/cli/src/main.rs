#![deny(warnings)]

//! Headless scenario runner: builds a demo fleet, launches missions and
//! drives them to settlement.

use anyhow::Result;
use rust_decimal::Decimal;
use sim_core::*;
use sim_econ::FixedPriceOracle;
use sim_engine::MissionEngine;
use sim_events::HazardTable;
use sim_runtime::TickScheduler;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    days: Option<u32>,
    seed: u64,
    interval_ms: u64,
    summary_json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        days: None,
        seed: 42,
        interval_ms: 10,
        summary_json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--seed" => {
                if let Some(seed) = it.next().and_then(|s| s.parse().ok()) {
                    args.seed = seed;
                }
            }
            "--interval-ms" => {
                if let Some(ms) = it.next().and_then(|s| s.parse().ok()) {
                    args.interval_ms = ms;
                }
            }
            "--summary-json" => args.summary_json = true,
            _ => {}
        }
    }
    args
}

fn demo_ship(id: &str, name: &str, capacity_kg: i64, mining_power: u32) -> Ship {
    Ship {
        id: ShipId(id.to_string()),
        name: name.to_string(),
        capacity_kg: Decimal::new(capacity_kg, 0),
        mining_power,
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

fn demo_asteroid(
    id: &str,
    class: AsteroidClass,
    moid_days: u32,
    composition: &[(&str, i64)],
) -> Asteroid {
    Asteroid {
        id: AsteroidId(id.to_string()),
        name: id.to_string(),
        class,
        elements: composition
            .iter()
            .map(|(name, kg)| (name.to_string(), Decimal::new(*kg, 0)))
            .collect(),
        diameter_m: 500.0,
        moid_days,
        synthetic: true,
    }
}

fn demo_mission(
    id: &str,
    name: &str,
    ship: &ShipId,
    asteroid: &Asteroid,
    mining_days: u32,
    loan_id: Option<LoanId>,
) -> Mission {
    let cfg = SimConfig::default();
    Mission {
        id: MissionId(id.to_string()),
        name: name.to_string(),
        user_id: UserId("demo".to_string()),
        ship_id: ship.clone(),
        asteroid_id: asteroid.id.clone(),
        loan_id,
        phase: Phase::LaunchReady,
        current_day: 0,
        phase_day: 0,
        travel_days: asteroid.moid_days,
        mining_days,
        mining_setup_days: cfg.mining_setup_days,
        cargo_loading_days: cfg.cargo_loading_days,
        total_days: 0,
        delay_days: 0,
        cargo: BTreeMap::new(),
        costs: MissionCosts::default(),
        events: vec![],
        auto_progress: true,
        final_results: None,
        created_at: chrono::Utc::now(),
        completed_at: None,
    }
}

fn build_world(engine: &MissionEngine) -> Result<Vec<MissionId>> {
    engine
        .ships()
        .insert(demo_ship("s-1", "MV Prospector", 50_000, 60))?;
    engine
        .ships()
        .insert(demo_ship("s-2", "MV Regolith", 25_000, 45))?;

    let bennu = demo_asteroid(
        "101955 Bennu",
        AsteroidClass::C,
        6,
        &[("Iron", 40_000_000), ("Nickel", 8_000_000), ("Cobalt", 900_000)],
    );
    let psyche = demo_asteroid(
        "16 Psyche",
        AsteroidClass::M,
        12,
        &[
            ("Iron", 90_000_000),
            ("Nickel", 20_000_000),
            ("Gold", 120_000),
            ("Platinum", 450_000),
        ],
    );
    engine.asteroids().insert(bennu.clone())?;
    engine.asteroids().insert(psyche.clone())?;

    let loan = engine.create_loan(Decimal::new(5_000_000, 0), Decimal::new(8, 0), 60);

    let m1 = demo_mission(
        "m-1",
        "Psyche prospect",
        &ShipId("s-1".to_string()),
        &psyche,
        20,
        Some(loan.id),
    );
    let m2 = demo_mission(
        "m-2",
        "Bennu survey",
        &ShipId("s-2".to_string()),
        &bennu,
        15,
        None,
    );
    let ids = vec![m1.id.clone(), m2.id.clone()];
    engine.admit(m1)?;
    engine.admit(m2)?;
    for id in &ids {
        engine.launch(id)?;
    }
    Ok(ids)
}

fn print_summary(engine: &MissionEngine, ids: &[MissionId], as_json: bool) -> Result<()> {
    for id in ids {
        let mission = engine.mission(id)?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&mission)?);
            continue;
        }
        println!(
            "{} | phase: {:?} | day: {}/{} | cargo: {} kg | costs: ${}",
            mission.name,
            mission.phase,
            mission.current_day,
            mission.total_days,
            mission.cargo_total().round_dp(1),
            mission.costs.total.round_dp(2),
        );
        if let Some(results) = &mission.final_results {
            println!(
                "  settled | value: ${} | profit: ${} | ROI: {}% | loan payoff: ${}",
                results.cargo_value.round_dp(2),
                results.net_profit.round_dp(2),
                results.roi_percentage.round_dp(1),
                results.loan_payoff.round_dp(2),
            );
        }
        for event in &mission.events {
            println!(
                "  day {:>3} | {} | cost ${} | delay {}d | hull -{}",
                event.day, event.description, event.cost, event.impact_days, event.hull_damage
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        days = ?args.days,
        seed = args.seed,
        interval_ms = args.interval_ms,
        "starting scenario runner"
    );

    let cfg = SimConfig {
        rng_seed: args.seed,
        ..SimConfig::default()
    };
    let engine = Arc::new(MissionEngine::new(
        cfg,
        HazardTable::default(),
        Box::new(FixedPriceOracle::default()),
    )?);
    let ids = build_world(&engine)?;

    match args.days {
        // Bounded run: advance every mission directly, day by day.
        Some(days) => {
            for _ in 0..days {
                for id in &ids {
                    engine.advance_day(id)?;
                }
            }
        }
        // Open-ended run: let the scheduler drain the missions.
        None => {
            let scheduler =
                TickScheduler::new(Arc::clone(&engine), Duration::from_millis(args.interval_ms));
            scheduler.run().await;
        }
    }

    for id in &ids {
        if engine.mission(id)?.phase == Phase::Completed {
            let results = engine.sell_cargo(id)?;
            info!(
                mission = %id.0,
                net_profit = %results.net_profit.round_dp(2),
                "cargo sold"
            );
        }
    }

    print_summary(&engine, &ids, args.summary_json)?;
    Ok(())
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use sim_core::{
    Asteroid, AsteroidClass, AsteroidId, Mission, MissionCosts, MissionId, Phase, Ship, ShipId,
    ShipLocation, ShipStatus, SimConfig, UserId,
};
use sim_econ::FixedPriceOracle;
use sim_engine::MissionEngine;
use sim_events::HazardTable;
use std::collections::BTreeMap;

fn build_engine(n_missions: usize) -> (MissionEngine, Vec<MissionId>) {
    let engine = MissionEngine::new(
        SimConfig::default(),
        HazardTable::default(),
        Box::new(FixedPriceOracle::default()),
    )
    .unwrap();

    let mut elements = BTreeMap::new();
    elements.insert("Gold".into(), Decimal::new(5_000_000, 0));
    elements.insert("Platinum".into(), Decimal::new(20_000_000, 0));
    elements.insert("Iron".into(), Decimal::new(500_000_000, 0));
    let rock = Asteroid {
        id: AsteroidId("16 Psyche".into()),
        name: "16 Psyche".into(),
        class: AsteroidClass::M,
        elements,
        diameter_m: 226_000.0,
        moid_days: 30,
        synthetic: false,
    };
    engine.asteroids().insert(rock.clone()).unwrap();

    let mut ids = Vec::with_capacity(n_missions);
    for i in 0..n_missions {
        let ship = Ship {
            id: ShipId(format!("s-{i}")),
            name: format!("MV Prospector {i}"),
            capacity_kg: Decimal::new(50_000, 0),
            mining_power: 60,
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
            name: format!("Psyche run {i}"),
            user_id: UserId("bench".into()),
            ship_id: ShipId(format!("s-{i}")),
            asteroid_id: rock.id.clone(),
            loan_id: None,
            phase: Phase::LaunchReady,
            current_day: 0,
            phase_day: 0,
            travel_days: 30,
            mining_days: 20,
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

fn bench_daily_tick(c: &mut Criterion) {
    c.bench_function("advance 10 missions x 85 days", |b| {
        b.iter(|| {
            let (engine, ids) = build_engine(10);
            for _ in 0..85 {
                for id in &ids {
                    let _ = black_box(engine.advance_day(id));
                }
            }
        })
    });
}

criterion_group!(benches, bench_daily_tick);
criterion_main!(benches);

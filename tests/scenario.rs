//! End-to-end runs of the full frame loop.

use glam::DVec2;
use rbmk_particle_sim_lib::{FrameInput, ReactorSimulator, ReactorTotals, SimulationConfig};

const FRAME_MS: f64 = 16.67;

fn seeded(seed: u64) -> SimulationConfig {
    SimulationConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

fn assert_totals_grew(prev: &ReactorTotals, next: &ReactorTotals) {
    assert!(next.emitted >= prev.emitted);
    assert!(next.injected >= prev.injected);
    assert!(next.fissions >= prev.fissions);
    assert!(next.captures >= prev.captures);
    assert!(next.rod_absorbed >= prev.rod_absorbed);
    assert!(next.water_absorbed >= prev.water_absorbed);
    assert!(next.leaked >= prev.leaked);
    assert!(next.expired >= prev.expired);
    assert!(next.absorbed() >= prev.absorbed());
}

fn assert_bounded(sim: &ReactorSimulator) {
    let unit = 0.0..=1.0;
    for atom in sim.atoms() {
        assert!(unit.contains(&atom.energy), "energy {}", atom.energy);
        assert!(unit.contains(&atom.integrity));
        assert!(unit.contains(&atom.xenon));
    }
    for rod in sim.rods() {
        assert!(unit.contains(&rod.insertion));
        assert!(unit.contains(&rod.health));
    }
    assert!(sim.field().water().iter().all(|w| unit.contains(w)));
    assert!(sim.field().temperature().iter().all(|t| unit.contains(t)));
    assert!(sim.neutrons().len() <= sim.config().neutrons.max_count);
}

#[test]
fn chain_reaction_runs_for_ten_seconds() {
    for seed in [1, 2, 3] {
        let mut sim = ReactorSimulator::new(seeded(seed)).unwrap();
        assert_eq!(sim.atoms().len(), 400);
        assert_eq!(sim.rods().len(), 10);
        assert_eq!(sim.neutrons().len(), 15);

        let input = FrameInput {
            dt_ms: FRAME_MS,
            running: Some(true),
            ..Default::default()
        };

        let mut prev = sim.totals();
        for _ in 0..600 {
            assert!(sim.tick(&input));
            assert_bounded(&sim);
            let next = sim.totals();
            assert_totals_grew(&prev, &next);
            prev = next;
        }

        let metrics = sim.metrics();
        assert!(metrics.neutron_count <= sim.config().neutrons.max_count);
        assert!(sim.totals().fissions > 0, "seed {} never fissioned", seed);
        assert!(metrics.avg_temperature.is_finite());
        assert!(metrics.void_fraction.is_finite());
        assert!(metrics.pressure.is_finite());
        assert!((sim.time_ms() - 600.0 * FRAME_MS).abs() < 1e-6);
    }
}

#[test]
fn scram_drives_every_rod_home() {
    let mut sim = ReactorSimulator::new(seeded(4)).unwrap();
    for _ in 0..120 {
        sim.step(FRAME_MS);
    }

    sim.scram();
    for _ in 0..900 {
        sim.step(FRAME_MS);
    }

    assert!(sim.rods().iter().all(|r| r.insertion == 1.0));
    assert!(sim.rods().iter().all(|r| r.target_insertion == 1.0));
    assert_eq!(sim.metrics().avg_rod_insertion, 1.0);
    assert!(sim.alerts().iter().any(|a| a.contains("SCRAM")));
}

#[test]
fn injected_burst_starts_reactions() {
    let mut config = seeded(5);
    config.initial_neutrons = 0;
    let mut sim = ReactorSimulator::new(config).unwrap();
    assert!(sim.neutrons().is_empty());

    // Lower half of the core, below every rod tip
    sim.inject_neutrons(DVec2::new(315.0, 590.0), 50);
    for _ in 0..120 {
        sim.step(FRAME_MS);
    }
    assert!(sim.totals().fissions + sim.totals().captures > 0);
}

#[test]
fn empty_core_cools_back_down() {
    let mut config = seeded(6);
    config.initial_neutrons = 0;
    config.atoms.initial_energy = 0.0;
    let mut sim = ReactorSimulator::new(config).unwrap();

    for _ in 0..300 {
        sim.step(FRAME_MS);
    }
    let metrics = sim.metrics();
    assert_eq!(metrics.avg_temperature, 0.0);
    assert_eq!(metrics.void_fraction, 0.0);
    assert_eq!(sim.totals(), ReactorTotals::default());
}

#[test]
fn sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/reactor.json");
    let config = SimulationConfig::load(path).unwrap();
    assert_eq!(config.lattice.rows, 20);
    assert_eq!(config.rods.count, 10);
    assert_eq!(config.initial_neutrons, 15);
    assert!(config.seed.is_none());
    // Keys absent from the file keep their defaults
    assert_eq!(config.atoms.neutron_yield, SimulationConfig::default().atoms.neutron_yield);
}

//! RBMK Reactor Simulation State
//!
//! This module owns the whole simulation and drives one frame at a time:
//!
//! atoms -> rods -> heat/water field -> neutron motion -> age culling ->
//! collisions -> coolant absorption -> wall reflection -> metrics.
//!
//! Renderers get an owned [`ReactorSnapshot`] (or borrow the state through
//! the read-only accessors); control inputs are applied between frames.

use glam::DVec2;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::atom::{AtomId, FuelAtom};
use crate::collision::resolve_collisions;
use crate::config::{SimulationConfig, BASELINE_FRAME_MS};
use crate::error::{ReactorError, ReactorResult};
use crate::field::ThermalField;
use crate::neutron::{Neutron, NeutronId, NeutronIds, WallContact};
use crate::rod::{ControlRod, RodId};
use crate::spatial::SpatialGrid;

/// Alert limits
pub mod limits {
    pub const TEMPERATURE_HIGH: f64 = 0.7;
    pub const VOID_HIGH: f64 = 0.5;
    pub const PRESSURE_HIGH_MPA: f64 = 10.0;
    pub const FUEL_INTEGRITY_LOW: f64 = 0.5;
    pub const ROD_HEALTH_LOW: f64 = 0.5;
}

/// Aggregate readouts, recomputed after every frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactorMetrics {
    pub neutron_count: usize,
    /// Neutrons emitted by atoms during the last frame, per second of
    /// simulated time. A production rate, not the live population divided
    /// by elapsed time; see `neutron_count` for the population.
    pub reaction_rate: f64,
    pub avg_temperature: f64,
    pub void_fraction: f64,
    pub pressure: f64, // [MPa]
    pub avg_xenon: f64,
    pub avg_integrity: f64,
    pub avg_rod_insertion: f64,
}

/// Lifetime counters; every field only ever grows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorTotals {
    pub emitted: u64,
    pub injected: u64,
    pub fissions: u64,
    pub captures: u64,
    pub rod_absorbed: u64,
    pub water_absorbed: u64,
    pub leaked: u64,
    pub expired: u64,
}

impl ReactorTotals {
    /// Neutrons absorbed by rods or by atoms without fission
    pub fn absorbed(&self) -> u64 {
        self.rod_absorbed + self.captures
    }
}

/// Neutrons dropped into the core by the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NeutronBurst {
    pub position: DVec2,
    pub count: usize,
}

/// External inputs applied right before a frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    pub dt_ms: f64,
    /// Target insertion per rod, by rod index
    pub rod_targets: Option<Vec<f64>>,
    pub burst: Option<NeutronBurst>,
    pub running: Option<bool>,
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomView {
    pub id: AtomId,
    pub position: DVec2,
    pub energy: f64,
    pub integrity: f64,
    pub xenon: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RodView {
    pub id: RodId,
    pub x: f64,
    pub width: f64,
    pub tip: f64,
    pub insertion: f64,
    pub target_insertion: f64,
    pub is_absorbing: bool,
    pub health: f64,
    pub absorbed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutronView {
    pub id: NeutronId,
    pub position: DVec2,
    pub trail: Vec<DVec2>,
}

/// Everything a renderer or dashboard needs for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorSnapshot {
    pub time_ms: f64,
    pub frame: u64,
    pub running: bool,
    pub scram_active: bool,
    pub vessel_width: f64,
    pub vessel_height: f64,
    pub atoms: Vec<AtomView>,
    pub rods: Vec<RodView>,
    pub neutrons: Vec<NeutronView>,
    pub heat: Array2<f64>,
    pub water: Array2<f64>,
    pub metrics: ReactorMetrics,
    pub totals: ReactorTotals,
    pub alerts: Vec<String>,
}

/// Reactor simulation engine
pub struct ReactorSimulator {
    config: SimulationConfig,
    atoms: Vec<FuelAtom>,
    rods: Vec<ControlRod>,
    neutrons: Vec<Neutron>, // Spawn order, oldest first
    field: ThermalField,
    index: SpatialGrid,
    ids: NeutronIds,
    rng: StdRng,
    totals: ReactorTotals,
    metrics: ReactorMetrics,
    alerts: Vec<String>,
    time_ms: f64,
    frame: u64,
    running: bool,
    speed: f64,
    scram_active: bool,
    overrides_ignored: bool, // Ignored rod overrides already reported for this SCRAM
}

impl ReactorSimulator {
    /// Validate the configuration and lay out the initial core
    pub fn new(config: SimulationConfig) -> ReactorResult<Self> {
        config.validate()?;

        let width = config.vessel_width();
        let height = config.vessel_height();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut simulator = Self {
            atoms: build_atoms(&config),
            rods: build_rods(&config),
            neutrons: Vec::with_capacity(config.neutrons.max_count),
            field: ThermalField::new(width, height, config.thermal.cell_size)?,
            index: SpatialGrid::new(width, height, config.lattice.spacing),
            ids: NeutronIds::default(),
            rng,
            totals: ReactorTotals::default(),
            metrics: ReactorMetrics::default(),
            alerts: Vec::new(),
            time_ms: 0.0,
            frame: 0,
            running: true,
            speed: config.simulation_speed,
            scram_active: false,
            overrides_ignored: false,
            config,
        };
        simulator.index.rebuild(simulator.atoms.iter().map(|a| a.position));

        for _ in 0..simulator.config.initial_neutrons {
            let position = DVec2::new(
                simulator.rng.gen_range(0.0..width),
                simulator.rng.gen_range(0.0..height),
            );
            simulator.spawn_neutron(position);
        }
        simulator.enforce_population_cap();
        simulator.update_metrics(0, 0.0);

        log::debug!(
            "Reactor initialised: {} atoms, {} rods, {} seed neutrons, field {:?}",
            simulator.atoms.len(),
            simulator.rods.len(),
            simulator.neutrons.len(),
            simulator.field.dim()
        );
        Ok(simulator)
    }

    /// Rebuild the initial core from the same configuration
    pub fn reset(&mut self) -> ReactorResult<()> {
        *self = Self::new(self.config.clone())?;
        log::info!("Simulation reset");
        Ok(())
    }

    /// Apply inputs, then advance one frame if the simulation is running.
    /// Returns whether a frame was stepped.
    pub fn tick(&mut self, input: &FrameInput) -> bool {
        self.apply_input(input);
        if !self.running {
            return false;
        }
        self.step(input.dt_ms * self.speed);
        true
    }

    pub fn apply_input(&mut self, input: &FrameInput) {
        if let Some(running) = input.running {
            self.set_running(running);
        }
        if let Some(speed) = input.speed {
            self.set_speed(speed);
        }
        if let Some(targets) = &input.rod_targets {
            if targets.len() != self.rods.len() {
                log::warn!(
                    "Got {} rod targets for {} rods; extra entries are ignored",
                    targets.len(),
                    self.rods.len()
                );
            }
            if self.scram_active {
                if !self.overrides_ignored {
                    log::warn!("SCRAM active, ignoring rod target overrides until reset");
                    self.overrides_ignored = true;
                }
            } else {
                for (rod, &target) in self.rods.iter_mut().zip(targets) {
                    rod.set_target(target);
                }
            }
        }
        if let Some(burst) = input.burst {
            self.inject_neutrons(burst.position, burst.count);
        }
    }

    /// Perform one simulation frame of `dt_ms` simulated milliseconds
    pub fn step(&mut self, dt_ms: f64) {
        if !(dt_ms.is_finite() && dt_ms > 0.0) {
            return;
        }
        let frame_scale = dt_ms / BASELINE_FRAME_MS;
        self.time_ms += dt_ms;
        self.frame += 1;

        // Atoms may emit neutrons
        let mut emitted = 0usize;
        for atom in &mut self.atoms {
            let local = self.field.temperature_at(atom.position);
            let born = atom.update(
                dt_ms,
                frame_scale,
                local,
                &self.config.atoms,
                &self.config.neutrons,
                &mut self.ids,
                &mut self.rng,
            );
            emitted += born.len();
            self.neutrons.extend(born);
        }
        self.totals.emitted += emitted as u64;
        self.enforce_population_cap();

        for rod in &mut self.rods {
            let tip_temperature = self.field.temperature_at(DVec2::new(rod.x, rod.tip()));
            rod.update(dt_ms, frame_scale, self.time_ms, tip_temperature, &self.config.rods);
        }

        self.field.step(
            self.atoms.iter().map(|a| (a.position, a.energy)),
            &self.config.thermal,
            frame_scale,
        );

        let trail_length = self.config.neutrons.trail_length;
        for neutron in &mut self.neutrons {
            neutron.integrate(dt_ms, trail_length);
        }

        let max_age = self.config.neutrons.max_age_ms;
        let before = self.neutrons.len();
        self.neutrons.retain(|n| !n.is_expired(max_age));
        self.totals.expired += (before - self.neutrons.len()) as u64;

        self.index.rebuild(self.atoms.iter().map(|a| a.position));
        let outcome = resolve_collisions(
            std::mem::take(&mut self.neutrons),
            &mut self.rods,
            &mut self.atoms,
            &self.index,
            &self.config,
            self.time_ms,
            &mut self.rng,
        );
        self.neutrons = outcome.remaining;
        self.totals.fissions += outcome.fissions;
        self.totals.captures += outcome.captures;
        self.totals.rod_absorbed += outcome.rod_absorptions;

        self.absorb_in_coolant(frame_scale);
        self.reflect_off_walls();

        self.update_metrics(emitted, dt_ms);
        self.update_alerts();
    }

    fn absorb_in_coolant(&mut self, frame_scale: f64) {
        let probability = self.config.neutrons.water_absorption_probability;
        if probability <= 0.0 {
            return;
        }
        let field = &self.field;
        let rng = &mut self.rng;
        let before = self.neutrons.len();
        self.neutrons
            .retain(|n| rng.gen::<f64>() >= probability * field.water_at(n.position) * frame_scale);
        self.totals.water_absorbed += (before - self.neutrons.len()) as u64;
    }

    fn reflect_off_walls(&mut self) {
        let width = self.config.vessel_width();
        let height = self.config.vessel_height();
        let restitution = self.config.neutrons.wall_restitution;
        let max_bounces = self.config.neutrons.max_bounces;

        let before = self.neutrons.len();
        self.neutrons
            .retain_mut(|n| n.reflect(width, height, restitution, max_bounces) != WallContact::Escaped);
        self.totals.leaked += (before - self.neutrons.len()) as u64;
    }

    /// Drop the oldest neutrons beyond the configured maximum
    fn enforce_population_cap(&mut self) {
        let max = self.config.neutrons.max_count;
        if self.neutrons.len() > max {
            let excess = self.neutrons.len() - max;
            self.neutrons.drain(..excess);
            log::trace!("Neutron cap reached, dropped {} oldest", excess);
        }
    }

    fn spawn_neutron(&mut self, position: DVec2) {
        let params = &self.config.neutrons;
        let direction = DVec2::from_angle(self.rng.gen::<f64>() * std::f64::consts::TAU);
        let variation = params.speed_variation * (self.rng.gen::<f64>() * 2.0 - 1.0);
        let neutron = Neutron::new(
            self.ids.next_id(),
            position,
            direction,
            params.speed * (1.0 + variation),
            params.radius,
        );
        self.neutrons.push(neutron);
    }

    fn update_metrics(&mut self, emitted: usize, dt_ms: f64) {
        let atom_count = self.atoms.len().max(1) as f64;
        let rod_count = self.rods.len().max(1) as f64;

        self.metrics = ReactorMetrics {
            neutron_count: self.neutrons.len(),
            reaction_rate: if dt_ms > 0.0 {
                emitted as f64 / (dt_ms / 1000.0)
            } else {
                0.0
            },
            avg_temperature: self.field.average_temperature(),
            void_fraction: self.field.average_void(),
            pressure: self.field.pressure(&self.config.thermal),
            avg_xenon: self.atoms.iter().map(|a| a.xenon).sum::<f64>() / atom_count,
            avg_integrity: self.atoms.iter().map(|a| a.integrity).sum::<f64>() / atom_count,
            avg_rod_insertion: self.rods.iter().map(|r| r.insertion).sum::<f64>() / rod_count,
        };
    }

    fn update_alerts(&mut self) {
        let metrics = &self.metrics;
        let mut alerts = Vec::new();

        if self.scram_active {
            alerts.push("SCRAM ACTIVE".to_string());
        }
        if metrics.avg_temperature > limits::TEMPERATURE_HIGH {
            alerts.push("WARNING: Core temperature exceeds limit!".to_string());
        }
        if metrics.void_fraction > limits::VOID_HIGH {
            alerts.push("WARNING: High void fraction - positive reactivity feedback!".to_string());
        }
        if metrics.pressure > limits::PRESSURE_HIGH_MPA {
            alerts.push(format!("WARNING: Vessel pressure {:.1} MPa", metrics.pressure));
        }
        if self.atoms.iter().any(|a| a.integrity < limits::FUEL_INTEGRITY_LOW) {
            alerts.push("WARNING: Fuel damage detected!".to_string());
        }
        if self.rods.iter().any(|r| r.health < limits::ROD_HEALTH_LOW) {
            alerts.push("WARNING: Control rod damage detected!".to_string());
        }
        if metrics.neutron_count >= self.config.neutrons.max_count {
            alerts.push("CRITICAL: Neutron population at cap - runaway chain reaction!".to_string());
        }

        for alert in &alerts {
            if !self.alerts.contains(alert) {
                log::warn!("{}", alert);
            }
        }
        self.alerts = alerts;
    }

    /// Initiate emergency SCRAM: drive every rod to full insertion
    pub fn scram(&mut self) {
        for rod in &mut self.rods {
            rod.set_target(1.0);
        }
        if !self.scram_active {
            self.scram_active = true;
            log::info!("SCRAM initiated at t={:.0} ms", self.time_ms);
        }
    }

    /// Release the SCRAM latch; rods stay where they are until moved
    pub fn reset_scram(&mut self) {
        self.scram_active = false;
        self.overrides_ignored = false;
    }

    /// Set one rod's target insertion
    pub fn move_rod(&mut self, rod_id: usize, target: f64) -> ReactorResult<()> {
        let rod = self
            .rods
            .get_mut(rod_id)
            .ok_or(ReactorError::UnknownRod(rod_id))?;
        if self.scram_active {
            log::warn!("SCRAM active, ignoring move of rod {}", rod_id);
            return Ok(());
        }
        rod.set_target(target);
        log::debug!("Rod {} target -> {:.2}", rod_id, rod.target_insertion);
        Ok(())
    }

    /// Set every rod's target insertion
    pub fn move_all_rods(&mut self, target: f64) {
        if self.scram_active {
            log::warn!("SCRAM active, ignoring group rod move");
            return;
        }
        for rod in &mut self.rods {
            rod.set_target(target);
        }
    }

    /// Drop `count` neutrons at `position` with random directions.
    /// Returns how many are still live after the population cap.
    pub fn inject_neutrons(&mut self, position: DVec2, count: usize) -> usize {
        let count = count.min(self.config.neutrons.max_count);
        for _ in 0..count {
            self.spawn_neutron(position);
        }
        self.totals.injected += count as u64;
        self.enforce_population_cap();
        self.metrics.neutron_count = self.neutrons.len();
        count
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Set the simulation speed multiplier; non-positive values are ignored
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_scram_active(&self) -> bool {
        self.scram_active
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn atoms(&self) -> &[FuelAtom] {
        &self.atoms
    }

    pub fn rods(&self) -> &[ControlRod] {
        &self.rods
    }

    pub fn neutrons(&self) -> &[Neutron] {
        &self.neutrons
    }

    pub fn field(&self) -> &ThermalField {
        &self.field
    }

    pub fn metrics(&self) -> &ReactorMetrics {
        &self.metrics
    }

    pub fn totals(&self) -> ReactorTotals {
        self.totals
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn rod_views(&self) -> Vec<RodView> {
        self.rods
            .iter()
            .map(|r| RodView {
                id: r.id,
                x: r.x,
                width: r.width,
                tip: r.tip(),
                insertion: r.insertion,
                target_insertion: r.target_insertion,
                is_absorbing: r.is_absorbing,
                health: r.health,
                absorbed: r.absorbed,
            })
            .collect()
    }

    /// Get current state snapshot
    pub fn snapshot(&self) -> ReactorSnapshot {
        ReactorSnapshot {
            time_ms: self.time_ms,
            frame: self.frame,
            running: self.running,
            scram_active: self.scram_active,
            vessel_width: self.config.vessel_width(),
            vessel_height: self.config.vessel_height(),
            atoms: self
                .atoms
                .iter()
                .map(|a| AtomView {
                    id: a.id,
                    position: a.position,
                    energy: a.energy,
                    integrity: a.integrity,
                    xenon: a.xenon,
                    temperature: a.temperature,
                })
                .collect(),
            rods: self.rod_views(),
            neutrons: self
                .neutrons
                .iter()
                .map(|n| NeutronView {
                    id: n.id,
                    position: n.position,
                    trail: n.trail.iter().copied().collect(),
                })
                .collect(),
            heat: self.field.temperature().clone(),
            water: self.field.water().clone(),
            metrics: self.metrics.clone(),
            totals: self.totals,
            alerts: self.alerts.clone(),
        }
    }
}

/// Fuel lattice, row-major, starting one margin in from the top-left wall
fn build_atoms(config: &SimulationConfig) -> Vec<FuelAtom> {
    let lattice = &config.lattice;
    let mut atoms = Vec::with_capacity(lattice.rows * lattice.columns);

    for row in 0..lattice.rows {
        for col in 0..lattice.columns {
            let position = DVec2::new(
                lattice.margin + col as f64 * lattice.spacing,
                lattice.margin + row as f64 * lattice.spacing,
            );
            atoms.push(FuelAtom::new(
                AtomId(atoms.len() as u32),
                row,
                col,
                position,
                config.atoms.radius,
                config.atoms.initial_energy,
            ));
        }
    }

    atoms
}

/// Rods hang in the gaps between lattice columns, spread evenly across
/// the core, with alternating high/low insertion for flux stability.
/// Every rod gets its own gap as long as `count <= columns - 1`.
fn build_rods(config: &SimulationConfig) -> Vec<ControlRod> {
    let lattice = &config.lattice;
    let rods = &config.rods;
    let gaps = lattice.columns - 1;
    let max_length = rods.travel_fraction * config.vessel_height();

    (0..rods.count)
        .map(|i| {
            let gap = (((i as f64 + 0.5) * gaps as f64 / rods.count as f64).floor() as usize).min(gaps - 1);
            let x = lattice.margin + (gap as f64 + 0.5) * lattice.spacing;
            let insertion = if i % 2 == 0 {
                rods.initial_insertion_high
            } else {
                rods.initial_insertion_low
            };
            ControlRod::new(RodId(i as u32), x, rods.width, max_length, insertion)
        })
        .collect()
}

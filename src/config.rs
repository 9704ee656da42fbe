//! Simulation configuration
//!
//! Everything the core needs is supplied up front and stays fixed for the
//! simulator's lifetime. A JSON file may override any subset of keys; the
//! rest fall back to the defaults below, which reproduce the classic
//! 20x20 fuel lattice with 10 staggered control rods.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ReactorError, ReactorResult};

/// Well-known locations searched by [`SimulationConfig::load_or_default`]
const CONFIG_PATHS: [&str; 2] = ["config/reactor.json", "../config/reactor.json"];

/// Duration of one frame at the 60 fps baseline all per-frame rates are tuned for [ms]
pub const BASELINE_FRAME_MS: f64 = 1000.0 / 60.0;

/// Top-level simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub atoms: AtomConfig,
    pub rods: RodConfig,
    pub neutrons: NeutronConfig,
    pub thermal: ThermalConfig,
    pub simulation_speed: f64, // Multiplier applied to every frame's dt
    pub tick_rate_hz: f64,     // Target frame rate of the host scheduler
    pub initial_neutrons: usize,
    /// Fixed RNG seed for reproducible runs; entropy-seeded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Fuel lattice geometry. The vessel interior is sized around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub rows: usize,
    pub columns: usize,
    pub spacing: f64, // Distance between neighbouring atoms [world units]
    pub margin: f64,  // Gap between outer atoms and the vessel wall
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomConfig {
    pub radius: f64,
    pub initial_energy: f64,
    /// Geometric energy decay per baseline frame
    pub energy_decay: f64,
    pub emission_threshold: f64,
    pub emission_interval_ms: f64,     // Interval right at the threshold
    pub min_emission_interval_ms: f64, // Interval at full reactivity
    pub emission_energy_cost: f64,
    pub fission_energy_gain: f64,
    pub capture_energy_gain: f64,
    pub neutron_yield: f64, // Mean neutrons per emission
    pub yield_jitter: f64,
    pub fuel_damage_threshold: f64, // Local temperature where integrity starts to drop
    pub fuel_damage_rate: f64,
    /// Energy fed back per unit of integrity lost
    pub decay_heat_factor: f64,
    pub xenon_buildup: f64,
    pub xenon_decay: f64,
    /// Fraction of xenon burnt off by each fission hit
    pub xenon_burnout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RodConfig {
    pub count: usize,
    pub width: f64,
    /// Full-insertion length as a fraction of vessel height
    pub travel_fraction: f64,
    pub absorption_probability: f64,
    pub insertion_speed: f64, // Insertion fraction per second
    pub initial_insertion_high: f64,
    pub initial_insertion_low: f64,
    pub absorbing_effect_ms: f64,
    pub damage_threshold: f64,
    pub damage_rate: f64,
    /// Extra hitbox half-width so fast neutrons cannot tunnel through
    pub hit_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutronConfig {
    pub radius: f64,
    pub speed: f64, // [world units / s]
    pub speed_variation: f64,
    pub max_age_ms: f64,
    pub max_count: usize,
    pub fission_probability: f64,
    pub trail_length: usize,
    pub max_bounces: u32,
    pub wall_restitution: f64,
    pub atom_hit_tolerance: f64,
    /// Per-frame absorption chance in fully flooded cells
    pub water_absorption_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub cell_size: f64,
    pub heat_generation: f64,
    pub diffusion_rate: f64,
    pub base_cooling: f64,
    /// Share of the base cooling that survives with no water left
    pub void_cooling_floor: f64,
    pub boil_threshold: f64,
    pub condense_threshold: f64,
    pub boil_rate: f64,
    pub condense_rate: f64,
    pub base_pressure: f64, // [MPa]
    pub temperature_pressure: f64,
    pub void_pressure: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            lattice: LatticeConfig::default(),
            atoms: AtomConfig::default(),
            rods: RodConfig::default(),
            neutrons: NeutronConfig::default(),
            thermal: ThermalConfig::default(),
            simulation_speed: 1.0,
            tick_rate_hz: 60.0,
            initial_neutrons: 15,
            seed: None,
        }
    }
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            rows: 20,
            columns: 20,
            spacing: 30.0,
            margin: 30.0,
        }
    }
}

impl Default for AtomConfig {
    fn default() -> Self {
        Self {
            radius: 6.0,
            initial_energy: 0.1,
            energy_decay: 0.985,
            emission_threshold: 0.6,
            emission_interval_ms: 400.0,
            min_emission_interval_ms: 60.0,
            emission_energy_cost: 0.45,
            fission_energy_gain: 0.35,
            capture_energy_gain: 0.08,
            neutron_yield: 2.43,
            yield_jitter: 0.6,
            fuel_damage_threshold: 0.75,
            fuel_damage_rate: 0.004,
            decay_heat_factor: 2.0,
            xenon_buildup: 0.0015,
            xenon_decay: 0.002,
            xenon_burnout: 0.15,
        }
    }
}

impl Default for RodConfig {
    fn default() -> Self {
        Self {
            count: 10,
            width: 8.0,
            travel_fraction: 0.9,
            absorption_probability: 0.35,
            insertion_speed: 0.25,
            initial_insertion_high: 0.65,
            initial_insertion_low: 0.45,
            absorbing_effect_ms: 200.0,
            damage_threshold: 0.8,
            damage_rate: 0.003,
            hit_tolerance: 4.0,
        }
    }
}

impl Default for NeutronConfig {
    fn default() -> Self {
        Self {
            radius: 2.0,
            speed: 180.0,
            speed_variation: 0.25,
            max_age_ms: 4000.0,
            max_count: 1000,
            fission_probability: 0.86,
            trail_length: 6,
            max_bounces: 4,
            wall_restitution: 0.97,
            atom_hit_tolerance: 2.0,
            water_absorption_probability: 0.002,
        }
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            heat_generation: 0.02,
            diffusion_rate: 0.15,
            base_cooling: 0.01,
            void_cooling_floor: 0.2,
            boil_threshold: 0.5,
            condense_threshold: 0.35,
            boil_rate: 0.02,
            condense_rate: 0.01,
            base_pressure: 6.9,
            temperature_pressure: 4.0,
            void_pressure: 3.0,
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn load(path: impl AsRef<Path>) -> ReactorResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Try the well-known config locations, falling back to defaults
    pub fn load_or_default() -> Self {
        for path in &CONFIG_PATHS {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::load(path) {
                Ok(config) => {
                    log::debug!("Loaded simulation config from {}", path);
                    return config;
                }
                Err(e) => log::warn!("Ignoring config {}: {}", path, e),
            }
        }

        log::warn!("No usable reactor config found, using built-in defaults");
        Self::default()
    }

    /// Width of the vessel interior
    pub fn vessel_width(&self) -> f64 {
        2.0 * self.lattice.margin + self.lattice.columns.saturating_sub(1) as f64 * self.lattice.spacing
    }

    /// Height of the vessel interior
    pub fn vessel_height(&self) -> f64 {
        2.0 * self.lattice.margin + self.lattice.rows.saturating_sub(1) as f64 * self.lattice.spacing
    }

    /// Fixed frame length used by real-time stepping [ms]
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.tick_rate_hz
    }

    /// Reject configurations the simulation cannot run with
    pub fn validate(&self) -> ReactorResult<()> {
        let lattice = &self.lattice;
        if lattice.rows == 0 || lattice.columns == 0 {
            return Err(config_error("lattice rows and columns must be non-zero"));
        }
        if lattice.columns < 2 {
            return Err(config_error("lattice needs at least two columns to hang rods between"));
        }
        positive("lattice.spacing", lattice.spacing)?;
        non_negative("lattice.margin", lattice.margin)?;

        let atoms = &self.atoms;
        positive("atoms.radius", atoms.radius)?;
        unit("atoms.initial_energy", atoms.initial_energy)?;
        decay_factor("atoms.energy_decay", atoms.energy_decay)?;
        unit("atoms.emission_threshold", atoms.emission_threshold)?;
        positive("atoms.emission_interval_ms", atoms.emission_interval_ms)?;
        non_negative("atoms.min_emission_interval_ms", atoms.min_emission_interval_ms)?;
        if atoms.min_emission_interval_ms > atoms.emission_interval_ms {
            return Err(config_error(
                "atoms.min_emission_interval_ms must not exceed atoms.emission_interval_ms",
            ));
        }
        non_negative("atoms.neutron_yield", atoms.neutron_yield)?;
        non_negative("atoms.yield_jitter", atoms.yield_jitter)?;
        unit("atoms.xenon_burnout", atoms.xenon_burnout)?;
        for (name, value) in [
            ("atoms.emission_energy_cost", atoms.emission_energy_cost),
            ("atoms.fission_energy_gain", atoms.fission_energy_gain),
            ("atoms.capture_energy_gain", atoms.capture_energy_gain),
            ("atoms.fuel_damage_rate", atoms.fuel_damage_rate),
            ("atoms.decay_heat_factor", atoms.decay_heat_factor),
            ("atoms.xenon_buildup", atoms.xenon_buildup),
            ("atoms.xenon_decay", atoms.xenon_decay),
        ] {
            non_negative(name, value)?;
        }

        let rods = &self.rods;
        if rods.count == 0 {
            return Err(config_error("rods.count must be non-zero"));
        }
        if rods.count > lattice.columns - 1 {
            return Err(config_error("rods.count exceeds the number of gaps between lattice columns"));
        }
        positive("rods.width", rods.width)?;
        positive("rods.insertion_speed", rods.insertion_speed)?;
        unit("rods.travel_fraction", rods.travel_fraction)?;
        unit("rods.absorption_probability", rods.absorption_probability)?;
        unit("rods.initial_insertion_high", rods.initial_insertion_high)?;
        unit("rods.initial_insertion_low", rods.initial_insertion_low)?;
        non_negative("rods.absorbing_effect_ms", rods.absorbing_effect_ms)?;
        non_negative("rods.damage_rate", rods.damage_rate)?;
        non_negative("rods.hit_tolerance", rods.hit_tolerance)?;

        let neutrons = &self.neutrons;
        positive("neutrons.radius", neutrons.radius)?;
        positive("neutrons.speed", neutrons.speed)?;
        unit("neutrons.speed_variation", neutrons.speed_variation)?;
        positive("neutrons.max_age_ms", neutrons.max_age_ms)?;
        if neutrons.max_count == 0 {
            return Err(config_error("neutrons.max_count must be non-zero"));
        }
        unit("neutrons.fission_probability", neutrons.fission_probability)?;
        unit("neutrons.wall_restitution", neutrons.wall_restitution)?;
        unit(
            "neutrons.water_absorption_probability",
            neutrons.water_absorption_probability,
        )?;
        non_negative("neutrons.atom_hit_tolerance", neutrons.atom_hit_tolerance)?;

        let thermal = &self.thermal;
        positive("thermal.cell_size", thermal.cell_size)?;
        unit("thermal.diffusion_rate", thermal.diffusion_rate)?;
        unit("thermal.base_cooling", thermal.base_cooling)?;
        unit("thermal.void_cooling_floor", thermal.void_cooling_floor)?;
        for (name, value) in [
            ("thermal.heat_generation", thermal.heat_generation),
            ("thermal.boil_rate", thermal.boil_rate),
            ("thermal.condense_rate", thermal.condense_rate),
            ("thermal.base_pressure", thermal.base_pressure),
            ("thermal.temperature_pressure", thermal.temperature_pressure),
            ("thermal.void_pressure", thermal.void_pressure),
        ] {
            non_negative(name, value)?;
        }
        if thermal.condense_threshold > thermal.boil_threshold {
            return Err(config_error(
                "thermal.condense_threshold must not exceed thermal.boil_threshold",
            ));
        }

        positive("simulation_speed", self.simulation_speed)?;
        positive("tick_rate_hz", self.tick_rate_hz)?;
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> ReactorError {
    ReactorError::Config(message.into())
}

fn positive(name: &str, value: f64) -> ReactorResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_error(format!("{} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> ReactorResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(config_error(format!("{} must be non-negative, got {}", name, value)))
    }
}

fn unit(name: &str, value: f64) -> ReactorResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(config_error(format!("{} must lie in [0, 1], got {}", name, value)))
    }
}

fn decay_factor(name: &str, value: f64) -> ReactorResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(config_error(format!("{} must lie in (0, 1], got {}", name, value)))
    }
}

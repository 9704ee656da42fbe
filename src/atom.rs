//! Fuel atoms
//!
//! An atom's state is continuous: energy rises with fission hits and
//! decays geometrically every frame. Emission is gated on *reactivity*,
//! energy scaled down by xenon poisoning, so a poisoned atom needs more
//! energy before it releases neutrons. Sustained heat erodes fuel
//! integrity irreversibly, and each bit of lost integrity comes back as
//! decay heat.

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clamp_unit;
use crate::config::{AtomConfig, NeutronConfig};
use crate::neutron::{Neutron, NeutronIds};

/// Dense index of an atom into the simulator's atom vector. Atoms are
/// created once and never removed or recycled, so a stale id cannot alias
/// a different atom and no generation counter is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelAtom {
    pub id: AtomId,
    pub position: DVec2,
    pub row: usize,
    pub col: usize,
    pub energy: f64,
    pub since_emission_ms: f64,
    pub radius: f64,
    pub emitted: u64,  // Neutrons released over the run
    pub fissions: u64, // Fission hits taken over the run
    pub integrity: f64,
    pub temperature: f64, // Local temperature seen on the last update
    pub xenon: f64,
}

impl FuelAtom {
    pub fn new(id: AtomId, row: usize, col: usize, position: DVec2, radius: f64, energy: f64) -> Self {
        Self {
            id,
            position,
            row,
            col,
            energy: clamp_unit(energy),
            since_emission_ms: 0.0,
            radius,
            emitted: 0,
            fissions: 0,
            integrity: 1.0,
            temperature: 0.0,
            xenon: 0.0,
        }
    }

    /// Energy after xenon suppression
    pub fn reactivity(&self) -> f64 {
        self.energy * (1.0 - self.xenon)
    }

    /// Time that must pass between emissions at the current reactivity,
    /// or `None` while the atom is below the emission threshold
    pub fn emission_interval(&self, params: &AtomConfig) -> Option<f64> {
        let reactivity = self.reactivity();
        if reactivity < params.emission_threshold {
            return None;
        }
        let headroom = (1.0 - params.emission_threshold).max(f64::EPSILON);
        let excess = ((reactivity - params.emission_threshold) / headroom).clamp(0.0, 1.0);
        Some(params.emission_interval_ms - (params.emission_interval_ms - params.min_emission_interval_ms) * excess)
    }

    /// Advance the atom by one frame. Returns the neutrons it emitted,
    /// usually none.
    pub fn update<R: Rng>(
        &mut self,
        dt_ms: f64,
        frame_scale: f64,
        local_temperature: f64,
        params: &AtomConfig,
        neutron_params: &NeutronConfig,
        ids: &mut NeutronIds,
        rng: &mut R,
    ) -> Vec<Neutron> {
        self.since_emission_ms += dt_ms;
        self.energy *= params.energy_decay.powf(frame_scale);

        // Fuel damage only ever accumulates
        self.temperature = clamp_unit(local_temperature);
        if self.temperature > params.fuel_damage_threshold {
            let loss = (params.fuel_damage_rate * (self.temperature - params.fuel_damage_threshold) * frame_scale)
                .min(self.integrity);
            self.integrity = clamp_unit(self.integrity - loss);
            self.energy += loss * params.decay_heat_factor;
        }

        let production = params.xenon_buildup * self.energy;
        let decay = params.xenon_decay * self.xenon;
        self.xenon = clamp_unit(self.xenon + (production - decay) * frame_scale);
        self.energy = clamp_unit(self.energy);

        match self.emission_interval(params) {
            Some(interval) if self.since_emission_ms >= interval => self.emit(params, neutron_params, ids, rng),
            _ => Vec::new(),
        }
    }

    fn emit<R: Rng>(
        &mut self,
        params: &AtomConfig,
        neutron_params: &NeutronConfig,
        ids: &mut NeutronIds,
        rng: &mut R,
    ) -> Vec<Neutron> {
        let jitter = params.yield_jitter * (rng.gen::<f64>() * 2.0 - 1.0);
        let count = (params.neutron_yield + jitter).round().clamp(1.0, 3.0) as usize;

        // Spawn just outside the capture radius so the atom does not
        // swallow its own neutrons on the next collision pass
        let reach = self.radius + neutron_params.radius + neutron_params.atom_hit_tolerance;
        let neutrons = (0..count)
            .map(|_| {
                let angle = rng.gen::<f64>() * std::f64::consts::TAU;
                let direction = DVec2::from_angle(angle);
                let offset = reach * (1.05 + 0.2 * rng.gen::<f64>());
                let variation = neutron_params.speed_variation * (rng.gen::<f64>() * 2.0 - 1.0);
                Neutron::new(
                    ids.next_id(),
                    self.position + direction * offset,
                    direction,
                    neutron_params.speed * (1.0 + variation),
                    neutron_params.radius,
                )
            })
            .collect();

        self.since_emission_ms = 0.0;
        self.energy = clamp_unit(self.energy - params.emission_energy_cost);
        self.emitted += count as u64;
        neutrons
    }

    /// A neutron caused fission: energy jumps (less when poisoned) and
    /// some xenon burns off
    pub fn absorb_fission(&mut self, params: &AtomConfig) {
        self.energy = clamp_unit(self.energy + params.fission_energy_gain * (1.0 - self.xenon));
        self.xenon = clamp_unit(self.xenon * (1.0 - params.xenon_burnout));
        self.fissions += 1;
    }

    /// Radiative capture without fission
    pub fn absorb_capture(&mut self, params: &AtomConfig) {
        self.energy = clamp_unit(self.energy + params.capture_energy_gain);
    }
}

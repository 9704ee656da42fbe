//! Control rods
//!
//! Rods hang from the top of the vessel. Insertion 0.0 means fully
//! withdrawn, 1.0 means the absorber reaches `max_length` into the core.
//! Whatever the target, actual insertion only ever moves at
//! `insertion_speed` per second.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::clamp_unit;
use crate::config::RodConfig;

/// Dense index of a control rod. Like [`crate::atom::AtomId`], rods live for
/// the whole run and are never recycled, so the bare index is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RodId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRod {
    pub id: RodId,
    pub x: f64, // Horizontal centre of the rod
    pub width: f64,
    pub max_length: f64,
    pub insertion: f64,
    pub target_insertion: f64,
    pub absorbed: u64,
    pub is_absorbing: bool,
    pub last_absorption_ms: f64, // Simulation time of the last absorption
    pub health: f64,
}

impl ControlRod {
    pub fn new(id: RodId, x: f64, width: f64, max_length: f64, insertion: f64) -> Self {
        let insertion = clamp_unit(insertion);
        Self {
            id,
            x,
            width,
            max_length,
            insertion,
            target_insertion: insertion,
            absorbed: 0,
            is_absorbing: false,
            last_absorption_ms: f64::NEG_INFINITY,
            health: 1.0,
        }
    }

    /// Depth of the absorber tip below the vessel top
    pub fn tip(&self) -> f64 {
        self.insertion * self.max_length
    }

    pub fn set_target(&mut self, target: f64) {
        self.target_insertion = clamp_unit(target);
    }

    /// Whether a circle of radius `radius` at `pos` touches the rod's
    /// hitbox, widened by `tolerance` on every side
    pub fn overlaps(&self, pos: DVec2, radius: f64, tolerance: f64) -> bool {
        if self.insertion <= 0.0 {
            return false;
        }
        let half_width = self.width / 2.0 + tolerance + radius;
        (pos.x - self.x).abs() <= half_width && pos.y - radius <= self.tip() + tolerance
    }

    /// Move toward the target, expire the absorbing flag and apply heat
    /// damage from the temperature at the rod tip
    pub fn update(&mut self, dt_ms: f64, frame_scale: f64, now_ms: f64, tip_temperature: f64, params: &RodConfig) {
        let max_step = params.insertion_speed * dt_ms / 1000.0;
        let delta = self.target_insertion - self.insertion;
        self.insertion = if delta.abs() <= max_step {
            self.target_insertion
        } else {
            clamp_unit(self.insertion + max_step.copysign(delta))
        };

        if self.is_absorbing && now_ms - self.last_absorption_ms >= params.absorbing_effect_ms {
            self.is_absorbing = false;
        }

        if tip_temperature > params.damage_threshold {
            let loss = params.damage_rate * (tip_temperature - params.damage_threshold) * frame_scale;
            self.health = clamp_unit(self.health - loss);
        }
    }

    /// Probability of absorbing an overlapping neutron this frame
    pub fn absorption_chance(&self, params: &RodConfig) -> f64 {
        clamp_unit(params.absorption_probability * self.health)
    }

    pub fn record_absorption(&mut self, now_ms: f64) {
        self.absorbed += 1;
        self.is_absorbing = true;
        self.last_absorption_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rod(insertion: f64) -> ControlRod {
        ControlRod::new(RodId(0), 100.0, 8.0, 500.0, insertion)
    }

    #[test]
    fn test_insertion_is_rate_limited_and_converges() {
        let params = RodConfig::default();
        let mut r = rod(0.2);
        r.set_target(0.9);

        let dt = 16.67;
        let max_step = params.insertion_speed * dt / 1000.0;
        let mut last = r.insertion;
        for _ in 0..1000 {
            r.update(dt, 1.0, 0.0, 0.0, &params);
            assert!(r.insertion - last <= max_step + 1e-12);
            assert!(r.insertion >= last);
            assert!(r.insertion <= 0.9);
            last = r.insertion;
        }
        assert_eq!(r.insertion, 0.9);
    }

    #[test]
    fn test_target_is_clamped() {
        let mut r = rod(0.5);
        r.set_target(4.0);
        assert_eq!(r.target_insertion, 1.0);
        r.set_target(-1.0);
        assert_eq!(r.target_insertion, 0.0);
    }

    #[test]
    fn test_absorbing_flag_expires() {
        let params = RodConfig::default();
        let mut r = rod(0.5);
        r.record_absorption(1000.0);
        assert!(r.is_absorbing);
        assert_eq!(r.absorbed, 1);

        r.update(16.0, 1.0, 1100.0, 0.0, &params);
        assert!(r.is_absorbing);
        r.update(16.0, 1.0, 1000.0 + params.absorbing_effect_ms, 0.0, &params);
        assert!(!r.is_absorbing);
    }

    #[test]
    fn test_heat_damage_is_monotonic() {
        let params = RodConfig::default();
        let mut r = rod(0.5);
        let mut last = r.health;
        for _ in 0..20 {
            r.update(16.0, 1.0, 0.0, 1.0, &params);
            assert!(r.health < last);
            last = r.health;
        }
        r.update(16.0, 1.0, 0.0, 0.0, &params);
        assert_eq!(r.health, last);
        assert!(r.absorption_chance(&params) < params.absorption_probability);
    }

    #[test]
    fn test_overlap_follows_insertion() {
        let r = rod(0.5);
        assert!(r.overlaps(DVec2::new(100.0, 200.0), 2.0, 4.0));
        assert!(r.overlaps(DVec2::new(109.0, 200.0), 2.0, 4.0));
        assert!(!r.overlaps(DVec2::new(100.0, 300.0), 2.0, 4.0));
        assert!(!r.overlaps(DVec2::new(120.0, 100.0), 2.0, 4.0));
        assert!(!rod(0.0).overlaps(DVec2::new(100.0, 10.0), 2.0, 4.0));
    }
}

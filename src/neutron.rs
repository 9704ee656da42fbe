//! Free neutrons: integration, trail history and wall reflection

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Monotonic neutron identity, never reused within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeutronId(pub u64);

/// Hands out [`NeutronId`]s in spawn order
#[derive(Debug, Clone, Default)]
pub struct NeutronIds(u64);

impl NeutronIds {
    pub fn next_id(&mut self) -> NeutronId {
        self.0 += 1;
        NeutronId(self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Neutron {
    pub id: NeutronId,
    pub position: DVec2,
    pub velocity: DVec2, // [world units / s]
    pub age_ms: f64,
    pub speed: f64, // Nominal speed at spawn
    pub radius: f64,
    /// Recent positions, most recent first
    pub trail: VecDeque<DVec2>,
    pub bounces: u32,
}

/// Result of testing a neutron against the vessel walls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallContact {
    Inside,
    Reflected,
    Escaped,
}

impl Neutron {
    pub fn new(id: NeutronId, position: DVec2, direction: DVec2, speed: f64, radius: f64) -> Self {
        let direction = direction.try_normalize().unwrap_or(DVec2::X);
        Self {
            id,
            position,
            velocity: direction * speed,
            age_ms: 0.0,
            speed,
            radius,
            trail: VecDeque::new(),
            bounces: 0,
        }
    }

    /// Advance position and age by `dt_ms`, recording the previous
    /// position in a trail of at most `trail_length` points
    pub fn integrate(&mut self, dt_ms: f64, trail_length: usize) {
        if trail_length > 0 {
            self.trail.push_front(self.position);
            self.trail.truncate(trail_length);
        }
        self.position += self.velocity * (dt_ms / 1000.0);
        self.age_ms += dt_ms;
    }

    pub fn is_expired(&self, max_age_ms: f64) -> bool {
        self.age_ms > max_age_ms
    }

    /// Bounce off the inside of the `[0, width] x [0, height]` vessel,
    /// losing a little speed each time. A neutron that has bounced more
    /// than `max_bounces` times has leaked out of the core.
    pub fn reflect(&mut self, width: f64, height: f64, restitution: f64, max_bounces: u32) -> WallContact {
        let r = self.radius;
        let mut hit = false;

        if self.position.x < r {
            self.position.x = r;
            self.velocity.x = self.velocity.x.abs() * restitution;
            hit = true;
        } else if self.position.x > width - r {
            self.position.x = width - r;
            self.velocity.x = -self.velocity.x.abs() * restitution;
            hit = true;
        }

        if self.position.y < r {
            self.position.y = r;
            self.velocity.y = self.velocity.y.abs() * restitution;
            hit = true;
        } else if self.position.y > height - r {
            self.position.y = height - r;
            self.velocity.y = -self.velocity.y.abs() * restitution;
            hit = true;
        }

        if !hit {
            return WallContact::Inside;
        }
        self.bounces += 1;
        if self.bounces > max_bounces {
            WallContact::Escaped
        } else {
            WallContact::Reflected
        }
    }
}

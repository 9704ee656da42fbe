//! RBMK Reactor Particle Simulation Library
//!
//! Frame-driven simulation of an RBMK core at particle level: neutrons
//! bounce around a fixed lattice of fuel atoms, control rods soak them
//! up, and a coupled heat/water field reproduces the positive void
//! coefficient. Rendering and the host UI live elsewhere; they consume
//! [`ReactorSnapshot`]s and feed back [`FrameInput`]s.

pub mod atom;
pub mod collision;
pub mod commands;
pub mod config;
pub mod error;
pub mod field;
pub mod neutron;
pub mod reactor;
pub mod rod;
pub mod spatial;

pub use commands::SimulatorState;
pub use config::SimulationConfig;
pub use error::{ReactorError, ReactorResult};
pub use reactor::{FrameInput, NeutronBurst, ReactorMetrics, ReactorSimulator, ReactorSnapshot, ReactorTotals};

/// Clamp to [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

//! Host-facing commands for the reactor simulation
//!
//! A host shell (UI, IPC bridge, headless runner) holds a cloneable
//! [`SimulatorState`] and talks to the simulator only through these
//! functions. Each one takes the lock, does its work between frames and
//! returns plain serialisable data.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ReactorResult;
use crate::reactor::{FrameInput, ReactorMetrics, ReactorSimulator, ReactorSnapshot, ReactorTotals, RodView};

/// Upper bound on frames run by a single real-time call, so a stalled
/// host does not trigger a long catch-up burst
const MAX_FRAMES_PER_CALL: usize = 240;

struct Session {
    simulator: ReactorSimulator,
    accumulated_ms: f64, // Scaled wall time not yet turned into frames
}

/// Shared simulator handle for the host
#[derive(Clone)]
pub struct SimulatorState(Arc<Mutex<Session>>);

impl SimulatorState {
    pub fn new(simulator: ReactorSimulator) -> Self {
        Self(Arc::new(Mutex::new(Session {
            simulator,
            accumulated_ms: 0.0,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the simulator
    pub fn with<T>(&self, f: impl FnOnce(&mut ReactorSimulator) -> T) -> T {
        f(&mut self.lock().simulator)
    }
}

/// Response for simulation steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub frames_run: usize,
    pub time_ms: f64,
    pub metrics: ReactorMetrics,
    pub totals: ReactorTotals,
    pub control_rods: Vec<RodView>,
    pub alerts: Vec<String>,
}

fn response(simulator: &ReactorSimulator, frames_run: usize) -> SimulationResponse {
    SimulationResponse {
        frames_run,
        time_ms: simulator.time_ms(),
        metrics: simulator.metrics().clone(),
        totals: simulator.totals(),
        control_rods: simulator.rod_views(),
        alerts: simulator.alerts().to_vec(),
    }
}

/// Get the full render snapshot
pub fn get_reactor_state(state: &SimulatorState) -> ReactorSnapshot {
    state.lock().simulator.snapshot()
}

/// Perform one fixed-length frame, regardless of the run flag
pub fn simulation_step(state: &SimulatorState) -> SimulationResponse {
    simulation_run(state, 1)
}

/// Run `frames` fixed-length frames, regardless of the run flag
pub fn simulation_run(state: &SimulatorState, frames: usize) -> SimulationResponse {
    let mut session = state.lock();
    let sim = &mut session.simulator;
    let dt = sim.config().frame_ms() * sim.speed();
    for _ in 0..frames {
        sim.step(dt);
    }
    response(sim, frames)
}

/// Run real-time simulation.
/// Takes `delta_real_ms` (wall time since the last call), scales it by the
/// simulator's speed multiplier and runs as many whole fixed frames as
/// fit. The remainder carries over to the next call.
pub fn simulation_realtime(state: &SimulatorState, delta_real_ms: f64) -> SimulationResponse {
    let mut session = state.lock();
    let Session {
        simulator,
        accumulated_ms,
    } = &mut *session;

    if !simulator.is_running() || !(delta_real_ms.is_finite() && delta_real_ms > 0.0) {
        return response(simulator, 0);
    }

    let frame_ms = simulator.config().frame_ms();
    *accumulated_ms += delta_real_ms * simulator.speed();

    let available = (*accumulated_ms / frame_ms).floor() as usize;
    let frames = available.min(MAX_FRAMES_PER_CALL);
    if frames < available {
        log::debug!("Dropping {} frames of backlog", available - frames);
        *accumulated_ms = 0.0;
    } else {
        *accumulated_ms -= frames as f64 * frame_ms;
    }

    for _ in 0..frames {
        simulator.step(frame_ms);
    }
    response(simulator, frames)
}

/// Apply one frame of host input and step if running
pub fn apply_frame_input(state: &SimulatorState, input: &FrameInput) -> SimulationResponse {
    let mut session = state.lock();
    let stepped = session.simulator.tick(input);
    response(&session.simulator, usize::from(stepped))
}

/// Initiate emergency SCRAM
pub fn scram(state: &SimulatorState) -> Vec<RodView> {
    let mut session = state.lock();
    session.simulator.scram();
    session.simulator.rod_views()
}

/// Reset SCRAM
pub fn reset_scram(state: &SimulatorState) -> Vec<RodView> {
    let mut session = state.lock();
    session.simulator.reset_scram();
    session.simulator.rod_views()
}

/// Move a single control rod
pub fn move_control_rod(state: &SimulatorState, rod_id: usize, insertion: f64) -> ReactorResult<Vec<RodView>> {
    let mut session = state.lock();
    session.simulator.move_rod(rod_id, insertion)?;
    Ok(session.simulator.rod_views())
}

/// Move every control rod
pub fn move_all_rods(state: &SimulatorState, insertion: f64) -> Vec<RodView> {
    let mut session = state.lock();
    session.simulator.move_all_rods(insertion);
    session.simulator.rod_views()
}

/// Drop neutrons into the core at a pointer position
pub fn inject_neutrons(state: &SimulatorState, x: f64, y: f64, count: usize) -> usize {
    state.lock().simulator.inject_neutrons(DVec2::new(x, y), count)
}

/// Start or pause the simulation
pub fn set_running(state: &SimulatorState, running: bool) {
    let mut session = state.lock();
    session.simulator.set_running(running);
    if !running {
        session.accumulated_ms = 0.0;
    }
}

/// Set the simulation speed multiplier
pub fn set_speed(state: &SimulatorState, speed: f64) -> f64 {
    let mut session = state.lock();
    session.simulator.set_speed(speed);
    session.simulator.speed()
}

/// Reset simulation to initial state
pub fn reset_simulation(state: &SimulatorState) -> ReactorResult<ReactorSnapshot> {
    let mut session = state.lock();
    session.simulator.reset()?;
    session.accumulated_ms = 0.0;
    Ok(session.simulator.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::error::ReactorError;

    fn state() -> SimulatorState {
        let config = SimulationConfig {
            seed: Some(21),
            ..Default::default()
        };
        SimulatorState::new(ReactorSimulator::new(config).unwrap())
    }

    #[test]
    fn test_realtime_accumulates_fractional_frames() {
        let state = state();
        let frame_ms = 1000.0 / 60.0;

        // Less than a frame: nothing yet
        assert_eq!(simulation_realtime(&state, frame_ms * 0.6).frames_run, 0);
        // Carries over: 1.2 frames total
        assert_eq!(simulation_realtime(&state, frame_ms * 0.6).frames_run, 1);
        assert_eq!(simulation_realtime(&state, frame_ms * 3.0).frames_run, 3);
        assert_eq!(state.with(|sim| sim.frame()), 4);
    }

    #[test]
    fn test_realtime_respects_speed_and_pause() {
        let state = state();
        let frame_ms = 1000.0 / 60.0;

        assert_eq!(set_speed(&state, 2.0), 2.0);
        assert_eq!(simulation_realtime(&state, frame_ms * 2.0).frames_run, 4);

        set_running(&state, false);
        assert_eq!(simulation_realtime(&state, frame_ms * 10.0).frames_run, 0);
    }

    #[test]
    fn test_realtime_caps_backlog() {
        let state = state();
        let response = simulation_realtime(&state, 60_000.0);
        assert_eq!(response.frames_run, MAX_FRAMES_PER_CALL);
        assert_eq!(simulation_realtime(&state, 1.0).frames_run, 0);
    }

    #[test]
    fn test_rod_commands() {
        let state = state();
        let rods = move_control_rod(&state, 3, 0.1).unwrap();
        assert_eq!(rods[3].target_insertion, 0.1);
        assert!(matches!(move_control_rod(&state, 42, 0.1), Err(ReactorError::UnknownRod(42))));

        let rods = scram(&state);
        assert!(rods.iter().all(|r| r.target_insertion == 1.0));
        reset_scram(&state);
        let rods = move_all_rods(&state, 0.3);
        assert!(rods.iter().all(|r| r.target_insertion == 0.3));
    }

    #[test]
    fn test_reset_and_inject() {
        let state = state();
        assert_eq!(inject_neutrons(&state, 100.0, 100.0, 10), 10);
        simulation_run(&state, 5);
        let snapshot = reset_simulation(&state).unwrap();
        assert_eq!(snapshot.frame, 0);
        assert_eq!(snapshot.totals.injected, 0);
    }
}

//! RBMK Reactor Particle Simulator - Main Entry Point
//!
//! Headless host: drives the simulation from a 60 Hz tokio timer and logs
//! metrics once per simulated second.
//!
//! Usage: `rbmk-particle-sim [CONFIG.json] [--frames N] [--json]`

use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use rbmk_particle_sim_lib::commands::{get_reactor_state, simulation_realtime};
use rbmk_particle_sim_lib::{ReactorResult, ReactorSimulator, SimulationConfig, SimulatorState};

struct Args {
    config_path: Option<String>,
    frames: Option<usize>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config_path: None,
        frames: None,
        json: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--frames" => match iter.next().map(|v| v.parse()) {
                Some(Ok(n)) => args.frames = Some(n),
                _ => log::warn!("--frames needs a number, running until interrupted"),
            },
            _ => args.config_path = Some(arg),
        }
    }

    args
}

#[tokio::main]
async fn main() -> ReactorResult<()> {
    // Initialize logging
    env_logger::init();

    let args = parse_args();
    let config = match &args.config_path {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::load_or_default(),
    };
    let tick_rate = config.tick_rate_hz;

    // Create reactor simulator
    let state = SimulatorState::new(ReactorSimulator::new(config)?);

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / tick_rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let report_every = tick_rate.round().max(1.0) as usize;
    let mut frames_done = 0usize;
    let mut next_report = report_every;
    let mut last = Instant::now();

    log::info!("Reactor running at {} Hz", tick_rate);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta_ms = now.duration_since(last).as_secs_f64() * 1000.0;
                last = now;

                let response = simulation_realtime(&state, delta_ms);
                frames_done += response.frames_run;

                if frames_done >= next_report {
                    next_report = frames_done + report_every;
                    let m = &response.metrics;
                    log::info!(
                        "t={:.1}s neutrons={} rate={:.0}/s T={:.3} void={:.3} p={:.2}MPa Xe={:.3} fissions={}",
                        response.time_ms / 1000.0,
                        m.neutron_count,
                        m.reaction_rate,
                        m.avg_temperature,
                        m.void_fraction,
                        m.pressure,
                        m.avg_xenon,
                        response.totals.fissions,
                    );
                }

                if args.frames.is_some_and(|limit| frames_done >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping simulation");
                break;
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&get_reactor_state(&state))?);
    }

    Ok(())
}

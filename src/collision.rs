//! Per-frame collision and reaction pass
//!
//! Each live neutron is tested against inserted control rods first and
//! only then against nearby fuel atoms found through the spatial index.
//! A neutron that touches nothing is handed back unchanged.

use rand::Rng;

use crate::atom::FuelAtom;
use crate::config::SimulationConfig;
use crate::neutron::Neutron;
use crate::rod::ControlRod;
use crate::spatial::SpatialGrid;

/// What happened to the neutrons handed to [`resolve_collisions`]
#[derive(Debug, Default)]
pub struct CollisionOutcome {
    pub remaining: Vec<Neutron>,
    pub fissions: u64,
    pub captures: u64, // Absorbed by an atom without fission
    pub rod_absorptions: u64,
}

pub fn resolve_collisions<R: Rng>(
    neutrons: Vec<Neutron>,
    rods: &mut [ControlRod],
    atoms: &mut [FuelAtom],
    index: &SpatialGrid,
    config: &SimulationConfig,
    now_ms: f64,
    rng: &mut R,
) -> CollisionOutcome {
    let mut outcome = CollisionOutcome {
        remaining: Vec::with_capacity(neutrons.len()),
        ..Default::default()
    };
    let tolerance = config.neutrons.atom_hit_tolerance;
    let mut candidates = Vec::new();

    'neutrons: for neutron in neutrons {
        for rod in rods.iter_mut().filter(|rod| rod.insertion > 0.0) {
            if !rod.overlaps(neutron.position, neutron.radius, config.rods.hit_tolerance) {
                continue;
            }
            if rng.gen::<f64>() < rod.absorption_chance(&config.rods) {
                rod.record_absorption(now_ms);
                outcome.rod_absorptions += 1;
                continue 'neutrons;
            }
        }

        let search = config.atoms.radius + neutron.radius + tolerance;
        index.query_into(neutron.position, search, &mut candidates);

        let hit = candidates
            .iter()
            .filter_map(|&i| {
                let atom = atoms.get(i)?;
                let distance = atom.position.distance(neutron.position);
                (distance <= atom.radius + neutron.radius + tolerance).then_some((i, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match hit {
            Some((i, _)) => {
                let atom = &mut atoms[i];
                if rng.gen::<f64>() < config.neutrons.fission_probability {
                    atom.absorb_fission(&config.atoms);
                    outcome.fissions += 1;
                } else {
                    atom.absorb_capture(&config.atoms);
                    outcome.captures += 1;
                }
            }
            None => outcome.remaining.push(neutron),
        }
    }

    outcome
}

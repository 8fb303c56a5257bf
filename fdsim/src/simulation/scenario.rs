//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime `Scenario`
//! containing:
//! - numerical parameters (`Parameters`)
//! - the simulation with its forces, bounds, particles and springs
//! - the particle handles in configuration order, so springs and snapshots
//!   can refer to particles by index

use serde::Serialize;
use tracing::debug;

use crate::configuration::config::{ForcesConfig, ScenarioConfig};
use crate::simulation::barnes_hut::NBodyForce;
use crate::simulation::engine::Simulation;
use crate::simulation::error::{SimError, SimResult};
use crate::simulation::forces::{DragForce, GravityForce, SpringForce};
use crate::simulation::observer::TickObserver;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Bounds, ParticleId};

pub struct Scenario {
    pub parameters: Parameters,
    pub simulation: Simulation,
    pub particles: Vec<ParticleId>, // handles, indexed like the config's particle list
    pub ticks: usize,
}

/// Serializable state of one particle, keyed by its configuration index
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParticleSnapshot {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub degree: u32,
    pub tag: Option<u64>,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> SimResult<Self> {
        let parameters = Parameters::from(&cfg.engine);

        let mut simulation = match &cfg.forces {
            Some(forces) => {
                let mut sim = Simulation::new(parameters.clone());
                register_forces(&mut sim, forces);
                sim
            }
            None => Simulation::layout(parameters.clone()),
        };

        if let Some(b) = &cfg.bounds {
            simulation.set_bounds(Some(Bounds::new(b.x, b.y, b.width, b.height)));
        }

        // Particles: map `ParticleConfig` -> live particles
        let mut particles = Vec::with_capacity(cfg.particles.len());
        for pc in &cfg.particles {
            let id = simulation.add_particle(pc.mass, pc.x, pc.y);
            if let Some(p) = simulation.particle_mut(id) {
                p.vx = pc.vx;
                p.vy = pc.vy;
                p.is_active = pc.active;
                p.tag = pc.tag;
            }
            particles.push(id);
        }

        for (i, sc) in cfg.springs.iter().enumerate() {
            let lookup = |idx: usize| {
                particles.get(idx).copied().ok_or_else(|| {
                    SimError::InvalidScenario(format!(
                        "spring {i} references particle {idx}, but only {} particles are defined",
                        particles.len()
                    ))
                })
            };
            let a = lookup(sc.a)?;
            let b = lookup(sc.b)?;
            simulation.add_spring(a, b, sc.rest_length, sc.tension, sc.damping)?;
        }

        debug!(
            particles = particles.len(),
            springs = cfg.springs.len(),
            forces = simulation.forces().len(),
            "scenario built"
        );

        Ok(Self {
            parameters,
            simulation,
            particles,
            ticks: cfg.engine.ticks,
        })
    }

    /// Run the configured number of ticks at the configured step size
    pub fn run<O: TickObserver>(&mut self, observer: &mut O) {
        let dt = self.parameters.dt;
        for _ in 0..self.ticks {
            self.simulation.tick_observed(dt, observer);
        }
    }

    /// Current state of every particle that is still alive
    pub fn snapshot(&self) -> Vec<ParticleSnapshot> {
        self.particles
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                self.simulation.particle(*id).map(|p| ParticleSnapshot {
                    index,
                    x: p.x,
                    y: p.y,
                    vx: p.vx,
                    vy: p.vy,
                    degree: p.degree(),
                    tag: p.tag,
                })
            })
            .collect()
    }
}

/// Register configured forces in the fixed order gravity, nbody, drag, spring
fn register_forces(sim: &mut Simulation, cfg: &ForcesConfig) {
    if let Some(g) = &cfg.gravity {
        sim.add_force(GravityForce::new(g.gx, g.gy));
    }
    if let Some(nb) = &cfg.nbody {
        sim.add_force(NBodyForce {
            gravitation: nb.gravitation,
            theta: nb.theta,
            min_distance: nb.min_distance,
            max_distance: nb.max_distance,
            epsilon: nb.epsilon,
        });
    }
    if let Some(d) = &cfg.drag {
        sim.add_force(DragForce::new(d.coefficient));
    }
    if cfg.spring {
        sim.add_force(SpringForce);
    }
}

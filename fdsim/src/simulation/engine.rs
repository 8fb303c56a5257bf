//! Simulation orchestrator
//!
//! `Simulation` owns the particles and springs (`System`), the ordered force
//! set, the object pools and the optional containment bounds, and runs the
//! per-tick pipeline:
//! reap dead springs/particles -> predict -> evaluate forces -> correct -> clamp.
//!
//! The engine has no clock of its own; a host calls [`Simulation::tick`] once
//! per frame and reads particle positions afterwards. All calls must be
//! serialized by the caller.

use tracing::{debug, warn};

use crate::simulation::barnes_hut::NBodyForce;
use crate::simulation::error::{SimError, SimResult};
use crate::simulation::forces::{DragForce, Force, ForceSet, GravityForce, SpringForce, Workspace};
use crate::simulation::integrator::{correct, enforce_bounds, predict};
use crate::simulation::observer::{NoOpTickObserver, TickObserver};
use crate::simulation::params::Parameters;
use crate::simulation::pool::ObjectPool;
use crate::simulation::states::{Bounds, Particle, ParticleId, Spring, SpringId};
use crate::simulation::store::Store;

/// Gravitation of the n-body force registered by [`Simulation::layout`]
pub const LAYOUT_GRAVITATION: f64 = -5.0;

/// Live particles and springs, as seen by forces and observers
#[derive(Default)]
pub struct System {
    pub(crate) particles: Store<Particle>,
    pub(crate) springs: Store<Spring>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.0)
    }

    /// Mutable access for force terms accumulating into `fx`/`fy`
    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id.0)
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.get(id.0)
    }

    /// Live particles in insertion order
    pub fn particles(&self) -> impl Iterator<Item = (ParticleId, &Particle)> + '_ {
        self.particles.iter().map(|(key, p)| (ParticleId(key), p))
    }

    pub fn particles_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> + '_ {
        self.particles.iter_mut().map(|(key, p)| (ParticleId(key), p))
    }

    /// Live springs in insertion order
    pub fn springs(&self) -> impl Iterator<Item = (SpringId, &Spring)> + '_ {
        self.springs.iter().map(|(key, s)| (SpringId(key), s))
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.particles.values().map(Particle::kinetic_energy).sum()
    }
}

pub struct Simulation {
    system: System,
    forces: ForceSet,
    workspace: Workspace,
    particle_pool: ObjectPool<Particle>,
    spring_pool: ObjectPool<Spring>,
    bounds: Option<Bounds>,
    parameters: Parameters,
    time: f64,
}

impl Simulation {
    /// An empty simulation with no forces registered
    pub fn new(parameters: Parameters) -> Self {
        Self {
            system: System::new(),
            forces: ForceSet::new(),
            workspace: Workspace::new(parameters.seed, parameters.pool_limit),
            particle_pool: ObjectPool::with_limit(parameters.pool_limit),
            spring_pool: ObjectPool::with_limit(parameters.pool_limit),
            bounds: None,
            parameters,
            time: 0.0,
        }
    }

    /// A simulation with the graph-layout force stack, in order:
    /// gravity (off), repulsive n-body, drag, springs
    pub fn layout(parameters: Parameters) -> Self {
        let mut sim = Self::new(parameters);
        sim.forces = ForceSet::new()
            .with(GravityForce::new(0.0, 0.0))
            .with(NBodyForce::new(LAYOUT_GRAVITATION))
            .with(DragForce::default())
            .with(SpringForce);
        sim
    }

    // Init simulation ======================================================================

    /// Append a force; it runs after every force registered before it
    pub fn add_force<T: Force + 'static>(&mut self, force: T) {
        self.forces.push(force);
    }

    /// Add a resting, inactive particle
    pub fn add_particle(&mut self, mass: f64, x: f64, y: f64) -> ParticleId {
        let mut particle = self.particle_pool.acquire();
        particle.init(mass, x, y);
        ParticleId(self.system.particles.insert(particle))
    }

    /// Connect two live particles with a spring and bump both degrees
    pub fn add_spring(&mut self, p1: ParticleId, p2: ParticleId, rest_length: f64, tension: f64, damping: f64) -> SimResult<SpringId> {
        for id in [p1, p2] {
            if !self.system.particles.contains(id.0) {
                return Err(SimError::UnknownParticle(id));
            }
        }

        let mut spring = self.spring_pool.acquire();
        spring.init(p1, p2, rest_length, tension, damping);

        for id in [p1, p2] {
            if let Some(p) = self.system.particles.get_mut(id.0) {
                p.degree += 1;
            }
        }
        Ok(SpringId(self.system.springs.insert(spring)))
    }

    /// Not offered: kill the particle and let the next tick reap it
    pub fn remove_particle(&mut self, id: ParticleId) -> SimResult<()> {
        warn!(?id, "remove_particle called; only kill-and-reap removal is supported");
        Err(SimError::Unsupported("remove_particle"))
    }

    /// Not offered: kill the spring and let the next tick reap it
    pub fn remove_spring(&mut self, id: SpringId) -> SimResult<()> {
        warn!(?id, "remove_spring called; only kill-and-reap removal is supported");
        Err(SimError::Unsupported("remove_spring"))
    }

    /// Mark a particle dead. Returns false for a stale handle.
    pub fn kill_particle(&mut self, id: ParticleId) -> bool {
        self.particle_mut(id).map(Particle::kill).is_some()
    }

    /// Mark a spring dead. Returns false for a stale handle.
    pub fn kill_spring(&mut self, id: SpringId) -> bool {
        self.spring_mut(id).map(Spring::kill).is_some()
    }

    /// Set or clear the containment rectangle
    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    // Run simulation =======================================================================

    /// Recompute forces at the current positions without advancing time
    pub fn eval(&mut self) {
        self.forces.evaluate(&mut self.system, &mut self.workspace);
    }

    /// Advance the simulation by `dt`
    pub fn tick(&mut self, dt: f64) {
        self.tick_observed(dt, &mut NoOpTickObserver);
    }

    /// Advance the simulation by `dt`, reporting each phase to `observer`
    pub fn tick_observed<O: TickObserver>(&mut self, dt: f64, observer: &mut O) {
        let (particles, springs) = self.reap();
        if particles > 0 || springs > 0 {
            debug!(particles, springs, "reaped dead objects");
        }
        observer.on_reap(particles, springs);

        predict(&mut self.system.particles, dt);

        self.eval();
        observer.on_evaluate(&self.system);

        correct(&mut self.system.particles, dt);

        if let Some(bounds) = &self.bounds {
            enforce_bounds(&mut self.system.particles, bounds);
        }

        self.time += dt;
        observer.on_tick_complete(&self.system);
    }

    /// Drop dead springs (or springs touching a dead particle), then dead
    /// particles, recycling both. Returns `(particles, springs)` removed.
    fn reap(&mut self) -> (usize, usize) {
        let System { particles, springs } = &mut self.system;
        let spring_pool = &mut self.spring_pool;
        let particle_pool = &mut self.particle_pool;

        let dead_endpoint = |id: ParticleId| particles.get(id.0).map_or(true, Particle::is_dead);
        let mut detached = Vec::new();
        let reaped_springs = springs.reap(
            |_, s| s.is_dead || dead_endpoint(s.p1) || dead_endpoint(s.p2),
            |_, s| {
                detached.push(s.p1);
                detached.push(s.p2);
                spring_pool.release(s);
            },
        );
        for id in detached {
            if let Some(p) = particles.get_mut(id.0) {
                p.degree = p.degree.saturating_sub(1);
            }
        }

        let reaped_particles = particles.reap(|_, p| p.is_dead, |_, p| {
            particle_pool.release(p);
        });

        (reaped_particles, reaped_springs)
    }

    // Accessors ============================================================================

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.system.particle(id)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.system.particle_mut(id)
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.system.spring(id)
    }

    pub fn spring_mut(&mut self, id: SpringId) -> Option<&mut Spring> {
        self.system.springs.get_mut(id.0)
    }

    pub fn particles(&self) -> impl Iterator<Item = (ParticleId, &Particle)> + '_ {
        self.system.particles()
    }

    pub fn springs(&self) -> impl Iterator<Item = (SpringId, &Spring)> + '_ {
        self.system.springs()
    }

    pub fn particle_count(&self) -> usize {
        self.system.particle_count()
    }

    pub fn spring_count(&self) -> usize {
        self.system.spring_count()
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn forces(&self) -> &ForceSet {
        &self.forces
    }

    /// First registered force of type `T`, e.g. to tune the drag coefficient
    pub fn force<T: Force + 'static>(&self) -> Option<&T> {
        self.forces.find::<T>()
    }

    pub fn force_mut<T: Force + 'static>(&mut self) -> Option<&mut T> {
        self.forces.find_mut::<T>()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Sum of every `dt` ticked so far
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn particle_pool_len(&self) -> usize {
        self.particle_pool.len()
    }

    pub fn spring_pool_len(&self) -> usize {
        self.spring_pool.len()
    }

    pub fn node_pool_len(&self) -> usize {
        self.workspace.node_pool_len()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::layout(Parameters::default())
    }
}

pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use simulation::states::{Particle, ParticleId, Spring, SpringId, Bounds, NVec2};
pub use simulation::engine::{Simulation, System, LAYOUT_GRAVITATION};
pub use simulation::forces::{Force, ForceSet, Workspace, GravityForce, DragForce, SpringForce, DirectNBodyForce};
pub use simulation::barnes_hut::{NBodyForce, QuadTree, QuadTreeNode};
pub use simulation::integrator::{predict, correct, enforce_bounds};
pub use simulation::observer::{TickObserver, NoOpTickObserver};
pub use simulation::params::Parameters;
pub use simulation::pool::{ObjectPool, Recycle, DEFAULT_POOL_LIMIT};
pub use simulation::error::{SimError, SimResult};
pub use simulation::scenario::{Scenario, ParticleSnapshot};

pub use configuration::config::{EngineConfig, ForcesConfig, GravityConfig, NBodyConfig, DragConfig, BoundsConfig, ParticleConfig, SpringConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_nbody, bench_tick, bench_tick_curve};

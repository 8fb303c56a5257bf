pub mod states;
pub mod store;
pub mod pool;
pub mod params;
pub mod error;
pub mod engine;
pub mod forces;
pub mod integrator;
pub mod observer;
pub mod scenario;
pub mod barnes_hut;

//! Numerical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - default step size used by the scenario runner,
//! - seed for the jitter RNG,
//! - capacity of each object pool

use crate::simulation::pool::DEFAULT_POOL_LIMIT;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub dt: f64, // step size, conventionally one frame
    pub seed: u64, // jitter RNG seed
    pub pool_limit: usize, // max recycled objects kept per pool
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dt: 1.0,
            seed: 0,
            pool_limit: DEFAULT_POOL_LIMIT,
        }
    }
}

use thiserror::Error;

use crate::simulation::states::ParticleId;

/// Errors reported by the simulation's public operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Direct removal is not offered; kill the object and let the next tick reap it
    #[error("unsupported operation `{0}`: call kill() and let the next tick reap it")]
    Unsupported(&'static str),

    /// A particle handle that is stale or belongs to another simulation
    #[error("unknown particle handle {0:?}")]
    UnknownParticle(ParticleId),

    /// A scenario description that cannot be turned into a simulation
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

pub type SimResult<T> = Result<T, SimError>;

//! Tick observer hooks for hosts that want change notification.

use crate::simulation::engine::System;

/// Observe the phases of a [`Simulation`](crate::Simulation) tick.
///
/// A rendering host can implement `on_tick_complete` to push particle
/// positions to its visuals instead of polling. All methods default to no-ops.
pub trait TickObserver {
    /// Called after dead springs and particles were reaped
    fn on_reap(&mut self, _particles: usize, _springs: usize) {}

    /// Called after forces were evaluated at the predicted positions
    fn on_evaluate(&mut self, _sys: &System) {}

    /// Called when the tick is fully complete
    fn on_tick_complete(&mut self, _sys: &System) {}
}

/// Observer that ignores everything
pub struct NoOpTickObserver;

impl TickObserver for NoOpTickObserver {}

//! Semi-implicit leapfrog integration
//!
//! One tick is split around a force evaluation:
//! - `predict` advances positions a full step from the current velocity and
//!   the previous evaluation's forces, and stores a half-step velocity
//! - the caller re-evaluates forces at the new positions
//! - `correct` finishes the velocity update with the fresh forces
//!
//! `enforce_bounds` then clamps everything into the containment rectangle.

use crate::simulation::states::{Bounds, Particle};
use crate::simulation::store::Store;

/// Position update and half-step velocity prediction.
/// Inactive particles only age and have their velocity zeroed.
pub fn predict(particles: &mut Store<Particle>, dt: f64) {
    let half_dt = 0.5 * dt; // dt/2
    let half_dt2 = 0.5 * dt * dt; // dt^2/2

    for p in particles.values_mut() {
        p.age += dt;

        if !p.is_active {
            p.vx = 0.0;
            p.vy = 0.0;
            continue;
        }

        let ax = p.fx / p.mass;
        let ay = p.fy / p.mass;

        // x_n+1 = x_n + v_n dt + a_n dt^2/2
        p.x += p.vx * dt + ax * half_dt2;
        p.y += p.vy * dt + ay * half_dt2;

        // v_n+1/2 = v_n + a_n dt/2
        p.half_vx = p.vx + ax * half_dt;
        p.half_vy = p.vy + ay * half_dt;
    }
}

/// Finish the velocity update with forces evaluated at the predicted positions:
/// v_n+1 = v_n+1/2 + a_n+1 dt/2
pub fn correct(particles: &mut Store<Particle>, dt: f64) {
    let half_dt = 0.5 * dt;

    for p in particles.values_mut() {
        if p.is_active {
            let k = half_dt / p.mass;
            p.vx = p.half_vx + p.fx * k;
            p.vy = p.half_vy + p.fy * k;
        }
    }
}

/// Clamp every particle into `bounds`, zeroing the velocity on each clamped axis
pub fn enforce_bounds(particles: &mut Store<Particle>, bounds: &Bounds) {
    let (min_x, max_x) = (bounds.min_x(), bounds.max_x());
    let (min_y, max_y) = (bounds.min_y(), bounds.max_y());

    for p in particles.values_mut() {
        if p.x < min_x {
            p.x = min_x;
            p.vx = 0.0;
        } else if p.x > max_x {
            p.x = max_x;
            p.vx = 0.0;
        }

        if p.y < min_y {
            p.y = min_y;
            p.vy = 0.0;
        } else if p.y > max_y {
            p.y = max_y;
            p.vy = 0.0;
        }
    }
}

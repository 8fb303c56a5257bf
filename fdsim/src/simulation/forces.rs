//! Force contributors for the simulation
//!
//! Defines the `Force` trait, the ordered `ForceSet` the simulation evaluates
//! every tick, the `Workspace` forces share (jitter RNG and quadtree scratch),
//! and the simple force variants: uniform gravity, linear drag, springs and a
//! direct pairwise n-body sum. The Barnes–Hut n-body force lives in
//! `barnes_hut`.

use std::any::Any;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::barnes_hut::{is_finite, NBodyForce, QuadTree};
use crate::simulation::engine::System;
use crate::simulation::states::NVec2;

/// Jitter scale used to pull apart springs whose endpoints coincide
const SPRING_JITTER: f64 = 0.01;

/// Object-safe downcasting, so tuned forces can be found again after registration
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A force source operating on the whole [`System`].
///
/// Implementations add their contribution to each particle's `fx`/`fy`.
/// They must not add or remove particles or springs, and must not touch
/// positions or velocities.
pub trait Force: AsAny + Send + Sync {
    fn apply(&self, sys: &mut System, ws: &mut Workspace);
}

/// Ordered collection of force terms.
/// Order does not change the result mathematically, only the floating-point
/// summation order.
#[derive(Default)]
pub struct ForceSet {
    terms: Vec<Box<dyn Force>>,
}

impl ForceSet {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Builder-style append
    pub fn with<T>(mut self, term: T) -> Self
    where
        T: Force + 'static,
    {
        self.terms.push(Box::new(term));
        self
    }

    pub fn push<T>(&mut self, term: T)
    where
        T: Force + 'static,
    {
        self.terms.push(Box::new(term));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// First registered force of type `T`
    pub fn find<T: Force + 'static>(&self) -> Option<&T> {
        self.terms
            .iter()
            .find_map(|term| (**term).as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: Force + 'static>(&mut self) -> Option<&mut T> {
        self.terms
            .iter_mut()
            .find_map(|term| (**term).as_any_mut().downcast_mut::<T>())
    }

    /// Zero every force accumulator, then apply all terms in registration order
    pub fn evaluate(&self, sys: &mut System, ws: &mut Workspace) {
        for p in sys.particles.values_mut() {
            p.fx = 0.0;
            p.fy = 0.0;
        }
        for term in &self.terms {
            term.apply(sys, ws);
        }
    }
}

/// Mutable state shared by force evaluations: the seeded RNG used for
/// coincident-particle jitter and the reusable quadtree arena.
pub struct Workspace {
    pub(crate) rng: StdRng,
    pub(crate) quadtree: QuadTree,
}

impl Workspace {
    pub fn new(seed: u64, pool_limit: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            quadtree: QuadTree::with_pool_limit(pool_limit),
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Small random direction, each component in `(-scale/2, scale/2]`
    pub fn jitter(&mut self, scale: f64) -> NVec2 {
        jitter(&mut self.rng, scale)
    }

    /// Number of quadtree nodes currently parked in the node pool
    pub fn node_pool_len(&self) -> usize {
        self.quadtree.pool_len()
    }
}

pub(crate) fn jitter<R: Rng>(rng: &mut R, scale: f64) -> NVec2 {
    NVec2::new(
        scale * (0.5 - rng.gen::<f64>()),
        scale * (0.5 - rng.gen::<f64>()),
    )
}

/// Uniform acceleration field, e.g. gravity pulling every particle down
#[derive(Debug, Clone, Default)]
pub struct GravityForce {
    pub gx: f64,
    pub gy: f64,
}

impl GravityForce {
    pub fn new(gx: f64, gy: f64) -> Self {
        Self { gx, gy }
    }
}

impl Force for GravityForce {
    fn apply(&self, sys: &mut System, _ws: &mut Workspace) {
        if self.gx == 0.0 && self.gy == 0.0 {
            return;
        }
        for p in sys.particles.values_mut() {
            p.fx += self.gx * p.mass;
            p.fy += self.gy * p.mass;
        }
    }
}

/// Linear drag: F = -c * v
#[derive(Debug, Clone)]
pub struct DragForce {
    pub coefficient: f64,
}

impl DragForce {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl Default for DragForce {
    fn default() -> Self {
        Self { coefficient: 0.1 }
    }
}

impl Force for DragForce {
    fn apply(&self, sys: &mut System, _ws: &mut Workspace) {
        if self.coefficient == 0.0 {
            return;
        }
        for p in sys.particles.values_mut() {
            p.fx -= self.coefficient * p.vx;
            p.fy -= self.coefficient * p.vy;
        }
    }
}

/// Damped Hooke springs between particle pairs
#[derive(Debug, Clone, Default)]
pub struct SpringForce;

impl Force for SpringForce {
    fn apply(&self, sys: &mut System, ws: &mut Workspace) {
        let System { particles, springs, .. } = sys;

        for (_, spring) in springs.iter() {
            if spring.is_dead {
                continue;
            }
            let (Some(s), Some(t)) = (particles.get(spring.p1.0), particles.get(spring.p2.0)) else {
                continue;
            };

            // d points from t to s
            let mut d = s.position() - t.position();
            let dv = s.velocity() - t.velocity();
            let dn = d.norm();
            let dd = dn.max(1.0); // floor to avoid blowing up at tiny separations

            let mut k = spring.tension * (dn - spring.rest_length);
            k += spring.damping * d.dot(&dv) / dd;
            k /= dd;

            if dn == 0.0 {
                d = ws.jitter(SPRING_JITTER);
            }

            let f = -k * d;
            if let Some(s) = particles.get_mut(spring.p1.0) {
                s.fx += f.x;
                s.fy += f.y;
            }
            if let Some(t) = particles.get_mut(spring.p2.0) {
                t.fx -= f.x;
                t.fy -= f.y;
            }
        }
    }
}

/// Exact all-pairs version of [`NBodyForce`] (same force law, no tree).
/// O(n²); useful as a reference and as a baseline for small systems.
#[derive(Debug, Clone)]
pub struct DirectNBodyForce {
    pub gravitation: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub epsilon: f64,
}

impl Default for DirectNBodyForce {
    fn default() -> Self {
        Self::from(&NBodyForce::default())
    }
}

impl From<&NBodyForce> for DirectNBodyForce {
    fn from(bh: &NBodyForce) -> Self {
        Self {
            gravitation: bh.gravitation,
            min_distance: bh.min_distance,
            max_distance: bh.max_distance,
            epsilon: bh.epsilon,
        }
    }
}

impl Force for DirectNBodyForce {
    fn apply(&self, sys: &mut System, ws: &mut Workspace) {
        if self.gravitation == 0.0 {
            return;
        }
        let law = PairLaw {
            gravitation: self.gravitation,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            epsilon: self.epsilon,
        };

        let bodies: Vec<_> = sys
            .particles
            .iter()
            .filter(|(_, p)| is_finite(p))
            .map(|(key, p)| (key, p.position(), p.mass))
            .collect();
        let n = bodies.len();
        let mut out = vec![NVec2::zeros(); n];

        // Loop over each unordered pair (i, j) with i < j
        for i in 0..n {
            let (_, xi, mi) = bodies[i];
            for j in (i + 1)..n {
                let (_, xj, mj) = bodies[j];
                // i feels the force along +r, j along -r
                let f = law.force(xj - xi, mi, mj, ws.rng());
                out[i] += f;
                out[j] -= f;
            }
        }

        for ((key, _, _), f) in bodies.iter().zip(out.iter()) {
            if let Some(p) = sys.particles.get_mut(*key) {
                p.fx += f.x;
                p.fy += f.y;
            }
        }
    }
}

/// Inverse-square interaction shared by both n-body variants:
/// `F = G * m1 * m2 / d^2` along `r`, ignored beyond `max_distance` (when
/// positive) and clamped below at `min_distance`.
#[derive(Debug, Clone, Copy)]
pub struct PairLaw {
    pub gravitation: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub epsilon: f64,
}

impl PairLaw {
    /// Force on a body of mass `m_self` from a mass `m_other` displaced by `r`
    pub fn force<R: Rng>(&self, r: NVec2, m_self: f64, m_other: f64, rng: &mut R) -> NVec2 {
        let d = r.norm();
        if self.max_distance > 0.0 && d > self.max_distance {
            return NVec2::zeros();
        }
        let dir = if d == 0.0 { jitter(rng, self.epsilon) } else { r };
        let dd = d.max(self.min_distance);
        dir * (self.gravitation * m_self * m_other / (dd * dd * dd))
    }
}

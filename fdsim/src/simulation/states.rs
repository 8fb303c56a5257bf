//! Core state types for the force-directed simulation.
//!
//! Defines the 2D point-mass and spring types plus the handles used to refer
//! to them from outside the engine:
//! - `Particle` / `ParticleId`
//! - `Spring` / `SpringId`
//! - `Bounds`, the optional containment rectangle

use nalgebra::Vector2;

use crate::simulation::pool::Recycle;
use crate::simulation::store::Key;

pub type NVec2 = Vector2<f64>;

/// Handle to a particle owned by a `Simulation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParticleId(pub(crate) Key);

/// Handle to a spring owned by a `Simulation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpringId(pub(crate) Key);

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f64, // position
    pub y: f64,
    pub vx: f64, // velocity
    pub vy: f64,
    pub half_vx: f64, // predicted half-step velocity, only meaningful inside a tick
    pub half_vy: f64,
    pub fx: f64, // force accumulator, zeroed at the start of every evaluation
    pub fy: f64,
    pub mass: f64, // must be > 0
    pub is_active: bool, // inactive particles do not move on their own
    pub tag: Option<u64>, // host payload, never read by the engine
    pub(crate) degree: u32, // live springs attached
    pub(crate) age: f64, // accumulated dt
    pub(crate) is_dead: bool, // reaped at the start of the next tick
}

impl Particle {
    /// A resting, inactive particle
    pub fn new(mass: f64, x: f64, y: f64) -> Self {
        Self {
            mass,
            x,
            y,
            ..Self::default()
        }
    }

    pub(crate) fn init(&mut self, mass: f64, x: f64, y: f64) {
        self.mass = mass;
        self.x = x;
        self.y = y;
    }

    /// Schedule removal. The particle stays in the simulation until the next tick.
    pub fn kill(&mut self) {
        self.is_dead = true;
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn position(&self) -> NVec2 {
        NVec2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> NVec2 {
        NVec2::new(self.vx, self.vy)
    }

    pub fn force(&self) -> NVec2 {
        NVec2::new(self.fx, self.fy)
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * (self.vx * self.vx + self.vy * self.vy)
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            half_vx: 0.0,
            half_vy: 0.0,
            fx: 0.0,
            fy: 0.0,
            mass: 10.0,
            is_active: false,
            tag: None,
            degree: 0,
            age: 0.0,
            is_dead: false,
        }
    }
}

impl Recycle for Particle {}

/// Damped elastic link between two particles. Does not own its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    pub rest_length: f64, // separation at which no tension is applied
    pub tension: f64, // stiffness
    pub damping: f64, // friction along the spring axis
    pub(crate) p1: ParticleId,
    pub(crate) p2: ParticleId,
    pub(crate) is_dead: bool,
}

impl Spring {
    pub fn new(p1: ParticleId, p2: ParticleId, rest_length: f64, tension: f64, damping: f64) -> Self {
        Self {
            rest_length,
            tension,
            damping,
            p1,
            p2,
            is_dead: false,
        }
    }

    pub(crate) fn init(&mut self, p1: ParticleId, p2: ParticleId, rest_length: f64, tension: f64, damping: f64) {
        self.p1 = p1;
        self.p2 = p2;
        self.rest_length = rest_length;
        self.tension = tension;
        self.damping = damping;
    }

    pub fn kill(&mut self) {
        self.is_dead = true;
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub fn p1(&self) -> ParticleId {
        self.p1
    }

    pub fn p2(&self) -> ParticleId {
        self.p2
    }
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            rest_length: 10.0,
            tension: 0.1,
            damping: 0.1,
            p1: ParticleId::default(),
            p2: ParticleId::default(),
            is_dead: false,
        }
    }
}

impl Recycle for Spring {}

/// Axis-aligned containment rectangle, always stored with non-negative extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64, // left
    pub y: f64, // top
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Build from a corner and a signed extent. A negative width or height
    /// flips the rectangle so that `x`/`y` end up as the minimum corner.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: if width < 0.0 { x + width } else { x },
            y: if height < 0.0 { y + height } else { y },
            width: width.abs(),
            height: height.abs(),
        }
    }

    /// Rectangle anchored at the origin
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }
}

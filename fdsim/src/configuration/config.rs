//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! layout scenario. A scenario consists of:
//!
//! - [`EngineConfig`]    – step size, tick count, RNG seed, pool capacity
//! - [`ForcesConfig`]    – which forces to register and their constants
//! - [`BoundsConfig`]    – optional containment rectangle
//! - [`ParticleConfig`]  – initial state for each particle
//! - [`SpringConfig`]    – springs between particles, by index
//! - [`ScenarioConfig`]  – top-level wrapper
//!
//! # YAML format
//! A small triangle held together by springs:
//!
//! ```yaml
//! engine:
//!   dt: 1.0                 # step size (one frame)
//!   ticks: 300              # ticks to run
//!   seed: 7                 # jitter RNG seed
//!
//! forces:                   # omit the whole section for the default layout stack
//!   gravity: { gx: 0.0, gy: 0.0 }
//!   nbody:
//!     gravitation: -5.0     # negative repels
//!     theta: 0.9
//!   drag: { coefficient: 0.1 }
//!   spring: true
//!
//! bounds: { x: 0.0, y: 0.0, width: 400.0, height: 300.0 }
//!
//! particles:
//!   - { mass: 1.0, x: 100.0, y: 100.0 }
//!   - { mass: 1.0, x: 140.0, y: 100.0 }
//!   - { mass: 1.0, x: 120.0, y: 130.0, active: false }
//!
//! springs:
//!   - { a: 0, b: 1, rest_length: 50.0 }
//!   - { a: 1, b: 2, rest_length: 50.0, tension: 0.2, damping: 0.05 }
//! ```
//!
//! Forces listed are registered in the fixed order gravity, nbody, drag, spring.

use std::io::Read;

use serde::Deserialize;

use crate::simulation::barnes_hut::NBodyForce;
use crate::simulation::params::Parameters;
use crate::simulation::pool::DEFAULT_POOL_LIMIT;

/// Step size, run length and engine capacities
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub dt: f64, // step size
    pub ticks: usize, // how many ticks the runner performs
    pub seed: u64, // seed for coincident-particle jitter
    pub pool_limit: usize, // max recycled objects per pool
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            ticks: 300,
            seed: 0,
            pool_limit: DEFAULT_POOL_LIMIT,
        }
    }
}

impl From<&EngineConfig> for Parameters {
    fn from(cfg: &EngineConfig) -> Self {
        Parameters {
            dt: cfg.dt,
            seed: cfg.seed,
            pool_limit: cfg.pool_limit,
        }
    }
}

/// Uniform gravity
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GravityConfig {
    pub gx: f64,
    pub gy: f64,
}

/// Barnes–Hut n-body force constants
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NBodyConfig {
    pub gravitation: f64, // negative repels, positive attracts
    pub theta: f64, // Barnes–Hut opening threshold
    pub min_distance: f64,
    pub max_distance: f64, // <= 0 disables the cutoff
    pub epsilon: f64,
}

impl Default for NBodyConfig {
    fn default() -> Self {
        let f = NBodyForce::default();
        Self {
            gravitation: f.gravitation,
            theta: f.theta,
            min_distance: f.min_distance,
            max_distance: f.max_distance,
            epsilon: f.epsilon,
        }
    }
}

/// Linear drag
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DragConfig {
    pub coefficient: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self { coefficient: 0.1 }
    }
}

/// Force registration; a missing entry means the force is not registered
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ForcesConfig {
    pub gravity: Option<GravityConfig>,
    pub nbody: Option<NBodyConfig>,
    pub drag: Option<DragConfig>,
    #[serde(default)]
    pub spring: bool,
}

/// Containment rectangle; negative extents are normalized
#[derive(Deserialize, Debug, Clone)]
pub struct BoundsConfig {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Initial state of one particle
#[derive(Deserialize, Debug, Clone)]
pub struct ParticleConfig {
    pub mass: f64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    #[serde(default = "default_active")]
    pub active: bool, // hosts normally activate particles right away
    #[serde(default)]
    pub tag: Option<u64>,
}

fn default_active() -> bool {
    true
}

/// A spring between `particles[a]` and `particles[b]`
#[derive(Deserialize, Debug, Clone)]
pub struct SpringConfig {
    pub a: usize,
    pub b: usize,
    #[serde(default = "default_rest_length")]
    pub rest_length: f64,
    #[serde(default = "default_tension")]
    pub tension: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
}

fn default_rest_length() -> f64 {
    10.0
}

fn default_tension() -> f64 {
    0.1
}

fn default_damping() -> f64 {
    0.1
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub forces: Option<ForcesConfig>, // None -> default layout stack
    #[serde(default)]
    pub bounds: Option<BoundsConfig>,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub springs: Vec<SpringConfig>,
}

impl ScenarioConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(reader)
    }
}

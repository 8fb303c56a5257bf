//! # Barnes–Hut Quadtree (2D)
//!
//! This module implements the **Barnes–Hut n-body force** used to spread a
//! graph layout apart (negative gravitation) or pull it together (positive).
//! The naive `O(N²)` all-pairs sum is replaced by an approximate
//! `O(N log N)` traversal over a quadtree of aggregated masses.
//!
//! ## Core Concepts
//!
//! - The square enclosing all particles is recursively split into 4 quadrants.
//! - Each quadrant that received at least one particle becomes a node.
//! - A leaf node holds exactly one particle. Particles that sit within
//!   `epsilon` of a leaf's particle on both axes are pushed one level deeper
//!   instead of splitting the leaf, so such a node keeps its own particle and
//!   also has children.
//! - Every node stores:
//!   - total mass of its subtree
//!   - center of mass (COM)
//!   - bounding box (its size drives the opening criterion)
//!
//! ## Arena
//!
//! Nodes live in a flat `Vec` and refer to their children by index. The tree
//! is rebuilt on every evaluation; nodes are taken from an `ObjectPool` while
//! building and all handed back once the forces have been computed, so a
//! running simulation stops allocating nodes after its first few ticks.
//!
//! References:
//! J. Barnes and P. Hut, "A hierarchical O(N log N) force-calculation algorithm", Nature 324 (1986)
//! https://arborjs.org/docs/barnes-hut

use tracing::trace;

use crate::simulation::engine::System;
use crate::simulation::forces::{Force, PairLaw, Workspace};
use crate::simulation::pool::{ObjectPool, Recycle, DEFAULT_POOL_LIMIT};
use crate::simulation::states::{NVec2, Particle};
use crate::simulation::store::{Key, Store};

/// Beyond this depth a colliding pair is treated as coincident rather than
/// split again, which bounds subdivision for points that are almost equal.
const MAX_DEPTH: u32 = 96;

/// Snapshot of a particle taken while building the tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub key: Key,
    pub pos: NVec2,
    pub mass: f64,
}

/// A single quadtree node.
///
/// A node covers a square region and may contain:
/// - exactly one particle and no children (leaf, `body = Some(..)`)
/// - children only (internal node)
/// - children and its own particle (internal node whose particle coincided
///   with a later arrival)
#[derive(Debug, Clone)]
pub struct QuadTreeNode {
    pub mass: f64,
    pub com: NVec2,
    pub bbox_min: NVec2,
    pub bbox_max: NVec2,
    pub children: [Option<usize>; 4], // indices into QuadTree::nodes
    pub body: Option<Body>,
}

impl QuadTreeNode {
    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    /// Side length of the node's square
    pub fn size(&self) -> f64 {
        self.bbox_max.x - self.bbox_min.x
    }
}

impl Default for QuadTreeNode {
    fn default() -> Self {
        Self {
            mass: 0.0,
            com: NVec2::zeros(),
            bbox_min: NVec2::zeros(),
            bbox_max: NVec2::zeros(),
            children: [None; 4],
            body: None,
        }
    }
}

impl Recycle for QuadTreeNode {}

/// Index-addressed quadtree with a node pool
pub struct QuadTree {
    nodes: Vec<QuadTreeNode>,
    pool: ObjectPool<QuadTreeNode>,
    root: usize,
}

impl QuadTree {
    pub fn new() -> Self {
        Self::with_pool_limit(DEFAULT_POOL_LIMIT)
    }

    pub fn with_pool_limit(limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            pool: ObjectPool::with_limit(limit),
            root: 0,
        }
    }

    /// Rebuild the tree over every particle with finite coordinates.
    ///
    /// This:
    /// 1. Returns any nodes from a previous build to the pool.
    /// 2. Computes the square root region enclosing all finite particles.
    /// 3. Inserts each particle, subdividing nodes as needed.
    /// 4. Computes total mass and center of mass for every node (bottom-up).
    ///
    /// Returns `false` (and leaves the tree empty) if no particle could be inserted.
    pub fn build(&mut self, particles: &Store<Particle>, epsilon: f64) -> bool {
        self.clear();

        let Some((bbox_min, bbox_max)) = compute_global_bbox(particles) else {
            return false;
        };
        self.root = self.alloc_node(bbox_min, bbox_max);

        for (key, p) in particles.iter() {
            if !is_finite(p) {
                continue;
            }
            let body = Body {
                key,
                pos: p.position(),
                mass: p.mass,
            };
            self.insert_body(body, epsilon);
        }

        self.compute_mass_and_com();
        true
    }

    /// Hand every node back to the pool
    pub fn clear(&mut self) {
        let pool = &mut self.pool;
        for node in self.nodes.drain(..) {
            pool.release(node);
        }
        self.root = 0;
    }

    /// Accumulated force on `target` from every other body in the tree.
    ///
    /// The walk uses an explicit stack, since a cluster of coincident
    /// particles builds a chain as deep as the cluster is large.
    ///
    /// - A leaf holding some other particle, or a node that is far enough away
    ///   (`size / distance < theta`), acts as a single mass at its COM.
    /// - Otherwise the children are visited, followed by the node's own
    ///   particle if it has one.
    /// - A leaf holding `target` itself contributes nothing.
    pub fn force_on_body<R: rand::Rng>(&self, target: &Body, law: &PairLaw, theta: f64, rng: &mut R) -> NVec2 {
        let mut acc = NVec2::zeros();
        if self.nodes.is_empty() {
            return acc;
        }

        // (node, own particle only)
        let mut stack = vec![(self.root, false)];
        while let Some((node_idx, own_only)) = stack.pop() {
            let node = &self.nodes[node_idx];

            if own_only {
                if let Some(b) = node.body {
                    if b.key != target.key {
                        acc += law.force(b.pos - target.pos, target.mass, b.mass, rng);
                    }
                }
                continue;
            }

            let has_children = node.has_children();
            let r = node.com - target.pos;
            let dist = r.norm();

            let other_leaf = !has_children && node.body.is_some_and(|b| b.key != target.key);

            if other_leaf || node.size() / dist < theta {
                acc += law.force(r, target.mass, node.mass, rng);
            } else if has_children {
                // popped after every child subtree
                stack.push((node_idx, true));
                for &child in node.children.iter().rev().flatten() {
                    stack.push((child, false));
                }
            }
        }
        acc
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn root(&self) -> Option<&QuadTreeNode> {
        self.nodes.get(self.root)
    }

    pub fn node(&self, idx: usize) -> Option<&QuadTreeNode> {
        self.nodes.get(idx)
    }

    // helpers ==============================================================================

    fn alloc_node(&mut self, bbox_min: NVec2, bbox_max: NVec2) -> usize {
        let mut node = self.pool.acquire();
        node.bbox_min = bbox_min;
        node.bbox_max = bbox_max;
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Index of the child quadrant of `node_idx` containing `pos`, created on demand
    fn child_for(&mut self, node_idx: usize, pos: &NVec2) -> usize {
        let bbox_min = self.nodes[node_idx].bbox_min;
        let bbox_max = self.nodes[node_idx].bbox_max;
        let quadrant = child_index_for_point(pos, &bbox_min, &bbox_max);

        match self.nodes[node_idx].children[quadrant] {
            Some(idx) => idx,
            None => {
                let (cmin, cmax) = child_bbox(&bbox_min, &bbox_max, quadrant);
                let idx = self.alloc_node(cmin, cmax);
                self.nodes[node_idx].children[quadrant] = Some(idx);
                idx
            }
        }
    }

    /// Walk down from the root until `body` finds a home:
    ///
    /// - node has children -> descend into the matching quadrant
    /// - empty leaf -> store the body here
    /// - occupied leaf, same location (or too deep) -> keep the occupant, descend
    /// - occupied leaf otherwise -> move the occupant into its quadrant, descend
    fn insert_body(&mut self, body: Body, epsilon: f64) {
        let mut node_idx = self.root;
        let mut depth = 0;

        loop {
            if self.nodes[node_idx].has_children() {
                node_idx = self.child_for(node_idx, &body.pos);
                depth += 1;
                continue;
            }

            let Some(existing) = self.nodes[node_idx].body else {
                self.nodes[node_idx].body = Some(body);
                return;
            };

            if !(is_same_location(&existing, &body, epsilon) || depth >= MAX_DEPTH) {
                // split: the fresh child is empty, so the occupant lands there directly
                self.nodes[node_idx].body = None;
                let child = self.child_for(node_idx, &existing.pos);
                self.nodes[child].body = Some(existing);
            }

            node_idx = self.child_for(node_idx, &body.pos);
            depth += 1;
        }
    }

    /// Compute total mass and center of mass for every node.
    ///
    /// Children are always allocated after their parent, so walking the arena
    /// backwards visits every child before its parent. For each node the
    /// children's mass-weighted centers are summed, then its own particle.
    /// A plain leaf takes its particle's position verbatim.
    fn compute_mass_and_com(&mut self) {
        for idx in (0..self.nodes.len()).rev() {
            let children = self.nodes[idx].children;
            let body = self.nodes[idx].body;

            if children.iter().all(Option::is_none) {
                let node = &mut self.nodes[idx];
                match body {
                    Some(b) => {
                        node.mass = b.mass;
                        node.com = b.pos;
                    }
                    None => {
                        node.mass = 0.0;
                        node.com = (node.bbox_min + node.bbox_max) * 0.5;
                    }
                }
                continue;
            }

            let mut mass = 0.0;
            let mut weighted = NVec2::zeros();
            for &child in children.iter().flatten() {
                let cn = &self.nodes[child];
                mass += cn.mass;
                weighted += cn.com * cn.mass;
            }
            if let Some(b) = body {
                mass += b.mass;
                weighted += b.pos * b.mass;
            }

            let node = &mut self.nodes[idx];
            node.mass = mass;
            node.com = if mass != 0.0 {
                weighted / mass
            } else {
                (node.bbox_min + node.bbox_max) * 0.5
            };
        }
    }
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Barnes–Hut approximation of an inverse-square force between all particles.
/// Negative `gravitation` repels (the usual layout setting), positive attracts.
#[derive(Debug, Clone)]
pub struct NBodyForce {
    pub gravitation: f64, // G
    pub theta: f64, // opening threshold; 0 means exact pairwise
    pub min_distance: f64, // closer pairs interact as if this far apart
    pub max_distance: f64, // pairs further apart are ignored; <= 0 disables the cutoff
    pub epsilon: f64, // "same location" tolerance and jitter scale
}

impl NBodyForce {
    pub fn new(gravitation: f64) -> Self {
        Self {
            gravitation,
            ..Self::default()
        }
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_distance_range(mut self, min_distance: f64, max_distance: f64) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    pub fn law(&self) -> PairLaw {
        PairLaw {
            gravitation: self.gravitation,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            epsilon: self.epsilon,
        }
    }
}

impl Default for NBodyForce {
    fn default() -> Self {
        Self {
            gravitation: -1.0,
            theta: 0.9,
            min_distance: 2.0,
            max_distance: 200.0,
            epsilon: 0.01,
        }
    }
}

impl Force for NBodyForce {
    fn apply(&self, sys: &mut System, ws: &mut Workspace) {
        if self.gravitation == 0.0 {
            return;
        }
        let Workspace { rng, quadtree } = ws;

        if !quadtree.build(&sys.particles, self.epsilon) {
            return;
        }
        trace!(nodes = quadtree.len(), particles = sys.particles.len(), "quadtree built");

        let law = self.law();
        for (key, p) in sys.particles.iter_mut() {
            if !is_finite(p) {
                continue;
            }
            let target = Body {
                key,
                pos: p.position(),
                mass: p.mass,
            };
            let f = quadtree.force_on_body(&target, &law, self.theta, rng);
            p.fx += f.x;
            p.fy += f.y;
        }

        quadtree.clear();
    }
}

// helpers ===========================================================================

pub(crate) fn is_finite(p: &Particle) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

fn is_same_location(a: &Body, b: &Body, epsilon: f64) -> bool {
    (a.pos.x - b.pos.x).abs() < epsilon && (a.pos.y - b.pos.y).abs() < epsilon
}

/// Compute the square root region enclosing all finite particles.
///
/// The axis-aligned bounding box is squared by extending its shorter side
/// from the minimum corner, so every node is a square and its "size" is a
/// single number. Returns `None` when there is nothing to enclose.
fn compute_global_bbox(particles: &Store<Particle>) -> Option<(NVec2, NVec2)> {
    let mut min = NVec2::new(f64::INFINITY, f64::INFINITY);
    let mut max = NVec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut any = false;

    for p in particles.values().filter(|p| is_finite(p)) {
        any = true;
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if !any {
        return None;
    }

    let dx = max.x - min.x;
    let dy = max.y - min.y;
    if dx > dy {
        max.y = min.y + dx;
    } else {
        max.x = min.x + dy;
    }
    Some((min, max))
}

/// Quadrant index of `p` within a node's box.
///
/// - Bit 0 (value 1): X axis, 0 for left (x < center.x), 1 for right
/// - Bit 1 (value 2): Y axis, 0 for low (y < center.y), 1 for high
fn child_index_for_point(p: &NVec2, bbox_min: &NVec2, bbox_max: &NVec2) -> usize {
    let center = (bbox_min + bbox_max) * 0.5;
    let mut idx = 0;

    if p.x >= center.x { idx |= 1; } // bit 0
    if p.y >= center.y { idx |= 2; } // bit 1

    idx
}

/// Bounding box of child quadrant `child_idx`, same bit layout as
/// [`child_index_for_point`].
fn child_bbox(parent_min: &NVec2, parent_max: &NVec2, child_idx: usize) -> (NVec2, NVec2) {
    let center = (parent_min + parent_max) * 0.5;

    let mut min = *parent_min;
    let mut max = *parent_max;

    if (child_idx & 1) == 0 {
        max.x = center.x;
    } else {
        min.x = center.x;
    }

    if (child_idx & 2) == 0 {
        max.y = center.y;
    } else {
        min.y = center.y;
    }

    (min, max)
}

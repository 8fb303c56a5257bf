//! Bounded object recycling
//!
//! Reaped particles, springs and quadtree nodes are pushed onto a per-simulation
//! stack and handed back out on the next allocation. Items are reset when they
//! are released, so anything acquired reads as freshly initialized. Once the
//! stack holds `limit` items, further releases are dropped.

/// Default maximum number of items kept by each pool
pub const DEFAULT_POOL_LIMIT: usize = 5000;

/// Types that can be wiped back to their initial state for reuse
pub trait Recycle: Default {
    fn recycle(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
pub struct ObjectPool<T: Recycle> {
    items: Vec<T>,
    limit: usize,
}

impl<T: Recycle> ObjectPool<T> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_POOL_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    /// Pop a recycled item, or build a fresh one when the pool is empty
    pub fn acquire(&mut self) -> T {
        self.items.pop().unwrap_or_default()
    }

    /// Reset `item` and keep it if there is room. Returns false if it was dropped.
    pub fn release(&mut self, mut item: T) -> bool {
        if self.items.len() >= self.limit {
            return false;
        }
        item.recycle();
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<T: Recycle> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

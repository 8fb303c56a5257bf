//! Generational slot storage for particles and springs
//!
//! Values are addressed by a `Key` (slot index + generation). Removing a value
//! bumps the slot generation, so keys handed out earlier stop resolving even
//! after the slot is reused. Live values iterate in insertion order.

/// Opaque slot address: index into the slot vector plus the generation it was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    /// A key that never resolves
    pub const NULL: Key = Key {
        index: u32::MAX,
        generation: 0,
    };
}

impl Default for Key {
    fn default() -> Self {
        Key::NULL
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct Store<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,     // vacant slot indices
    order: Vec<u32>,    // live slot indices, insertion order
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Place `value` in a vacant slot (or a new one) and return its key
    pub fn insert(&mut self, value: T) -> Key {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                index
            }
        };
        self.order.push(index);
        Key {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Live `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &T)> + '_ {
        self.order.iter().filter_map(move |&index| {
            let slot = &self.slots[index as usize];
            slot.value.as_ref().map(|v| {
                (
                    Key {
                        index,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Live values, mutably, in slot order.
    /// Only for per-value updates that do not depend on visiting order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(|s| s.value.as_mut())
    }

    /// Live `(key, value)` pairs, mutably, in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Key, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|v| {
                (
                    Key {
                        index: index as u32,
                        generation,
                    },
                    v,
                )
            })
        })
    }

    /// Remove every value for which `dead` returns true, handing each one to `sink`.
    /// Survivors keep their relative order. Returns how many were removed.
    pub fn reap<D, S>(&mut self, mut dead: D, mut sink: S) -> usize
    where
        D: FnMut(Key, &T) -> bool,
        S: FnMut(Key, T),
    {
        let mut removed = 0;
        let slots = &mut self.slots;
        let free = &mut self.free;
        self.order.retain(|&index| {
            let slot = &mut slots[index as usize];
            let key = Key {
                index,
                generation: slot.generation,
            };
            let is_dead = match slot.value.as_ref() {
                Some(v) => dead(key, v),
                None => true,
            };
            if !is_dead {
                return true;
            }
            if let Some(value) = slot.value.take() {
                sink(key, value);
                removed += 1;
            }
            slot.generation = slot.generation.wrapping_add(1);
            free.push(index);
            false
        });
        removed
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Generational storage for quads, keyed by handle and by path.

use quadsphere_cubesphere::QuadPath;
use rustc_hash::FxHashMap;

use crate::quad::Quad;

/// Index of a quad slot plus the generation it was issued under. A handle
/// to a freed slot never resolves, even after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuadHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    quad: Option<Quad>,
}

/// Owns every live quad. Removed records are reset and kept in a small pool
/// for reuse.
#[derive(Debug)]
pub(crate) struct QuadArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_path: FxHashMap<QuadPath, QuadHandle>,
    pool: Vec<Quad>,
    pool_capacity: usize,
}

impl QuadArena {
    pub(crate) const POOL_CAPACITY: usize = 30;

    pub(crate) fn new(pool_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_path: FxHashMap::default(),
            pool: Vec::with_capacity(pool_capacity),
            pool_capacity,
        }
    }

    /// Create a quad for `path` and register it. Returns `None` if the path
    /// is already live.
    pub(crate) fn insert(&mut self, path: QuadPath, parent: Option<QuadHandle>) -> Option<QuadHandle> {
        if self.by_path.contains_key(&path) {
            return None;
        }
        let quad = match self.pool.pop() {
            Some(mut record) => {
                record.reuse(path.clone(), parent);
                record
            }
            None => Quad::new(path.clone(), parent),
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.quad = Some(quad);
                QuadHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    quad: Some(quad),
                });
                QuadHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_path.insert(path, handle);
        Some(handle)
    }

    /// Unregister and recycle a quad. Its slot generation is bumped so
    /// outstanding handles go stale.
    pub(crate) fn remove(&mut self, handle: QuadHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(mut quad) = slot.quad.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_path.remove(&quad.path);

        if self.pool.len() < self.pool_capacity {
            quad.reset();
            self.pool.push(quad);
        }
        true
    }

    pub(crate) fn get(&self, handle: QuadHandle) -> Option<&Quad> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.quad.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: QuadHandle) -> Option<&mut Quad> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.quad.as_mut())
    }

    pub(crate) fn find(&self, path: &str) -> Option<QuadHandle> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Handles of all live quads, in slot order.
    pub(crate) fn handles(&self) -> Vec<QuadHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.quad.is_some())
            .map(|(index, slot)| QuadHandle {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.slots.iter().filter_map(|slot| slot.quad.as_ref())
    }

    pub(crate) fn pooled(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> QuadPath {
        QuadPath::parse(s).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let mut arena = QuadArena::new(QuadArena::POOL_CAPACITY);
        let h = arena.insert(path("03"), None).unwrap();
        assert_eq!(arena.find("03"), Some(h));
        assert_eq!(arena.get(h).unwrap().path().as_str(), "03");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut arena = QuadArena::new(QuadArena::POOL_CAPACITY);
        assert!(arena.insert(path("03"), None).is_some());
        assert!(arena.insert(path("03"), None).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_removed_handle_goes_stale_after_reuse() {
        let mut arena = QuadArena::new(QuadArena::POOL_CAPACITY);
        let old = arena.insert(path("030"), None).unwrap();
        assert!(arena.remove(old));
        assert!(!arena.remove(old), "double remove must fail");
        assert_eq!(arena.find("030"), None);

        let new = arena.insert(path("031"), None).unwrap();
        assert_eq!(new.index, old.index, "slot should be reused");
        assert_ne!(new.generation, old.generation);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new).unwrap().path().as_str(), "031");
    }

    #[test]
    fn test_pool_is_bounded() {
        let mut arena = QuadArena::new(2);
        let handles: Vec<QuadHandle> = (0..4)
            .map(|q| arena.insert(path("03").child(q), None).unwrap())
            .collect();
        for h in &handles {
            arena.remove(*h);
        }
        assert_eq!(arena.pooled(), 2);
        assert_eq!(arena.len(), 0);

        let h = arena.insert(path("0322"), None).unwrap();
        assert_eq!(arena.pooled(), 1);
        let quad = arena.get(h).unwrap();
        assert!(quad.children().is_none() && !quad.is_initialized());
    }

    #[test]
    fn test_handles_lists_live_quads() {
        let mut arena = QuadArena::new(QuadArena::POOL_CAPACITY);
        let a = arena.insert(path("01"), None).unwrap();
        let b = arena.insert(path("21"), None).unwrap();
        arena.remove(a);
        assert_eq!(arena.handles(), vec![b]);
        assert!(arena.get(b).is_some());
        assert_eq!(arena.iter().count(), 1);
    }
}

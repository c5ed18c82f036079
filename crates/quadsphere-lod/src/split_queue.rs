//! Quads waiting to split, coarse and close first.

use std::cmp::Ordering;

use crate::arena::QuadHandle;

#[derive(Clone, Copy, Debug)]
struct SplitEntry {
    handle: QuadHandle,
    level: u8,
    distance_sqr: f32,
    started: bool,
    /// Queued so a finer neighbor can split. Survives distance updates.
    forced: bool,
}

impl SplitEntry {
    /// Started entries stay in front so they keep their active slot.
    fn order(&self, other: &Self) -> Ordering {
        other
            .started
            .cmp(&self.started)
            .then(self.level.cmp(&other.level))
            .then(self.distance_sqr.total_cmp(&other.distance_sqr))
    }
}

/// Ordered split requests. The caller walks them in order and starts as many
/// as it has slots for; an entry stays in the queue until its split completes.
#[derive(Debug, Default)]
pub(crate) struct SplitQueue {
    entries: Vec<SplitEntry>,
}

impl SplitQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `handle`, or refresh its distance if already queued.
    pub(crate) fn push(&mut self, handle: QuadHandle, level: u8, distance_sqr: f32, forced: bool) {
        match self.entries.iter_mut().find(|e| e.handle == handle) {
            Some(entry) => {
                entry.distance_sqr = distance_sqr;
                entry.forced |= forced;
            }
            None => self.entries.push(SplitEntry {
                handle,
                level,
                distance_sqr,
                started: false,
                forced,
            }),
        }
    }

    /// Remove `handle` unless it was queued on behalf of a neighbor or its
    /// split already started.
    pub(crate) fn withdraw(&mut self, handle: QuadHandle) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.handle != handle || e.forced || e.started);
        self.entries.len() != before
    }

    pub(crate) fn remove(&mut self, handle: QuadHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub(crate) fn mark_started(&mut self, handle: QuadHandle) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.handle == handle) {
            entry.started = true;
        }
    }

    pub(crate) fn is_started(&self, handle: QuadHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle && e.started)
    }

    /// Sort and return every queued handle, running splits first.
    pub(crate) fn ordered(&mut self) -> Vec<QuadHandle> {
        self.entries.sort_by(SplitEntry::order);
        self.entries.iter().map(|e| e.handle).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

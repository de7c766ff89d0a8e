//! Thread-safe set of claimed overlay polygons.

use hashbrown::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Records which overlay polygons (by collection index) already belong to a
/// base polygon. Identity is the position in the overlay collection, never
/// the geometry, so two equal polygons are claimed independently.
#[derive(Debug, Default)]
pub struct ClaimSet {
    claimed: Mutex<HashSet<usize>>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<usize>> {
        // The set is never left half-updated, so a poisoned lock is still usable.
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.lock().contains(&id)
    }

    /// Atomic check-and-set: `true` iff this call claimed `id`.
    pub fn try_claim(&self, id: usize) -> bool {
        self.lock().insert(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn into_inner(self) -> HashSet<usize> {
        self.claimed.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

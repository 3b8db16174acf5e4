//! Destructor counting for element types.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hands out [`Tracked`] values and counts how many have been dropped.
#[derive(Clone, Debug, Default)]
pub struct DropTracker {
    drops: Arc<AtomicUsize>,
}

impl DropTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new tracked element carrying `id`.
    pub fn track(&self, id: usize) -> Tracked {
        Tracked {
            id,
            drops: Arc::clone(&self.drops),
        }
    }

    /// Number of tracked elements dropped so far.
    pub fn dropped(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Element whose destructor increments its tracker's count.
#[derive(Debug)]
pub struct Tracked {
    pub id: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

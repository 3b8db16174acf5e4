//! Test utilities and instrumented allocators for arrayptr development.
//!
//! - [`CountingAlloc`]: forwards to [`Global`] and records every
//!   allocation and deallocation, rejecting frees that do not match a live
//!   allocation.
//! - [`FailingAlloc`]: refuses every allocation after the first `n`.
//! - [`DropTracker`]: element type factory that counts destructor runs.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod drops;

pub use drops::{DropTracker, Tracked};

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use arrayptr::{AllocError, ArrayAlloc, Global};

/// One recorded allocator call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocEvent {
    Allocated { addr: usize, layout: Layout },
    Deallocated { addr: usize, layout: Layout },
}

/// Allocation-counting test double.
///
/// Share one instance between handles with `ArrayPtr::with_len_in(n, &alloc)`.
///
/// # Panics
///
/// `deallocate` panics if the block is not live or the layout differs from
/// the one it was allocated with.
#[derive(Debug, Default)]
pub struct CountingAlloc {
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    events: Mutex<Vec<AllocEvent>>,
}

impl CountingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `allocate` calls.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Number of `deallocate` calls.
    pub fn deallocations(&self) -> usize {
        self.deallocations.load(Ordering::SeqCst)
    }

    /// Blocks allocated and not yet freed.
    pub fn live(&self) -> usize {
        self.allocations() - self.deallocations()
    }

    /// All recorded calls in order.
    pub fn events(&self) -> Vec<AllocEvent> {
        self.lock_events().clone()
    }

    /// Number of times the block at `addr` was freed.
    pub fn frees_of(&self, addr: *const u8) -> usize {
        let addr = addr as usize;
        self.lock_events()
            .iter()
            .filter(|e| matches!(e, AllocEvent::Deallocated { addr: a, .. } if *a == addr))
            .count()
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<AllocEvent>> {
        // A panicking assertion elsewhere must not hide the log.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_layout(events: &[AllocEvent], addr: usize) -> Option<Layout> {
        let mut live = None;
        for event in events {
            match *event {
                AllocEvent::Allocated { addr: a, layout } if a == addr => live = Some(layout),
                AllocEvent::Deallocated { addr: a, .. } if a == addr => live = None,
                _ => {}
            }
        }
        live
    }
}

#[allow(unsafe_code)]
// SAFETY: every block comes from `Global`.
unsafe impl ArrayAlloc for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.lock_events().push(AllocEvent::Allocated {
            addr: ptr.as_ptr() as usize,
            layout,
        });
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let addr = ptr.as_ptr() as usize;
        {
            let mut events = self.lock_events();
            match Self::live_layout(&events, addr) {
                Some(allocated) => assert_eq!(
                    allocated, layout,
                    "block {addr:#x} freed with a layout it was not allocated with"
                ),
                None => panic!("block {addr:#x} freed but not live"),
            }
            events.push(AllocEvent::Deallocated { addr, layout });
        }
        self.deallocations.fetch_add(1, Ordering::SeqCst);
        // SAFETY: `ptr` is a live `Global` block with `layout` (checked above).
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Allocator that succeeds `n` times, then refuses every request.
#[derive(Debug)]
pub struct FailingAlloc {
    succeed: usize,
    attempts: AtomicUsize,
    inner: CountingAlloc,
}

impl FailingAlloc {
    pub fn new(succeed: usize) -> Self {
        Self {
            succeed,
            attempts: AtomicUsize::new(0),
            inner: CountingAlloc::new(),
        }
    }

    /// Allocator that refuses every request.
    pub fn always() -> Self {
        Self::new(0)
    }

    /// Number of `allocate` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Counters for the calls that were forwarded.
    pub fn inner(&self) -> &CountingAlloc {
        &self.inner
    }
}

#[allow(unsafe_code)]
// SAFETY: every block comes from the inner `CountingAlloc`.
unsafe impl ArrayAlloc for FailingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.succeed {
            return Err(AllocError);
        }
        self.inner.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}

//! The allocator seam behind [`ArrayPtr`](crate::ArrayPtr).
//!
//! A handle frees its block through the same allocator value it was
//! allocated with, so the allocate/deallocate pair is always symmetric.
//! [`Global`] forwards to the process allocator; tests substitute an
//! instrumented implementation to count and verify calls.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::error::AllocError;

/// A source of raw memory blocks for [`ArrayPtr`](crate::ArrayPtr).
///
/// # Safety
///
/// Implementors must uphold:
///
/// - A block returned by [`allocate`](ArrayAlloc::allocate) is valid for
///   reads and writes of `layout.size()` bytes, aligned to `layout.align()`,
///   and stays valid until passed to [`deallocate`](ArrayAlloc::deallocate).
/// - If the allocator implements `Clone`, every clone must be able to
///   deallocate blocks allocated by the original or by any other clone.
///   A `Clone` that creates an independent pool is not a valid
///   implementation.
/// - Distinct live blocks never overlap.
pub unsafe trait ArrayAlloc {
    /// Allocate a block fitting `layout`. `layout.size()` is never zero.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](ArrayAlloc::allocate)
    /// on this allocator with the same `layout`, and must not be used
    /// afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator (`std::alloc`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: forwards to `std::alloc::{alloc, dealloc}`, which uphold the
// trait contract for non-zero-sized layouts.
unsafe impl ArrayAlloc for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0, "zero-sized block requested");
        // SAFETY: `layout` has non-zero size (every block carries a header).
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// SAFETY: delegates to `A`, which upholds the contract.
unsafe impl<A: ArrayAlloc + ?Sized> ArrayAlloc for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

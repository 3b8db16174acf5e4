//! Low-level primitives for array block memory.
//!
//! A block is a [`Header`] followed by the elements at
//! [`elements_offset`]. Only the element address leaves this module; the
//! header is recovered from it by a constant negative offset.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::mem::{self, align_of, size_of};
use std::ptr::{self, NonNull};

use crate::alloc::ArrayAlloc;
use crate::error::ArrayError;

/// Per-block bookkeeping stored in front of the elements.
#[repr(C)]
struct Header {
    /// Number of initialised elements in the block.
    len: usize,
}

/// Byte offset from the block base to the first element.
///
/// Depends only on `T`'s alignment, never on the element count.
pub(crate) const fn elements_offset<T>() -> usize {
    let align = align_of::<T>();
    (size_of::<Header>() + align - 1) & !(align - 1)
}

/// Layout of a block holding `len` elements of `T`.
pub(crate) fn block_layout<T>(len: usize) -> Result<Layout, ArrayError> {
    let overflow = || ArrayError::CapacityOverflow {
        len,
        elem_size: size_of::<T>(),
    };
    let elements = Layout::array::<T>(len).map_err(|_| overflow())?;
    let (block, offset) = Layout::new::<Header>()
        .extend(elements)
        .map_err(|_| overflow())?;
    debug_assert_eq!(offset, elements_offset::<T>());
    Ok(block.pad_to_align())
}

/// Layout of a block that is known to have been allocated for `len` elements.
///
/// # Safety
///
/// `block_layout::<T>(len)` must have succeeded before (the block exists).
unsafe fn block_layout_unchecked<T>(len: usize) -> Layout {
    let size = elements_offset::<T>() + size_of::<T>() * len;
    let align = align_of::<Header>().max(align_of::<T>());
    // SAFETY: `align` is a power of two and `size` was validated against
    // `isize::MAX` when the block was allocated.
    let layout = unsafe { Layout::from_size_align_unchecked(size, align) }.pad_to_align();
    debug_assert_eq!(Ok(layout), block_layout::<T>(len));
    layout
}

/// Allocate a block of `len` elements, initialising element `i` with `init(i)`.
///
/// If `init` panics, the elements written so far are dropped and the block
/// is returned to `alloc` before the panic propagates.
pub(crate) fn allocate<T, A, F>(len: usize, mut init: F, alloc: &A) -> Result<NonNull<T>, ArrayError>
where
    A: ArrayAlloc + ?Sized,
    F: FnMut(usize) -> T,
{
    debug_assert!(len > 0, "zero-length blocks are never allocated");
    let layout = block_layout::<T>(len)?;
    let base = alloc.allocate(layout).map_err(|_| {
        debug!(
            "allocation of {} x {} refused ({} bytes, align {})",
            len,
            std::any::type_name::<T>(),
            layout.size(),
            layout.align()
        );
        ArrayError::AllocFailed {
            size: layout.size(),
            align: layout.align(),
        }
    })?;

    // SAFETY: `base` is valid for `layout.size()` bytes and aligned to
    // `layout.align() >= align_of::<Header>()`; the header sits at offset 0.
    unsafe { base.cast::<Header>().as_ptr().write(Header { len }) };
    // SAFETY: `elements_offset + len * size_of::<T>() <= layout.size()`,
    // so the offset stays inside the block.
    let elements = unsafe { base.add(elements_offset::<T>()) }.cast::<T>();

    let mut guard = InitGuard {
        base,
        elements,
        initialized: 0,
        layout,
        alloc,
    };
    while guard.initialized < len {
        let value = init(guard.initialized);
        // SAFETY: `initialized < len`, so the slot is inside the block and
        // not yet written.
        unsafe { guard.elements.as_ptr().add(guard.initialized).write(value) };
        guard.initialized += 1;
    }
    mem::forget(guard);

    trace!(
        "allocated {} x {} at {:p}",
        len,
        std::any::type_name::<T>(),
        elements
    );
    Ok(elements)
}

/// Number of elements in the block owning `elements`.
///
/// # Safety
///
/// `elements` must be the element address of a live block produced by
/// [`allocate`].
pub(crate) unsafe fn len<T>(elements: NonNull<T>) -> usize {
    // SAFETY: forwarded caller contract; the header precedes the elements.
    unsafe { header(elements).as_ref().len }
}

/// Drop every element of the block and return it to `alloc`.
///
/// # Safety
///
/// `elements` must be the element address of a live block produced by
/// [`allocate`] with an allocator equivalent to `alloc`. The block must not
/// be used afterwards.
pub(crate) unsafe fn destroy<T, A: ArrayAlloc + ?Sized>(elements: NonNull<T>, alloc: &A) {
    // SAFETY: forwarded caller contract.
    let header = unsafe { header(elements) };
    // SAFETY: the header was written by `allocate` and is still live.
    let len = unsafe { header.as_ref().len };
    // SAFETY: the block was allocated for exactly `len` elements.
    let layout = unsafe { block_layout_unchecked::<T>(len) };

    // Frees the block even if an element destructor panics.
    let _free = FreeOnDrop {
        base: header.cast::<u8>(),
        layout,
        alloc,
    };
    // SAFETY: all `len` elements are initialised and owned by the block.
    unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(elements.as_ptr(), len)) };

    trace!(
        "released {} x {} at {:p}",
        len,
        std::any::type_name::<T>(),
        elements
    );
}

/// # Safety
///
/// `elements` must be the element address of a live block.
unsafe fn header<T>(elements: NonNull<T>) -> NonNull<Header> {
    // SAFETY: the header starts `elements_offset` bytes before the elements,
    // inside the same allocation.
    unsafe { elements.cast::<u8>().sub(elements_offset::<T>()) }.cast::<Header>()
}

/// Unwind cleanup for a block whose elements are only partially written.
struct InitGuard<'a, T, A: ArrayAlloc + ?Sized> {
    base: NonNull<u8>,
    elements: NonNull<T>,
    initialized: usize,
    layout: Layout,
    alloc: &'a A,
}

impl<T, A: ArrayAlloc + ?Sized> Drop for InitGuard<'_, T, A> {
    fn drop(&mut self) {
        let _free = FreeOnDrop {
            base: self.base,
            layout: self.layout,
            alloc: self.alloc,
        };
        // SAFETY: exactly the first `initialized` elements were written.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.elements.as_ptr(),
                self.initialized,
            ))
        };
    }
}

struct FreeOnDrop<'a, A: ArrayAlloc + ?Sized> {
    base: NonNull<u8>,
    layout: Layout,
    alloc: &'a A,
}

impl<A: ArrayAlloc + ?Sized> Drop for FreeOnDrop<'_, A> {
    fn drop(&mut self) {
        // SAFETY: `base` was allocated from `alloc` with `layout` and is
        // freed exactly once, here.
        unsafe { self.alloc.deallocate(self.base, self.layout) };
    }
}

//! The owned array handle.
//!
//! An [`ArrayPtr`] is either empty (null) or the sole owner of one heap
//! block. Ownership moves with the value; the only other ways it changes
//! hands are [`ArrayPtr::release`] (out to the caller) and
//! [`ArrayPtr::from_raw`] (in from the caller).

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::{self, NonNull};
use std::slice;

use crate::alloc::{ArrayAlloc, Global};
use crate::error::ArrayError;
use crate::raw;

/// Exclusive owner of zero or one heap-allocated array of `T`.
///
/// The handle is a single address wide for zero-sized allocators such as
/// [`Global`]. It is not `Clone`: at most one handle owns a given block.
/// Dropping a non-empty handle drops every element and frees the block
/// through the handle's allocator; dropping an empty handle does nothing.
///
/// # Examples
///
/// ```
/// use arrayptr::ArrayPtr;
///
/// let mut values = ArrayPtr::<i32>::with_len(5);
/// assert!(values.has_array());
/// assert_eq!(values[2], 0);
/// values[2] = 42;
/// assert_eq!(values[2], 42);
///
/// let moved = values.take();
/// assert!(values.is_null());
/// assert_eq!(moved[2], 42);
/// ```
pub struct ArrayPtr<T, A: ArrayAlloc = Global> {
    /// `None` is the empty state.
    ptr: Option<NonNull<T>>,
    alloc: A,
    _owns: PhantomData<T>,
}

impl<T> ArrayPtr<T> {
    /// Create an empty handle. Never allocates.
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Allocate `len` default-initialised elements.
    ///
    /// A `len` of zero produces the empty state without allocating.
    ///
    /// # Panics
    ///
    /// Panics on capacity overflow. An allocator refusal is forwarded to
    /// [`std::alloc::handle_alloc_error`].
    #[track_caller]
    pub fn with_len(len: usize) -> Self
    where
        T: Default,
    {
        Self::with_len_in(len, Global)
    }

    /// Fallible [`with_len`](ArrayPtr::with_len).
    pub fn try_with_len(len: usize) -> Result<Self, ArrayError>
    where
        T: Default,
    {
        Self::try_with_len_in(len, Global)
    }

    /// Allocate `len` elements, initialising index `i` with `f(i)`.
    ///
    /// # Panics
    ///
    /// As [`with_len`](ArrayPtr::with_len). If `f` panics, the elements
    /// produced so far are dropped and the block is freed.
    #[track_caller]
    pub fn from_fn<F>(len: usize, f: F) -> Self
    where
        F: FnMut(usize) -> T,
    {
        Self::from_fn_in(len, f, Global)
    }

    /// Adopt a raw element address.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or an address returned by
    /// [`release`](ArrayPtr::release) / [`into_raw`](ArrayPtr::into_raw) of
    /// an `ArrayPtr<T>` that has not been adopted or freed since. The
    /// caller must not use or free `ptr` afterwards.
    ///
    /// Pointers from `Box<[T]>`, `Vec<T>` or any other allocation are not
    /// accepted: the block must carry this crate's length header.
    ///
    /// # Examples
    ///
    /// ```
    /// use arrayptr::ArrayPtr;
    ///
    /// let raw = ArrayPtr::from_fn(3, |i| i as u32).into_raw();
    /// let mut adopted = unsafe { ArrayPtr::from_raw(raw) };
    /// assert_eq!(adopted.as_slice(), &[0, 1, 2]);
    /// assert_eq!(adopted.release(), raw);
    /// drop(unsafe { ArrayPtr::from_raw(raw) });
    /// ```
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // SAFETY: forwarded caller contract.
        unsafe { Self::from_raw_in(ptr, Global) }
    }
}

impl<T, A: ArrayAlloc> ArrayPtr<T, A> {
    /// Create an empty handle that will allocate from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            ptr: None,
            alloc,
            _owns: PhantomData,
        }
    }

    /// [`with_len`](ArrayPtr::with_len) with an explicit allocator.
    #[track_caller]
    pub fn with_len_in(len: usize, alloc: A) -> Self
    where
        T: Default,
    {
        Self::from_fn_in(len, |_| T::default(), alloc)
    }

    /// [`try_with_len`](ArrayPtr::try_with_len) with an explicit allocator.
    pub fn try_with_len_in(len: usize, alloc: A) -> Result<Self, ArrayError>
    where
        T: Default,
    {
        Self::try_from_fn_in(len, |_| T::default(), alloc)
    }

    /// [`from_fn`](ArrayPtr::from_fn) with an explicit allocator.
    #[track_caller]
    pub fn from_fn_in<F>(len: usize, f: F, alloc: A) -> Self
    where
        F: FnMut(usize) -> T,
    {
        match Self::try_from_fn_in(len, f, alloc) {
            Ok(this) => this,
            Err(err) => handle_error(err),
        }
    }

    /// Fallible [`from_fn_in`](ArrayPtr::from_fn_in).
    ///
    /// Returns [`ArrayError::CapacityOverflow`] when `len` elements cannot
    /// be laid out, or [`ArrayError::AllocFailed`] when `alloc` refuses.
    /// A `len` of zero never calls the allocator.
    pub fn try_from_fn_in<F>(len: usize, f: F, alloc: A) -> Result<Self, ArrayError>
    where
        F: FnMut(usize) -> T,
    {
        if len == 0 {
            return Ok(Self::new_in(alloc));
        }
        let ptr = raw::allocate(len, f, &alloc)?;
        Ok(Self {
            ptr: Some(ptr),
            alloc,
            _owns: PhantomData,
        })
    }

    /// Adopt a raw element address that will be freed through `alloc`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or an address returned by
    /// [`release`](ArrayPtr::release) / [`into_raw`](ArrayPtr::into_raw) of
    /// an `ArrayPtr<T, _>` whose allocator can free blocks allocated by
    /// `alloc`'s counterpart (the same allocator, or a reference to it).
    /// The block must not have been adopted or freed since, and the caller
    /// must not use or free `ptr` afterwards.
    pub unsafe fn from_raw_in(ptr: *mut T, alloc: A) -> Self {
        if !ptr.is_null() {
            trace!("adopted {:p}", ptr);
        }
        Self {
            ptr: NonNull::new(ptr),
            alloc,
            _owns: PhantomData,
        }
    }

    /// Give up ownership and return the element address (null when empty).
    ///
    /// The handle is empty afterwards. The caller becomes responsible for
    /// the block; the only way to free it is to adopt it again with
    /// [`from_raw_in`](ArrayPtr::from_raw_in).
    #[must_use = "the released block leaks unless it is adopted again"]
    pub fn release(&mut self) -> *mut T {
        self.ptr.take().map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Consume the handle, returning the element address (null when empty).
    #[must_use = "the released block leaks unless it is adopted again"]
    pub fn into_raw(mut self) -> *mut T {
        self.release()
    }

    /// Move the owned block into a new handle, leaving this one empty.
    ///
    /// The returned handle keeps this handle's allocator value; the empty
    /// handle left behind gets a clone.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::new_in(self.alloc.clone());
        std::mem::replace(self, empty)
    }

    /// Exchange owned blocks with `other`.
    ///
    /// Each block travels with the allocator that allocated it.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Whether the handle owns a block.
    pub fn has_array(&self) -> bool {
        self.ptr.is_some()
    }

    /// Whether the handle is in the empty state.
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// The owned element address, or null. Ownership is unaffected.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |p| p.as_ptr().cast_const())
    }

    /// Mutable [`as_ptr`](ArrayPtr::as_ptr).
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The allocator that frees this handle's block.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Reference to the element at `index` without bounds checking.
    ///
    /// Debug builds assert the contract below.
    ///
    /// # Safety
    ///
    /// The handle must own a block and `index` must be less than the number
    /// of elements it was allocated with.
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(
            index < self.block_len(),
            "unchecked index {index} out of range for {} elements",
            self.block_len()
        );
        // SAFETY: the caller guarantees a live block with more than `index`
        // initialised elements.
        unsafe { &*self.as_ptr().add(index) }
    }

    /// Mutable [`get_unchecked`](ArrayPtr::get_unchecked).
    ///
    /// # Safety
    ///
    /// As [`get_unchecked`](ArrayPtr::get_unchecked).
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(
            index < self.block_len(),
            "unchecked index {index} out of range for {} elements",
            self.block_len()
        );
        // SAFETY: as `get_unchecked`; `&mut self` guarantees exclusivity.
        unsafe { &mut *self.as_mut_ptr().add(index) }
    }

    /// Checked element access. `None` when empty or out of range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Checked mutable element access.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Every element of the owned block (empty when the handle is empty).
    pub fn as_slice(&self) -> &[T] {
        match self.ptr {
            // SAFETY: a non-null `ptr` is the element address of a live
            // block holding `raw::len(ptr)` initialised elements.
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), raw::len(ptr)) },
            None => &[],
        }
    }

    /// Mutable [`as_slice`](ArrayPtr::as_slice).
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.ptr {
            // SAFETY: as `as_slice`; `&mut self` guarantees exclusivity.
            Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), raw::len(ptr)) },
            None => &mut [],
        }
    }

    fn block_len(&self) -> usize {
        self.as_slice().len()
    }
}

impl<T, A: ArrayAlloc> Drop for ArrayPtr<T, A> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: the handle exclusively owns the block, which was
            // allocated (or adopted) for `self.alloc`.
            unsafe { raw::destroy(ptr, &self.alloc) };
        }
    }
}

impl<T, A: ArrayAlloc + Default> Default for ArrayPtr<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T, A: ArrayAlloc> Index<usize> for ArrayPtr<T, A> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        let len = self.block_len();
        match self.get(index) {
            Some(value) => value,
            None => index_failed(index, len),
        }
    }
}

impl<T, A: ArrayAlloc> IndexMut<usize> for ArrayPtr<T, A> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.block_len();
        match self.get_mut(index) {
            Some(value) => value,
            None => index_failed(index, len),
        }
    }
}

impl<T, A: ArrayAlloc> fmt::Debug for ArrayPtr<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayPtr").field(&self.as_ptr()).finish()
    }
}

impl<T, A: ArrayAlloc> fmt::Pointer for ArrayPtr<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

// SAFETY: the handle owns its elements exclusively, like `Box<[T]>`.
unsafe impl<T: Send, A: ArrayAlloc + Send> Send for ArrayPtr<T, A> {}

// SAFETY: `&ArrayPtr` only hands out `&T`.
unsafe impl<T: Sync, A: ArrayAlloc + Sync> Sync for ArrayPtr<T, A> {}

#[cold]
#[track_caller]
fn index_failed(index: usize, len: usize) -> ! {
    if len == 0 {
        panic!("index {index} into an empty ArrayPtr");
    }
    panic!("index {index} out of range for ArrayPtr of {len} elements");
}

#[cold]
#[track_caller]
fn handle_error(err: ArrayError) -> ! {
    match err {
        ArrayError::AllocFailed { size, align } => match Layout::from_size_align(size, align) {
            Ok(layout) => std::alloc::handle_alloc_error(layout),
            Err(_) => panic!("{err}"),
        },
        ArrayError::CapacityOverflow { .. } => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_is_empty() {
        let handle = ArrayPtr::<u32>::new();
        assert!(!handle.has_array());
        assert!(handle.is_null());
        assert!(handle.as_ptr().is_null());
    }

    #[test]
    fn default_is_empty() {
        let handle: ArrayPtr<String> = ArrayPtr::default();
        assert!(handle.is_null());
        assert!(handle.as_slice().is_empty());
    }

    #[test]
    fn sized_handle_has_array() {
        let handle = ArrayPtr::<u64>::with_len(3);
        assert!(handle.has_array());
        assert!(!handle.is_null());
        assert!(!handle.as_ptr().is_null());
    }

    #[test]
    fn zero_len_is_empty_state() {
        let handle = ArrayPtr::<u64>::with_len(0);
        assert!(!handle.has_array());
        assert!(handle.as_ptr().is_null());
    }

    #[test]
    fn sized_handles_get_distinct_addresses() {
        let a = ArrayPtr::<u8>::with_len(16);
        let b = ArrayPtr::<u8>::with_len(16);
        assert_ne!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn five_ints_default_to_zero_then_write_reads_back() {
        let mut handle = ArrayPtr::<i32>::with_len(5);
        for i in 0..5 {
            assert_eq!(handle[i], 0);
        }
        handle[2] = 42;
        assert_eq!(handle[2], 42);
        assert_eq!(handle.as_slice(), &[0, 0, 42, 0, 0]);
    }

    #[test]
    fn elements_are_default_constructed() {
        let handle = ArrayPtr::<String>::with_len(2);
        assert_eq!(handle.as_slice(), &[String::new(), String::new()]);
    }

    #[test]
    fn from_fn_uses_index() {
        let handle = ArrayPtr::from_fn(4, |i| i * i);
        assert_eq!(handle.as_slice(), &[0, 1, 4, 9]);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source = ArrayPtr::<u16>::with_len(4);
        let addr = source.as_ptr();
        let dest = source.take();
        assert!(source.is_null());
        assert!(source.as_ptr().is_null());
        assert_eq!(dest.as_ptr(), addr);
    }

    #[test]
    fn take_from_empty_is_empty() {
        let mut source = ArrayPtr::<u16>::new();
        let dest = source.take();
        assert!(source.is_null());
        assert!(dest.is_null());
    }

    #[test]
    fn move_keeps_address() {
        let source = ArrayPtr::<u32>::with_len(2);
        let addr = source.as_ptr();
        let dest = source;
        assert_eq!(dest.as_ptr(), addr);
    }

    #[test]
    fn release_returns_owned_address() {
        let mut handle = ArrayPtr::<i64>::with_len(3);
        let addr = handle.as_ptr();
        let raw = handle.release();
        assert_eq!(raw.cast_const(), addr);
        assert!(handle.is_null());
        // Hand the block back so it is freed.
        drop(unsafe { ArrayPtr::from_raw(raw) });
    }

    #[test]
    fn release_on_empty_returns_null() {
        let mut handle = ArrayPtr::<i64>::new();
        assert!(handle.release().is_null());
        assert!(handle.release().is_null());
        assert!(handle.is_null());
    }

    #[test]
    fn adopt_then_release_round_trips_address() {
        let raw = ArrayPtr::<u8>::with_len(3).into_raw();
        let mut adopted = unsafe { ArrayPtr::from_raw(raw) };
        assert!(adopted.has_array());
        assert_eq!(adopted.as_slice().len(), 3);
        let back = adopted.release();
        assert_eq!(back, raw);
        assert!(adopted.is_null());
        drop(unsafe { ArrayPtr::from_raw(back) });
    }

    #[test]
    fn adopt_null_is_empty() {
        let handle = unsafe { ArrayPtr::<u8>::from_raw(ptr::null_mut()) };
        assert!(handle.is_null());
    }

    #[test]
    fn swap_exchanges_addresses() {
        let mut a = ArrayPtr::<u8>::with_len(1);
        let mut b = ArrayPtr::<u8>::with_len(2);
        let (pre_a, pre_b) = (a.as_ptr(), b.as_ptr());
        a.swap(&mut b);
        assert_eq!(a.as_ptr(), pre_b);
        assert_eq!(b.as_ptr(), pre_a);
    }

    #[test]
    fn swap_with_empty() {
        let mut a = ArrayPtr::<u8>::with_len(1);
        let mut b = ArrayPtr::<u8>::new();
        a.swap(&mut b);
        assert!(a.is_null());
        assert!(b.has_array());
    }

    #[test]
    fn checked_get_rejects_out_of_range() {
        let mut handle = ArrayPtr::<u8>::with_len(2);
        assert_eq!(handle.get(1), Some(&0));
        assert_eq!(handle.get(2), None);
        assert!(handle.get_mut(2).is_none());
        assert_eq!(ArrayPtr::<u8>::new().get(0), None);
    }

    #[test]
    fn unchecked_access_round_trips() {
        let mut handle = ArrayPtr::<u32>::with_len(8);
        unsafe {
            *handle.get_unchecked_mut(7) = 99;
            assert_eq!(*handle.get_unchecked(7), 99);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_past_end_panics() {
        let handle = ArrayPtr::<u8>::with_len(2);
        let _ = handle[2];
    }

    #[test]
    #[should_panic(expected = "empty ArrayPtr")]
    fn index_into_empty_panics() {
        let mut handle = ArrayPtr::<u8>::new();
        handle[0] = 1;
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unchecked index")]
    fn unchecked_past_end_is_debug_asserted() {
        let handle = ArrayPtr::<u8>::with_len(2);
        let _ = unsafe { handle.get_unchecked(5) };
    }

    #[test]
    fn capacity_overflow_is_reported() {
        let err = ArrayPtr::<u64>::try_with_len(usize::MAX).unwrap_err();
        assert!(matches!(err, ArrayError::CapacityOverflow { .. }));
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn with_len_panics_on_capacity_overflow() {
        let _ = ArrayPtr::<u64>::with_len(usize::MAX);
    }

    #[test]
    fn debug_shows_address() {
        let handle = ArrayPtr::<u8>::new();
        assert_eq!(format!("{handle:?}"), format!("ArrayPtr({:?})", ptr::null::<u8>()));
    }

    #[test]
    fn zero_sized_elements() {
        let handle = ArrayPtr::<()>::with_len(10);
        assert!(handle.has_array());
        assert_eq!(handle.as_slice().len(), 10);
    }

    #[test]
    fn send_and_sync_follow_element() {
        fn assert_send<S: Send>() {}
        fn assert_sync<S: Sync>() {}
        assert_send::<ArrayPtr<u32>>();
        assert_sync::<ArrayPtr<u32>>();
    }

    proptest! {
        #[test]
        fn write_then_read_round_trips(
            values in proptest::collection::vec(any::<i64>(), 1..128),
        ) {
            let mut handle = ArrayPtr::<i64>::with_len(values.len());
            for (i, &v) in values.iter().enumerate() {
                handle[i] = v;
            }
            for (i, &v) in values.iter().enumerate() {
                prop_assert_eq!(handle[i], v);
            }
        }

        #[test]
        fn has_array_iff_len_nonzero(len in 0usize..64) {
            let handle = ArrayPtr::<u8>::with_len(len);
            prop_assert_eq!(handle.has_array(), len > 0);
            prop_assert_eq!(handle.as_ptr().is_null(), len == 0);
            prop_assert_eq!(handle.as_slice().len(), len);
        }

        #[test]
        fn double_swap_restores(len_a in 0usize..16, len_b in 0usize..16) {
            let mut a = ArrayPtr::<u32>::with_len(len_a);
            let mut b = ArrayPtr::<u32>::with_len(len_b);
            let (pre_a, pre_b) = (a.as_ptr(), b.as_ptr());
            a.swap(&mut b);
            prop_assert_eq!(a.as_ptr(), pre_b);
            prop_assert_eq!(b.as_ptr(), pre_a);
            a.swap(&mut b);
            prop_assert_eq!(a.as_ptr(), pre_a);
            prop_assert_eq!(b.as_ptr(), pre_b);
        }
    }
}

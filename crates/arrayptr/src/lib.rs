//! Exclusively-owned heap arrays with deterministic single release.
//!
//! [`ArrayPtr`] owns zero or one contiguous heap block of `T` and frees it
//! exactly once, when the owning handle is dropped. It is a building block
//! for higher-level containers, not a container itself: the handle stores
//! nothing but the element address, and callers are expected to track how
//! many elements they use.
//!
//! # Layout
//!
//! ```text
//! block base                      ArrayPtr::as_ptr()
//! │                               │
//! ▼                               ▼
//! ┌──────────────┬─────────┬──────┬──────┬─────┬────────┐
//! │ Header {len} │ padding │ T[0] │ T[1] │ ... │ T[n-1] │
//! └──────────────┴─────────┴──────┴──────┴─────┴────────┘
//! ```
//!
//! The header is the allocation's own bookkeeping (the same role the length
//! cookie of an array-new plays): it lets the block be dropped and freed
//! with the layout it was allocated with, without the handle itself
//! carrying a length.
//!
//! # The empty state
//!
//! A null address means "owns nothing". Requesting zero elements never
//! allocates; it produces the empty state instead.
//!
//! # Unsafe surface
//!
//! `unsafe` is denied crate-wide and allowed only in `alloc`, `ptr` and
//! the private `raw` module. All raw memory handling lives in `raw`. The public
//! `unsafe` entry points are [`ArrayPtr::from_raw`] (adopting an address)
//! and the unchecked accessors [`ArrayPtr::get_unchecked`] /
//! [`ArrayPtr::get_unchecked_mut`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

#[macro_use]
mod macros;

pub mod alloc;
pub mod error;
pub mod ptr;
mod raw;

// Public re-exports for the primary API surface.
pub use alloc::{ArrayAlloc, Global};
pub use error::{AllocError, ArrayError};
pub use ptr::ArrayPtr;

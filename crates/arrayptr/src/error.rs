//! Allocation error types.

use std::error::Error;
use std::fmt;

/// An [`ArrayAlloc`](crate::ArrayAlloc) could not satisfy a layout request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl Error for AllocError {}

/// Errors that can occur while constructing a sized [`ArrayPtr`](crate::ArrayPtr).
///
/// Construction either fully succeeds or fails before any handle exists;
/// there is no partially-owned state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayError {
    /// The requested element count does not fit in a valid allocation layout.
    CapacityOverflow {
        /// Number of elements requested.
        len: usize,
        /// Size of one element in bytes.
        elem_size: usize,
    },
    /// The allocator refused the request.
    AllocFailed {
        /// Size of the refused block in bytes (header included).
        size: usize,
        /// Alignment of the refused block in bytes.
        align: usize,
    },
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOverflow { len, elem_size } => {
                write!(
                    f,
                    "capacity overflow: {len} elements of {elem_size} bytes exceed the maximum allocation size"
                )
            }
            Self::AllocFailed { size, align } => {
                write!(
                    f,
                    "allocation failed: {size} bytes with alignment {align}"
                )
            }
        }
    }
}

impl Error for ArrayError {}

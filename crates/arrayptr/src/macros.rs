//! Crate-private logging shims.
//!
//! Forward to the `log` facade when the `log` feature is enabled and
//! compile to nothing otherwise.

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)+) => {
        ::log::trace!(target: "arrayptr", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($arg:tt)+) => {
        ::log::debug!(target: "arrayptr", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

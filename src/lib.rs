//! Performance counter sessions for Linux micro-benchmark harnesses.
//!
//! This crate opens a configurable set of CPU Performance Monitoring Unit
//! counters through the Linux [`perf_event_open`][man] system call, brackets a
//! region of code with [`Session::start`] and [`Session::stop`], and reports
//! each counter's accumulated value together with the wall-clock duration of
//! the region.
//!
//! Counters that are registered into the same group share a *leader* and are
//! reset, enabled, disabled, and read as a single kernel-atomic operation, so
//! cross-counter ratios like instructions-per-cycle are self-consistent. When
//! the hardware cannot schedule another event into a group, the session
//! transparently promotes the new counter to a leader of its own and carries
//! on; a counter the kernel refuses outright is logged and dropped rather
//! than failing the whole session.
//!
//! ```no_run
//! use kprof::Session;
//!
//! fn main() -> kprof::Result<()> {
//!     // Default counter set, overridable through KPROF_COUNTER_FILE
//!     // or KPROF_COUNTER_CONF.
//!     let mut session = Session::new()?;
//!
//!     session.start()?;
//!     let mut sum = 0u64;
//!     for i in 0..1_000_000u64 {
//!         sum = sum.wrapping_add(i);
//!     }
//!     unsafe { std::ptr::read_volatile(&sum) };
//!     session.stop()?;
//!
//!     for (label, value) in session.report(false)? {
//!         println!("{:>24}: {}", label, value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The counter selection is decided once, when the session is built:
//!
//! - `KPROF_COUNTER_FILE` names a CSV file of `label,CLASS,EVENT` lines;
//! - otherwise `KPROF_COUNTER_CONF` holds an inline `label,T:V;...` spec
//!   (`T` one of `H`, `S`, `C`, `R`);
//! - otherwise a built-in set of hardware, cache, and software counters is
//!   used, each in its own group so the kernel can always schedule it.
//!
//! See [`names`] for the strings the two config dialects accept.
//!
//! The library never installs a logger; skipped config entries and dropped
//! counters are reported through the [`log`] facade at `warn!` level.
//!
//! [man]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html

#![deny(missing_docs)]

use std::io;

pub mod events;
pub mod names;

mod config;
mod counter;
mod error;
mod flags;
mod session;

/// Re-export of the raw `perf_event_open` bindings this crate is built on.
pub use perf_event_open_sys as sys;

pub use crate::counter::Counter;
pub use crate::error::{describe_ioctl_errno, describe_open_errno, Error, Result};
pub use crate::flags::Domain;
pub use crate::session::{Session, WALL_TIME};

/// Produce an `io::Result` from an errno-style system call.
///
/// An 'errno-style' system call is one that reports failure by returning -1
/// and setting the C `errno` value when an error occurs.
pub(crate) fn check_errno_syscall<F, R>(f: F) -> io::Result<R>
where
    F: FnOnce() -> R,
    R: PartialOrd + Default,
{
    let result = f();
    if result < R::default() {
        Err(io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

/// View a `u64` slice as the byte buffer a group `read(2)` fills in.
pub(crate) fn as_byte_slice_mut(slice: &mut [u64]) -> &mut [u8] {
    // A u64 slice is always fully initialized, so exposing its bytes is fine.
    unsafe {
        std::slice::from_raw_parts_mut(slice.as_mut_ptr() as *mut u8, std::mem::size_of_val(slice))
    }
}

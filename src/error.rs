//! The error taxonomy, and human-readable descriptions of kernel errnos.
//!
//! Two kinds of failure are *recovered locally* and never surface as an
//! [`Error`]: unknown tokens in a counter configuration (the entry is logged
//! and skipped) and a counter the kernel refuses to open even after the
//! retry-as-leader pass (the counter is logged and dropped). Everything else
//! aborts the operation that hit it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error surfaced by a counter session.
#[derive(Debug, Error)]
pub enum Error {
    /// The counter configuration file could not be read.
    #[error("could not read counter config {path:?}: {source}")]
    Config {
        /// The path the config was expected at.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Every configured counter was rejected by the kernel; the session
    /// would not be able to measure anything.
    #[error("no configured performance counter could be opened")]
    NoCounters,

    /// A `perf_event` ioctl failed. These are issued while registering,
    /// starting, and stopping counters; a failure aborts that operation.
    #[error("{op} failed: {}", describe_ioctl_errno(.source))]
    Ioctl {
        /// Which ioctl was being issued.
        op: &'static str,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// Reading a group leader's counter snapshot failed.
    #[error("group read on fd {fd} failed: {source}")]
    GroupRead {
        /// The leader file descriptor being read.
        fd: i32,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A group read returned fewer bytes than the group layout requires.
    #[error("group read on fd {fd} returned {got} bytes, expected {expected}")]
    ShortGroupRead {
        /// The leader file descriptor being read.
        fd: i32,
        /// The byte count the member layout requires.
        expected: usize,
        /// The byte count the kernel returned.
        got: usize,
    },
}

/// Explain a `perf_event_open(2)` failure in terms of the documented errnos.
///
/// Errnos the man page does not document for this call fall back to the
/// platform's generic description.
pub fn describe_open_errno(err: &io::Error) -> String {
    let explained = match err.raw_os_error() {
        Some(libc::E2BIG) => {
            "the perf_event_attr size is below PERF_ATTR_SIZE_VER0, above the page size, \
             or larger than the running kernel supports with the extra bytes non-zero"
        }
        Some(libc::EACCES) => {
            "the event requires CAP_PERFMON or CAP_SYS_ADMIN, or a more permissive \
             perf_event_paranoid setting; excluding the kernel domain often helps"
        }
        Some(libc::EBADF) => "the group leader file descriptor is not valid",
        Some(libc::EBUSY) => "another event already has exclusive access to the PMU",
        Some(libc::EFAULT) => "the attr pointer references invalid memory",
        Some(libc::EINTR) => "perf and ftrace handling were mixed on a uprobe",
        Some(libc::EINVAL) => {
            "the event is invalid: commonly the config is out of range, the generic \
             event is unsupported on this CPU, or there is no room to schedule the \
             event in its group"
        }
        Some(libc::EMFILE) => "the per-process file descriptor limit was reached",
        Some(libc::ENODEV) => "the event relies on a feature this CPU does not have",
        Some(libc::ENOENT) => "the event class is not valid, or the generic event is unsupported",
        Some(libc::ENOSPC) => "out of counter slots (or breakpoint slots) for this event",
        Some(libc::ENOSYS) => "user stack sampling is not supported by this hardware",
        Some(libc::EOPNOTSUPP) => {
            "the event needs hardware support that is not present: low-skid sampling, \
             branch tracing, or a PMU interrupt"
        }
        Some(libc::EOVERFLOW) => "sample_max_stack exceeds perf_event_max_stack",
        Some(libc::EPERM) => {
            "an unsupported exclude_* setting was requested, or the event requires \
             CAP_PERFMON or CAP_SYS_ADMIN"
        }
        Some(libc::ESRCH) => "the process to attach to does not exist",
        _ => return err.to_string(),
    };
    format!("{} ({})", explained, err)
}

/// Explain a `perf_event` ioctl failure in terms of the documented errnos.
pub fn describe_ioctl_errno(err: &io::Error) -> String {
    let explained = match err.raw_os_error() {
        Some(libc::EBADF) => "fd is not a valid file descriptor",
        Some(libc::EFAULT) => "the argument references inaccessible memory",
        Some(libc::EINVAL) => "the operation or its argument is not valid",
        Some(libc::ENOTTY) => "the operation does not apply to this file descriptor",
        _ => return err.to_string(),
    };
    format!("{} ({})", explained, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_errnos_are_explained() {
        let err = io::Error::from_raw_os_error(libc::EINVAL);
        assert!(describe_open_errno(&err).contains("group"));
        assert!(describe_ioctl_errno(&err).contains("not valid"));

        let err = io::Error::from_raw_os_error(libc::ENOSPC);
        assert!(describe_open_errno(&err).contains("counter slots"));
    }

    #[test]
    fn undocumented_errnos_fall_back_to_strerror() {
        let err = io::Error::from_raw_os_error(libc::EPIPE);
        assert_eq!(describe_open_errno(&err), err.to_string());
        assert_eq!(describe_ioctl_errno(&err), err.to_string());
    }

    #[test]
    fn ioctl_error_display_names_the_op() {
        let err = Error::Ioctl {
            op: "PERF_EVENT_IOC_ENABLE",
            source: io::Error::from_raw_os_error(libc::EBADF),
        };
        let text = err.to_string();
        assert!(text.contains("PERF_EVENT_IOC_ENABLE"));
        assert!(text.contains("file descriptor"));
    }
}

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use crate::sys::bindings::perf_event_attr;
use crate::{check_errno_syscall, sys, Error, Result};

/// One open performance counter.
///
/// A `Counter` pairs the file descriptor returned by `perf_event_open` with
/// everything the session needs to manage it as a group member: the attribute
/// block it was opened with, the file descriptor of its group leader, the
/// unique id the kernel assigned it, and the value captured by the most
/// recent group read.
///
/// Counters are created by [`Session::register`] and owned by the session;
/// dropping the session drops every counter, and dropping a counter closes
/// its file descriptor. The descriptor never changes for the lifetime of the
/// counter.
///
/// [`Session::register`]: crate::Session::register
pub struct Counter {
    /// Report label. Labels are opaque and need not be unique.
    label: String,

    /// Owns the event file descriptor; closes it exactly once on drop.
    file: File,

    attrs: perf_event_attr,

    is_leader: bool,

    /// The leader's file descriptor. Equals our own descriptor for leaders.
    leader_fd: RawFd,

    /// Kernel-assigned counter id, used to find our slot in a group read.
    id: u64,

    /// Value captured by the most recent group read.
    value: u64,
}

impl Counter {
    /// Issue `perf_event_open` for the calling thread on any CPU, joining the
    /// group led by `group_fd` (-1 opens a new group).
    pub(crate) fn open(attrs: &perf_event_attr, group_fd: RawFd) -> io::Result<File> {
        // The kernel may write the attr size it expected back into the
        // struct, so the syscall takes a copy.
        let mut attrs = *attrs;
        let fd = check_errno_syscall(|| unsafe {
            sys::perf_event_open(&mut attrs, 0, -1, group_fd, 0)
        })?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    /// Wrap an opened descriptor, retrieving the kernel-assigned counter id.
    ///
    /// `group_fd` is the leader the counter was opened under; anything
    /// negative means the counter leads a group of its own.
    pub(crate) fn new(
        label: &str,
        file: File,
        attrs: perf_event_attr,
        group_fd: RawFd,
    ) -> Result<Counter> {
        let mut id = 0_u64;
        check_errno_syscall(|| unsafe { sys::ioctls::ID(file.as_raw_fd(), &mut id) }).map_err(
            |source| Error::Ioctl {
                op: "PERF_EVENT_IOC_ID",
                source,
            },
        )?;

        let is_leader = group_fd < 0;
        let leader_fd = if is_leader { file.as_raw_fd() } else { group_fd };
        Ok(Counter {
            label: label.to_string(),
            file,
            attrs,
            is_leader,
            leader_fd,
            id,
            value: 0,
        })
    }

    /// The label this counter reports under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The unique id the kernel assigned this counter.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The value captured by the most recent [`Session::stop`].
    ///
    /// [`Session::stop`]: crate::Session::stop
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Whether this counter leads its group.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// The file descriptor of this counter's group leader; equal to
    /// [`AsRawFd::as_raw_fd`] for leaders.
    pub fn leader_fd(&self) -> RawFd {
        self.leader_fd
    }

    /// The attribute block this counter was opened with.
    pub fn attrs(&self) -> &perf_event_attr {
        &self.attrs
    }

    pub(crate) fn set_value(&mut self, value: u64) {
        self.value = value;
    }

    /// Read this counter's group snapshot into `buf`. Only meaningful on a
    /// leader opened with the `ID | GROUP` read format.
    pub(crate) fn read_group(&self, buf: &mut [u64]) -> io::Result<usize> {
        (&self.file).read(crate::as_byte_slice_mut(buf))
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "Counter {{ label: {:?}, fd: {}, id: {}, leader fd: {} }}",
            self.label,
            self.file.as_raw_fd(),
            self.id,
            self.leader_fd
        )
    }
}

impl AsRawFd for Counter {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

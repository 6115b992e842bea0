use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::Instant;

use log::{debug, warn};

use crate::config;
use crate::counter::Counter;
use crate::error::{describe_open_errno, Error, Result};
use crate::events::Event;
use crate::flags::Domain;
use crate::sys::bindings::{self, perf_event_attr};
use crate::{check_errno_syscall, sys};

/// The label of the trailing wall-clock entry in every report.
pub const WALL_TIME: &str = "Wall-time";

/// A set of performance counters measured over a common region of code.
///
/// A session owns an ordered list of [`Counter`]s, arranged into one or more
/// groups. [`start`] resets and enables every group, [`stop`] disables them
/// and captures each group's values through a single atomic kernel read, and
/// [`report`] lays the captured values out in registration order with the
/// wall-clock duration of the region appended.
///
/// A session belongs to one thread; nothing in it is synchronized. Multiple
/// sessions in one process are independent of each other. Dropping the
/// session closes every counter's file descriptor.
///
/// # Grouping
///
/// Counters registered under a shared leader slot are read atomically
/// together, which is what makes ratios between them (instructions per
/// cycle, miss rates) meaningful. The PMU has a limited number of slots,
/// so the kernel may refuse to extend a group; the session then retries the
/// counter as the leader of a new group, trading atomicity with its former
/// group for actually being measured. A counter the kernel refuses even as
/// a leader is logged and dropped, and the rest of the session carries on.
///
/// [`start`]: Session::start
/// [`stop`]: Session::stop
/// [`report`]: Session::report
pub struct Session {
    /// Registration order is report order.
    counters: Vec<Counter>,

    /// Leader descriptors, one per group, in creation order.
    leaders: Vec<RawFd>,

    start: Option<Instant>,
    stop: Option<Instant>,
}

impl Session {
    /// Build a session from the environment.
    ///
    /// The counter selection is taken from the first of these that applies:
    ///
    /// 1. `KPROF_COUNTER_FILE` — a CSV file of `label,CLASS,EVENT` lines,
    ///    e.g. `cyc,PERF_TYPE_HARDWARE,PERF_COUNT_HW_CPU_CYCLES`. Lines with
    ///    unknown tokens are logged and skipped.
    /// 2. `KPROF_COUNTER_CONF` — an inline `label,T:V;...` list where `T` is
    ///    one of `H`, `S`, `C`, `R` and `V` is anything
    ///    [`names::event_config`] resolves, hex codes included.
    /// 3. The built-in default set: hardware basics, an L1/LL cache spread,
    ///    and a few software counters. Each default counter leads its own
    ///    group, so the kernel can always schedule it; configured counters
    ///    instead share groups and are read atomically together.
    ///
    /// Loader-selected counters observe user-space execution only, which
    /// keeps them usable under the usual `perf_event_paranoid` settings;
    /// counters for other domains go through [`register`].
    ///
    /// Fails with [`Error::NoCounters`] if nothing could be opened.
    ///
    /// [`register`]: Session::register
    ///
    /// [`names::event_config`]: crate::names::event_config
    pub fn new() -> Result<Session> {
        let mut session = Session::empty();
        match config::from_env()? {
            Some(specs) => session.register_specs(&specs, Domain::USER, false)?,
            None => session.register_specs(&config::default_set(), Domain::USER, true)?,
        }
        Ok(session)
    }

    /// Build a session from a CSV counter config file, ignoring the
    /// environment. The file format is that of `KPROF_COUNTER_FILE`.
    pub fn from_config<P: AsRef<Path>>(path: P) -> Result<Session> {
        let specs = config::from_file(path.as_ref())?;
        let mut session = Session::empty();
        session.register_specs(&specs, Domain::USER, false)?;
        Ok(session)
    }

    /// A session with no counters, for callers that register their own.
    pub fn empty() -> Session {
        Session {
            counters: Vec::new(),
            leaders: Vec::new(),
            start: None,
            stop: None,
        }
    }

    fn register_specs(
        &mut self,
        specs: &[config::CounterSpec],
        domain: Domain,
        own_groups: bool,
    ) -> Result<()> {
        let mut slot: RawFd = -1;
        for spec in specs {
            if own_groups {
                slot = -1;
            }
            self.register(&spec.label, &mut slot, spec.class, spec.config, domain)?;
        }
        if self.counters.is_empty() {
            return Err(Error::NoCounters);
        }
        Ok(())
    }

    /// Register one counter.
    ///
    /// `leader` is the group slot: pass `-1` to start a new group; on success
    /// the slot holds the group leader's descriptor and subsequent calls with
    /// the same slot join that group.
    ///
    /// If the kernel rejects a group member with `EINVAL` or `ENOSPC` — the
    /// event cannot be scheduled alongside the existing members, or the group
    /// is full — the counter is retried as the leader of a new group. A
    /// counter that fails even then is logged with a description of the
    /// kernel's complaint and dropped; the session stays consistent without
    /// it. The return value tells the two outcomes apart: `Ok(true)` means
    /// the counter was registered, `Ok(false)` means it was dropped.
    ///
    /// Labels are opaque and may repeat; [`counter`] returns the first match.
    ///
    /// [`counter`]: Session::counter
    pub fn register(
        &mut self,
        label: &str,
        leader: &mut RawFd,
        class: u32,
        config: u64,
        domain: Domain,
    ) -> Result<bool> {
        let attrs = counter_attrs(class, config, domain);
        let mut group_fd = *leader;

        let file = match Counter::open(&attrs, group_fd) {
            Ok(file) => file,
            Err(err) if group_fd >= 0 && group_rejection(&err) => {
                debug!(
                    "group on fd {} cannot take counter {}: {}; retrying as leader",
                    group_fd, label, err
                );
                group_fd = -1;
                match Counter::open(&attrs, group_fd) {
                    Ok(file) => file,
                    Err(err) => {
                        warn!("dropping counter {}: {}", label, describe_open_errno(&err));
                        return Ok(false);
                    }
                }
            }
            Err(err) => {
                warn!("dropping counter {}: {}", label, describe_open_errno(&err));
                return Ok(false);
            }
        };

        let counter = Counter::new(label, file, attrs, group_fd)?;
        if counter.is_leader() {
            *leader = counter.as_raw_fd();
            self.leaders.push(counter.as_raw_fd());
        }
        debug!(
            "registered counter {} (fd {}, id {}, leader fd {})",
            label,
            counter.as_raw_fd(),
            counter.id(),
            counter.leader_fd()
        );
        self.counters.push(counter);
        Ok(true)
    }

    /// Register one counter from a typed [`Event`] value.
    ///
    /// Same semantics as [`register`]; accepts [`Hardware`], [`Software`],
    /// [`Cache`], and [`Event`] values directly.
    ///
    /// [`register`]: Session::register
    /// [`Hardware`]: crate::events::Hardware
    /// [`Software`]: crate::events::Software
    /// [`Cache`]: crate::events::Cache
    pub fn register_event<E: Into<Event>>(
        &mut self,
        label: &str,
        leader: &mut RawFd,
        event: E,
        domain: Domain,
    ) -> Result<bool> {
        let event = event.into();
        self.register(label, leader, event.class(), event.config(), domain)
    }

    /// Zero every counter and start counting.
    ///
    /// Each group is reset and enabled atomically. Any ioctl failure aborts
    /// the start.
    pub fn start(&mut self) -> Result<()> {
        for &fd in &self.leaders {
            check_errno_syscall(|| unsafe {
                sys::ioctls::RESET(fd, bindings::PERF_IOC_FLAG_GROUP)
            })
            .map_err(|source| Error::Ioctl {
                op: "PERF_EVENT_IOC_RESET",
                source,
            })?;
        }
        self.start = Some(Instant::now());
        self.stop = None;
        for &fd in &self.leaders {
            check_errno_syscall(|| unsafe {
                sys::ioctls::ENABLE(fd, bindings::PERF_IOC_FLAG_GROUP)
            })
            .map_err(|source| Error::Ioctl {
                op: "PERF_EVENT_IOC_ENABLE",
                source,
            })?;
        }
        Ok(())
    }

    /// Stop counting and capture every counter's value.
    ///
    /// Each group is disabled atomically, then read in a single kernel call,
    /// so all members of a group are sampled at the same instant and ratios
    /// between them are self-consistent. A failed read aborts this stop but
    /// leaves the session usable for another start/stop pair.
    pub fn stop(&mut self) -> Result<()> {
        for &fd in &self.leaders {
            check_errno_syscall(|| unsafe {
                sys::ioctls::DISABLE(fd, bindings::PERF_IOC_FLAG_GROUP)
            })
            .map_err(|source| Error::Ioctl {
                op: "PERF_EVENT_IOC_DISABLE",
                source,
            })?;
        }
        self.stop = Some(Instant::now());

        let leader_indexes: Vec<usize> = (0..self.counters.len())
            .filter(|&i| self.counters[i].is_leader())
            .collect();
        for index in leader_indexes {
            self.read_group(index)?;
        }
        Ok(())
    }

    /// Read the group led by `self.counters[leader_index]` and distribute the
    /// values to its members by kernel id.
    fn read_group(&mut self, leader_index: usize) -> Result<()> {
        let fd = self.counters[leader_index].as_raw_fd();
        let members = self
            .counters
            .iter()
            .filter(|c| c.leader_fd() == fd)
            .count();

        // The kernel fills in: u64 nr, then nr pairs of (u64 value, u64 id).
        let mut buf = vec![0_u64; 1 + 2 * members];
        let expected = std::mem::size_of_val(&buf[..]);
        let got = self.counters[leader_index]
            .read_group(&mut buf)
            .map_err(|source| Error::GroupRead { fd, source })?;
        if got != expected {
            return Err(Error::ShortGroupRead { fd, expected, got });
        }

        let nr = (buf[0] as usize).min(members);
        let pairs = &buf[1..1 + 2 * nr];
        for counter in self.counters.iter_mut().filter(|c| c.leader_fd() == fd) {
            match pairs.chunks_exact(2).find(|pair| pair[1] == counter.id()) {
                Some(pair) => counter.set_value(pair[0]),
                None => warn!(
                    "counter {} (id {}) missing from group read on fd {}; keeping previous value",
                    counter.label(),
                    counter.id(),
                    fd
                ),
            }
        }
        Ok(())
    }

    /// The values captured by the most recent stop, in registration order,
    /// with a trailing [`WALL_TIME`] entry holding the measured duration in
    /// nanoseconds.
    ///
    /// With `overhead_correction` set, the session runs one extra start/stop
    /// pair around an empty region to measure its own instrumentation cost
    /// and subtracts it from each counter entry. The subtraction wraps modulo
    /// 2⁶⁴: it is only meaningful when the measurement exceeds the overhead,
    /// which a measurement of any real workload does. The wall-time entry is
    /// reported as measured. Note that the correction run reuses the
    /// session's counters, so the captured values afterwards are those of
    /// the empty region.
    pub fn report(&mut self, overhead_correction: bool) -> Result<Vec<(String, u64)>> {
        let mut report: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|c| (c.label().to_string(), c.value()))
            .collect();
        let duration = self.duration_ns();

        if overhead_correction {
            self.start()?;
            self.stop()?;
            for (entry, counter) in report.iter_mut().zip(&self.counters) {
                entry.1 = entry.1.wrapping_sub(counter.value());
            }
        }

        report.push((WALL_TIME.to_string(), duration));
        Ok(report)
    }

    /// The captured value of the first counter labeled `label`.
    pub fn counter(&self, label: &str) -> Option<u64> {
        self.counters
            .iter()
            .find(|c| c.label() == label)
            .map(|c| c.value())
    }

    /// The labels of every registered counter, in registration order.
    pub fn counter_labels(&self) -> Vec<&str> {
        self.counters.iter().map(|c| c.label()).collect()
    }

    /// The registered counters, in registration order.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// How many groups the session's counters ended up in.
    pub fn leader_count(&self) -> usize {
        self.leaders.len()
    }

    /// Wall-clock nanoseconds between the most recent matched start/stop
    /// pair, or 0 if there has been none.
    pub fn duration_ns(&self) -> u64 {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start).as_nanos() as u64,
            _ => 0,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Session")
            .field("counters", &self.counters)
            .field("groups", &self.leaders.len())
            .finish()
    }
}

/// Whether a failed open means the group could not take the counter, as
/// opposed to the counter being unusable outright.
fn group_rejection(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINVAL) | Some(libc::ENOSPC)
    )
}

/// Build the attribute block for one counter.
///
/// The counter starts disabled and is inherited by child threads so the
/// whole task tree of the measured region is counted. The exclude bits are
/// the complement of the domain mask. `ID | GROUP` makes every read on a
/// leader return the whole group keyed by kernel id.
pub(crate) fn counter_attrs(class: u32, config: u64, domain: Domain) -> perf_event_attr {
    let mut attrs = perf_event_attr {
        size: std::mem::size_of::<perf_event_attr>() as u32,
        type_: class,
        config,
        ..perf_event_attr::default()
    };
    attrs.set_disabled(1);
    attrs.set_inherit(1);
    attrs.set_inherit_stat(0);
    attrs.set_pinned(0);
    attrs.set_exclude_user(!domain.contains(Domain::USER) as u64);
    attrs.set_exclude_kernel(!domain.contains(Domain::KERNEL) as u64);
    attrs.set_exclude_hv(!domain.contains(Domain::HYPERVISOR) as u64);
    attrs.read_format = (bindings::PERF_FORMAT_ID | bindings::PERF_FORMAT_GROUP) as u64;
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_domain_mask() {
        let attrs = counter_attrs(bindings::PERF_TYPE_HARDWARE, 0, Domain::USER);
        assert_eq!(attrs.exclude_user(), 0);
        assert_eq!(attrs.exclude_kernel(), 1);
        assert_eq!(attrs.exclude_hv(), 1);

        let attrs = counter_attrs(bindings::PERF_TYPE_HARDWARE, 0, Domain::KERNEL);
        assert_eq!(attrs.exclude_user(), 1);
        assert_eq!(attrs.exclude_kernel(), 0);
        assert_eq!(attrs.exclude_hv(), 1);

        let attrs = counter_attrs(bindings::PERF_TYPE_HARDWARE, 0, Domain::ALL);
        assert_eq!(attrs.exclude_user(), 0);
        assert_eq!(attrs.exclude_kernel(), 0);
        assert_eq!(attrs.exclude_hv(), 0);
    }

    #[test]
    fn attrs_shape() {
        let attrs = counter_attrs(bindings::PERF_TYPE_RAW, 0x00c0, Domain::ALL);
        assert_eq!(attrs.size, std::mem::size_of::<perf_event_attr>() as u32);
        assert_eq!(attrs.type_, bindings::PERF_TYPE_RAW);
        assert_eq!(attrs.config, 0x00c0);
        assert_eq!(attrs.disabled(), 1);
        assert_eq!(attrs.inherit(), 1);
        assert_eq!(attrs.inherit_stat(), 0);
        assert_eq!(attrs.pinned(), 0);
        assert_eq!(
            attrs.read_format,
            (bindings::PERF_FORMAT_ID | bindings::PERF_FORMAT_GROUP) as u64
        );
    }

    #[test]
    fn group_rejection_errnos() {
        use std::io::Error;
        assert!(group_rejection(&Error::from_raw_os_error(libc::EINVAL)));
        assert!(group_rejection(&Error::from_raw_os_error(libc::ENOSPC)));
        assert!(!group_rejection(&Error::from_raw_os_error(libc::EACCES)));
    }

    #[test]
    fn empty_session_reports_wall_time_only() {
        let mut session = Session::empty();
        let report = session.report(false).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, WALL_TIME);
        assert_eq!(report[0].1, 0);
        assert_eq!(session.duration_ns(), 0);
    }
}

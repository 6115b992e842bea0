//! Typed identifiers for the events a counter can observe.
//!
//! Four classes of event are understood, one per variant of [`Event`]:
//!
//! -   [`Hardware`] events are counted by the processor itself: cycles,
//!     retired instructions, branch statistics, and so on.
//!
//! -   [`Software`] events are counted by the kernel: page faults, CPU
//!     migrations, and similar.
//!
//! -   [`Cache`] events pick one level of the cache hierarchy, an operation,
//!     and whether to count all accesses or only misses.
//!
//! -   [`Event::Raw`] passes an architecture-specific event code through to
//!     the PMU unchanged.
//!
//! The kernel identifies an event by a `(class, config)` pair; [`Event::class`]
//! and [`Event::config`] produce exactly the values `perf_event_open(2)`
//! consumes. The symbolic-name tables in [`crate::names`] resolve the
//! corresponding config-file spellings onto these same values.

#![allow(non_camel_case_types)]

use crate::sys::bindings;

/// Any event a counter can be registered for. The [`Hardware`], [`Software`],
/// and [`Cache`] types all implement `Into<Event>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    #[allow(missing_docs)]
    Hardware(Hardware),

    #[allow(missing_docs)]
    Software(Software),

    #[allow(missing_docs)]
    Cache(Cache),

    /// A raw, model-specific event code, used verbatim as the kernel config
    /// word. Consult your processor manual (or `perf list --raw-dump`) for
    /// meaningful values.
    Raw(u64),
}

impl Event {
    /// The kernel event class (`PERF_TYPE_...`) this event belongs to.
    pub fn class(&self) -> u32 {
        match self {
            Event::Hardware(_) => bindings::PERF_TYPE_HARDWARE,
            Event::Software(_) => bindings::PERF_TYPE_SOFTWARE,
            Event::Cache(_) => bindings::PERF_TYPE_HW_CACHE,
            Event::Raw(_) => bindings::PERF_TYPE_RAW,
        }
    }

    /// The 64-bit config word identifying this event within its class.
    pub fn config(&self) -> u64 {
        match self {
            Event::Hardware(hw) => *hw as u64,
            Event::Software(sw) => *sw as u64,
            Event::Cache(cache) => cache.as_config(),
            Event::Raw(config) => *config,
        }
    }
}

/// Hardware counters, implemented by the processor itself.
///
/// These are portable names; what each one maps to varies between
/// architectures and even between models of the same architecture. Each
/// variant corresponds to a `PERF_COUNT_HW_...` value of the
/// [`perf_event_open`][man] system call.
///
/// [man]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Hardware {
    /// Total cycles. Affected by CPU frequency scaling.
    CPU_CYCLES = bindings::PERF_COUNT_HW_CPU_CYCLES,

    /// Retired instructions. Hardware interrupts can perturb this count.
    INSTRUCTIONS = bindings::PERF_COUNT_HW_INSTRUCTIONS,

    /// Cache accesses, usually of the last level cache.
    CACHE_REFERENCES = bindings::PERF_COUNT_HW_CACHE_REFERENCES,

    /// Cache misses, usually of the last level cache.
    CACHE_MISSES = bindings::PERF_COUNT_HW_CACHE_MISSES,

    /// Retired branch instructions.
    BRANCH_INSTRUCTIONS = bindings::PERF_COUNT_HW_BRANCH_INSTRUCTIONS,

    /// Mispredicted branch instructions.
    BRANCH_MISSES = bindings::PERF_COUNT_HW_BRANCH_MISSES,

    /// Bus cycles; may differ from total cycles.
    BUS_CYCLES = bindings::PERF_COUNT_HW_BUS_CYCLES,

    /// Cycles stalled during issue.
    STALLED_CYCLES_FRONTEND = bindings::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,

    /// Cycles stalled during retirement.
    STALLED_CYCLES_BACKEND = bindings::PERF_COUNT_HW_STALLED_CYCLES_BACKEND,

    /// Total cycles, unaffected by frequency scaling.
    REF_CPU_CYCLES = bindings::PERF_COUNT_HW_REF_CPU_CYCLES,
}

impl From<Hardware> for Event {
    fn from(hw: Hardware) -> Event {
        Event::Hardware(hw)
    }
}

/// Software counters, implemented by the kernel.
///
/// Each variant corresponds to a `PERF_COUNT_SW_...` value of the
/// [`perf_event_open`][man] system call.
///
/// [man]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Software {
    /// A high-resolution per-CPU timer.
    CPU_CLOCK = bindings::PERF_COUNT_SW_CPU_CLOCK,

    /// A clock count specific to the task being monitored.
    TASK_CLOCK = bindings::PERF_COUNT_SW_TASK_CLOCK,

    /// Page faults, minor and major together.
    PAGE_FAULTS = bindings::PERF_COUNT_SW_PAGE_FAULTS,

    /// Context switches.
    CONTEXT_SWITCHES = bindings::PERF_COUNT_SW_CONTEXT_SWITCHES,

    /// Migrations of the task to another CPU.
    CPU_MIGRATIONS = bindings::PERF_COUNT_SW_CPU_MIGRATIONS,

    /// Minor page faults, resolved without I/O.
    PAGE_FAULTS_MIN = bindings::PERF_COUNT_SW_PAGE_FAULTS_MIN,

    /// Major page faults, requiring I/O.
    PAGE_FAULTS_MAJ = bindings::PERF_COUNT_SW_PAGE_FAULTS_MAJ,

    /// Unaligned accesses the kernel had to fix up. Never counted on x86.
    ALIGNMENT_FAULTS = bindings::PERF_COUNT_SW_ALIGNMENT_FAULTS,

    /// Instructions the kernel had to emulate.
    EMULATION_FAULTS = bindings::PERF_COUNT_SW_EMULATION_FAULTS,

    /// A placeholder event that counts nothing.
    DUMMY = bindings::PERF_COUNT_SW_DUMMY,
}

impl From<Software> for Event {
    fn from(sw: Software) -> Event {
        Event::Software(sw)
    }
}

/// A cache event: one cache, one operation, accesses or misses.
///
/// The kernel encodes the three choices into a single config word; see
/// [`Cache::as_config`]. For example, the L1 data cache read miss rate is the
/// ratio of two such events:
///
/// ```
/// use kprof::events::{Cache, CacheId, CacheOp, CacheResult};
///
/// const ACCESS: Cache = Cache {
///     which: CacheId::L1D,
///     operation: CacheOp::READ,
///     result: CacheResult::ACCESS,
/// };
/// const MISS: Cache = Cache { result: CacheResult::MISS, ..ACCESS };
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Cache {
    /// Which cache to observe (data, instruction, TLB, ...).
    pub which: CacheId,

    /// Which operation to observe (read, write, prefetch).
    pub operation: CacheOp,

    /// All accesses, or only misses?
    pub result: CacheResult,
}

impl Cache {
    /// The composite config word: cache id in bits 0-7, operation in bits
    /// 8-15, result in bits 16-23.
    pub fn as_config(&self) -> u64 {
        self.which as u64 | ((self.operation as u64) << 8) | ((self.result as u64) << 16)
    }
}

impl From<Cache> for Event {
    fn from(cache: Cache) -> Event {
        Event::Cache(cache)
    }
}

/// A cache whose events can be counted.
///
/// Each variant corresponds to a `PERF_COUNT_HW_CACHE_...` value of the
/// [`perf_event_open`][man] system call.
///
/// [man]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheId {
    /// Level 1 data cache.
    L1D = bindings::PERF_COUNT_HW_CACHE_L1D,

    /// Level 1 instruction cache.
    L1I = bindings::PERF_COUNT_HW_CACHE_L1I,

    /// Last-level cache.
    LL = bindings::PERF_COUNT_HW_CACHE_LL,

    /// Data translation lookaside buffer.
    DTLB = bindings::PERF_COUNT_HW_CACHE_DTLB,

    /// Instruction translation lookaside buffer.
    ITLB = bindings::PERF_COUNT_HW_CACHE_ITLB,

    /// Branch prediction unit.
    BPU = bindings::PERF_COUNT_HW_CACHE_BPU,

    /// Local-node memory accesses.
    NODE = bindings::PERF_COUNT_HW_CACHE_NODE,
}

/// The cache operation to observe.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheOp {
    /// Read accesses.
    READ = bindings::PERF_COUNT_HW_CACHE_OP_READ,

    /// Write accesses.
    WRITE = bindings::PERF_COUNT_HW_CACHE_OP_WRITE,

    /// Prefetch accesses.
    PREFETCH = bindings::PERF_COUNT_HW_CACHE_OP_PREFETCH,
}

/// Whether to count all cache accesses or only misses.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheResult {
    /// Every access to the cache.
    ACCESS = bindings::PERF_COUNT_HW_CACHE_RESULT_ACCESS,

    /// Only accesses the cache could not satisfy.
    MISS = bindings::PERF_COUNT_HW_CACHE_RESULT_MISS,
}

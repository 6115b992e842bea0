//! Resolution of symbolic counter names onto kernel event identifiers.
//!
//! The two configuration dialects (see [`crate::Session::new`]) describe an
//! event as a pair of strings: a *class* naming one of the kernel's event
//! types, and an *event* naming the config word within that class. This
//! module owns the lookup tables for both:
//!
//! - [`event_class`] accepts the full `PERF_TYPE_...` spellings; the inline
//!   dialect's one-letter aliases go through [`short_event_class`] instead.
//!
//! - [`event_config`] accepts every `PERF_COUNT_HW_...` and
//!   `PERF_COUNT_SW_...` event name, `|`-joined cache composites such as
//!   `L1D|READ|MISS` (long `PERF_COUNT_HW_CACHE_...` spellings work too),
//!   and falls back to parsing the token as a number: hexadecimal with a
//!   `0x`/`0X` prefix, decimal otherwise.
//!
//! Lookups are total and side-effect-free; an unknown token resolves to
//! `None` and the caller is expected to log and skip the counter rather
//! than register it.

use crate::sys::bindings;

/// Resolve a `PERF_TYPE_...` class name to its kernel event class.
pub fn event_class(name: &str) -> Option<u32> {
    match name {
        "PERF_TYPE_HARDWARE" => Some(bindings::PERF_TYPE_HARDWARE),
        "PERF_TYPE_SOFTWARE" => Some(bindings::PERF_TYPE_SOFTWARE),
        "PERF_TYPE_HW_CACHE" => Some(bindings::PERF_TYPE_HW_CACHE),
        "PERF_TYPE_RAW" => Some(bindings::PERF_TYPE_RAW),
        _ => None,
    }
}

/// Resolve one of the inline-dialect class aliases (`H`, `S`, `C`, `R`).
pub fn short_event_class(tag: &str) -> Option<u32> {
    match tag {
        "H" => Some(bindings::PERF_TYPE_HARDWARE),
        "S" => Some(bindings::PERF_TYPE_SOFTWARE),
        "C" => Some(bindings::PERF_TYPE_HW_CACHE),
        "R" => Some(bindings::PERF_TYPE_RAW),
        _ => None,
    }
}

/// Resolve an event token to its 64-bit config word.
///
/// Named events are tried first, then `|`-joined cache composites, then the
/// numeric fallback. `None` means the token is not a known event.
pub fn event_config(token: &str) -> Option<u64> {
    if let Some(config) = named_event(token) {
        return Some(config);
    }
    if token.contains('|') {
        return cache_config(token);
    }
    parse_number(token)
}

fn named_event(name: &str) -> Option<u64> {
    let config = match name {
        "PERF_COUNT_HW_CPU_CYCLES" => bindings::PERF_COUNT_HW_CPU_CYCLES,
        "PERF_COUNT_HW_INSTRUCTIONS" => bindings::PERF_COUNT_HW_INSTRUCTIONS,
        "PERF_COUNT_HW_CACHE_REFERENCES" => bindings::PERF_COUNT_HW_CACHE_REFERENCES,
        "PERF_COUNT_HW_CACHE_MISSES" => bindings::PERF_COUNT_HW_CACHE_MISSES,
        "PERF_COUNT_HW_BRANCH_INSTRUCTIONS" => bindings::PERF_COUNT_HW_BRANCH_INSTRUCTIONS,
        "PERF_COUNT_HW_BRANCH_MISSES" => bindings::PERF_COUNT_HW_BRANCH_MISSES,
        "PERF_COUNT_HW_BUS_CYCLES" => bindings::PERF_COUNT_HW_BUS_CYCLES,
        "PERF_COUNT_HW_STALLED_CYCLES_FRONTEND" => bindings::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,
        "PERF_COUNT_HW_STALLED_CYCLES_BACKEND" => bindings::PERF_COUNT_HW_STALLED_CYCLES_BACKEND,
        "PERF_COUNT_HW_REF_CPU_CYCLES" => bindings::PERF_COUNT_HW_REF_CPU_CYCLES,
        "PERF_COUNT_SW_CPU_CLOCK" => bindings::PERF_COUNT_SW_CPU_CLOCK,
        "PERF_COUNT_SW_TASK_CLOCK" => bindings::PERF_COUNT_SW_TASK_CLOCK,
        "PERF_COUNT_SW_PAGE_FAULTS" => bindings::PERF_COUNT_SW_PAGE_FAULTS,
        "PERF_COUNT_SW_CONTEXT_SWITCHES" => bindings::PERF_COUNT_SW_CONTEXT_SWITCHES,
        "PERF_COUNT_SW_CPU_MIGRATIONS" => bindings::PERF_COUNT_SW_CPU_MIGRATIONS,
        "PERF_COUNT_SW_PAGE_FAULTS_MIN" => bindings::PERF_COUNT_SW_PAGE_FAULTS_MIN,
        "PERF_COUNT_SW_PAGE_FAULTS_MAJ" => bindings::PERF_COUNT_SW_PAGE_FAULTS_MAJ,
        "PERF_COUNT_SW_ALIGNMENT_FAULTS" => bindings::PERF_COUNT_SW_ALIGNMENT_FAULTS,
        "PERF_COUNT_SW_EMULATION_FAULTS" => bindings::PERF_COUNT_SW_EMULATION_FAULTS,
        "PERF_COUNT_SW_DUMMY" => bindings::PERF_COUNT_SW_DUMMY,
        _ => return None,
    };
    Some(config as u64)
}

/// Compose a cache config word from a `LEVEL|OP|RESULT` token.
fn cache_config(token: &str) -> Option<u64> {
    let mut parts = token.split('|');
    let level = cache_level(parts.next()?.trim())?;
    let op = cache_op(parts.next()?.trim())?;
    let result = cache_result(parts.next()?.trim())?;
    if parts.next().is_some() {
        return None;
    }
    Some(level | (op << 8) | (result << 16))
}

fn cache_level(token: &str) -> Option<u64> {
    let level = match token {
        "L1D" | "PERF_COUNT_HW_CACHE_L1D" => bindings::PERF_COUNT_HW_CACHE_L1D,
        "L1I" | "PERF_COUNT_HW_CACHE_L1I" => bindings::PERF_COUNT_HW_CACHE_L1I,
        "LL" | "PERF_COUNT_HW_CACHE_LL" => bindings::PERF_COUNT_HW_CACHE_LL,
        "DTLB" | "PERF_COUNT_HW_CACHE_DTLB" => bindings::PERF_COUNT_HW_CACHE_DTLB,
        "ITLB" | "PERF_COUNT_HW_CACHE_ITLB" => bindings::PERF_COUNT_HW_CACHE_ITLB,
        "BPU" | "PERF_COUNT_HW_CACHE_BPU" => bindings::PERF_COUNT_HW_CACHE_BPU,
        "NODE" | "PERF_COUNT_HW_CACHE_NODE" => bindings::PERF_COUNT_HW_CACHE_NODE,
        _ => return None,
    };
    Some(level as u64)
}

fn cache_op(token: &str) -> Option<u64> {
    let op = match token {
        "READ" | "PERF_COUNT_HW_CACHE_OP_READ" => bindings::PERF_COUNT_HW_CACHE_OP_READ,
        "WRITE" | "PERF_COUNT_HW_CACHE_OP_WRITE" => bindings::PERF_COUNT_HW_CACHE_OP_WRITE,
        "PREFETCH" | "PERF_COUNT_HW_CACHE_OP_PREFETCH" => bindings::PERF_COUNT_HW_CACHE_OP_PREFETCH,
        _ => return None,
    };
    Some(op as u64)
}

fn cache_result(token: &str) -> Option<u64> {
    let result = match token {
        "ACCESS" | "PERF_COUNT_HW_CACHE_RESULT_ACCESS" => {
            bindings::PERF_COUNT_HW_CACHE_RESULT_ACCESS
        }
        "MISS" | "PERF_COUNT_HW_CACHE_RESULT_MISS" => bindings::PERF_COUNT_HW_CACHE_RESULT_MISS,
        _ => return None,
    };
    Some(result as u64)
}

fn parse_number(token: &str) -> Option<u64> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}

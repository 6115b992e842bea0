//! Counter selection: environment file, inline spec, or the built-in set.

use std::env;
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::events::{Cache, CacheId, CacheOp, CacheResult, Event, Hardware, Software};
use crate::names;

/// Environment variable naming a CSV counter config file.
pub(crate) const COUNTER_FILE_ENV: &str = "KPROF_COUNTER_FILE";

/// Environment variable holding an inline counter config.
pub(crate) const COUNTER_CONF_ENV: &str = "KPROF_COUNTER_CONF";

/// One counter to register: a label and the kernel `(class, config)` pair.
pub(crate) struct CounterSpec {
    pub label: String,
    pub class: u32,
    pub config: u64,
}

/// Consult the environment for a counter selection. `Ok(None)` means neither
/// variable is set and the built-in default set applies.
pub(crate) fn from_env() -> Result<Option<Vec<CounterSpec>>> {
    if let Some(path) = env::var_os(COUNTER_FILE_ENV) {
        debug!("counter selection from {}={:?}", COUNTER_FILE_ENV, path);
        return from_file(Path::new(&path)).map(Some);
    }
    if let Ok(conf) = env::var(COUNTER_CONF_ENV) {
        debug!("counter selection from {}", COUNTER_CONF_ENV);
        return Ok(Some(parse_inline(&conf)));
    }
    Ok(None)
}

/// Load a CSV counter config file of `label,CLASS,EVENT` lines.
pub(crate) fn from_file(path: &Path) -> Result<Vec<CounterSpec>> {
    let text = fs::read_to_string(path).map_err(|source| Error::Config {
        path: path.into(),
        source,
    })?;
    Ok(parse_csv(&text))
}

fn parse_csv(text: &str) -> Vec<CounterSpec> {
    let mut specs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, ',');
        let (label, class_name, event_name) = match (fields.next(), fields.next(), fields.next()) {
            (Some(label), Some(class), Some(event)) => {
                (label.trim(), class.trim(), event.trim())
            }
            _ => {
                warn!("malformed counter config line {:?}; skipping", line);
                continue;
            }
        };
        let class = match names::event_class(class_name) {
            Some(class) => class,
            None => {
                warn!(
                    "unknown event class {:?} for counter {}; skipping",
                    class_name, label
                );
                continue;
            }
        };
        let config = match names::event_config(event_name) {
            Some(config) => config,
            None => {
                warn!(
                    "unknown event {:?} for counter {}; skipping",
                    event_name, label
                );
                continue;
            }
        };
        specs.push(CounterSpec {
            label: label.to_string(),
            class,
            config,
        });
    }
    specs
}

/// Parse the inline dialect: `label,T:V;label,T:V;...` with `T` one of the
/// short class aliases. Empty entries are allowed and skipped.
pub(crate) fn parse_inline(conf: &str) -> Vec<CounterSpec> {
    let mut specs = Vec::new();
    for entry in conf.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (label, event) = match entry.split_once(',') {
            Some(pair) => pair,
            None => {
                warn!("malformed counter config entry {:?}; skipping", entry);
                continue;
            }
        };
        let (tag, value) = match event.split_once(':') {
            Some(pair) => pair,
            None => {
                warn!("malformed counter config entry {:?}; skipping", entry);
                continue;
            }
        };
        let label = label.trim();
        let class = match names::short_event_class(tag.trim()) {
            Some(class) => class,
            None => {
                warn!(
                    "unknown event class {:?} for counter {}; skipping",
                    tag, label
                );
                continue;
            }
        };
        let config = match names::event_config(value.trim()) {
            Some(config) => config,
            None => {
                warn!("unknown event {:?} for counter {}; skipping", value, label);
                continue;
            }
        };
        specs.push(CounterSpec {
            label: label.to_string(),
            class,
            config,
        });
    }
    specs
}

/// The counter selection used when the environment specifies nothing.
///
/// A broad spread over the hardware basics, the first-level and last-level
/// caches, and the software events a benchmark run cares about. The session
/// opens each of these in a group of its own.
pub(crate) fn default_set() -> Vec<CounterSpec> {
    const CACHES: &[(&str, Cache)] = &[
        (
            "L1D-read-access",
            Cache {
                which: CacheId::L1D,
                operation: CacheOp::READ,
                result: CacheResult::ACCESS,
            },
        ),
        (
            "L1D-read-miss",
            Cache {
                which: CacheId::L1D,
                operation: CacheOp::READ,
                result: CacheResult::MISS,
            },
        ),
        (
            "L1D-write-access",
            Cache {
                which: CacheId::L1D,
                operation: CacheOp::WRITE,
                result: CacheResult::ACCESS,
            },
        ),
        (
            "L1I-read-access",
            Cache {
                which: CacheId::L1I,
                operation: CacheOp::READ,
                result: CacheResult::ACCESS,
            },
        ),
        (
            "L1I-read-miss",
            Cache {
                which: CacheId::L1I,
                operation: CacheOp::READ,
                result: CacheResult::MISS,
            },
        ),
        (
            "LL-read-access",
            Cache {
                which: CacheId::LL,
                operation: CacheOp::READ,
                result: CacheResult::ACCESS,
            },
        ),
        (
            "LL-read-miss",
            Cache {
                which: CacheId::LL,
                operation: CacheOp::READ,
                result: CacheResult::MISS,
            },
        ),
        (
            "LL-write-access",
            Cache {
                which: CacheId::LL,
                operation: CacheOp::WRITE,
                result: CacheResult::ACCESS,
            },
        ),
        (
            "LL-write-miss",
            Cache {
                which: CacheId::LL,
                operation: CacheOp::WRITE,
                result: CacheResult::MISS,
            },
        ),
    ];

    let mut specs: Vec<CounterSpec> = vec![
        spec("HW-instructions", Hardware::INSTRUCTIONS),
        spec("CPU-cycles", Hardware::CPU_CYCLES),
        spec("Branch-instructions", Hardware::BRANCH_INSTRUCTIONS),
        spec("Bus-cycles", Hardware::BUS_CYCLES),
        spec("Stalled-cycles-frontend", Hardware::STALLED_CYCLES_FRONTEND),
        spec("Stalled-cycles-backend", Hardware::STALLED_CYCLES_BACKEND),
    ];
    specs.extend(CACHES.iter().map(|&(label, cache)| spec(label, cache)));
    specs.push(spec("Page-faults", Software::PAGE_FAULTS));
    specs.push(spec("Alignment-faults", Software::ALIGNMENT_FAULTS));
    specs.push(spec("CPU-migrations", Software::CPU_MIGRATIONS));
    specs
}

fn spec(label: &str, event: impl Into<Event>) -> CounterSpec {
    let event = event.into();
    CounterSpec {
        label: label.to_string(),
        class: event.class(),
        config: event.config(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::bindings;

    #[test]
    fn csv_lines_resolve() {
        let specs = parse_csv(
            "cyc,PERF_TYPE_HARDWARE,PERF_COUNT_HW_CPU_CYCLES\n\
             ins,PERF_TYPE_HARDWARE,PERF_COUNT_HW_INSTRUCTIONS\n",
        );
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label, "cyc");
        assert_eq!(specs[0].class, bindings::PERF_TYPE_HARDWARE);
        assert_eq!(specs[0].config, bindings::PERF_COUNT_HW_CPU_CYCLES as u64);
        assert_eq!(specs[1].label, "ins");
        assert_eq!(specs[1].config, bindings::PERF_COUNT_HW_INSTRUCTIONS as u64);
    }

    #[test]
    fn csv_skips_unknown_and_malformed_lines() {
        let specs = parse_csv(
            "cyc,PERF_TYPE_HARDWARE,PERF_COUNT_HW_CPU_CYCLES\n\
             \n\
             bogus-line\n\
             bad,PERF_TYPE_NOPE,PERF_COUNT_HW_CPU_CYCLES\n\
             bad2,PERF_TYPE_HARDWARE,PERF_COUNT_HW_NOPE\n\
             l1,PERF_TYPE_HW_CACHE,L1D|READ|MISS\n",
        );
        let labels: Vec<&str> = specs.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["cyc", "l1"]);
        assert_eq!(specs[1].config, 0x1_0000);
    }

    #[test]
    fn inline_entries_resolve() {
        let specs = parse_inline("cyc,H:PERF_COUNT_HW_CPU_CYCLES;raw,R:0x00c0");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label, "cyc");
        assert_eq!(specs[0].class, bindings::PERF_TYPE_HARDWARE);
        assert_eq!(specs[1].label, "raw");
        assert_eq!(specs[1].class, bindings::PERF_TYPE_RAW);
        assert_eq!(specs[1].config, 0x00c0);
    }

    #[test]
    fn inline_skips_empty_and_unknown_entries() {
        let specs = parse_inline(";;cyc,H:PERF_COUNT_HW_CPU_CYCLES;;bad,X:0;worse;f,S:nope;");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].label, "cyc");
    }

    #[test]
    fn default_set_covers_the_classes() {
        let specs = default_set();
        assert!(specs.len() >= 15);
        assert!(specs
            .iter()
            .any(|s| s.class == bindings::PERF_TYPE_HARDWARE));
        assert!(specs
            .iter()
            .any(|s| s.class == bindings::PERF_TYPE_HW_CACHE));
        assert!(specs
            .iter()
            .any(|s| s.class == bindings::PERF_TYPE_SOFTWARE));
        assert!(specs.iter().any(|s| s.label == "CPU-cycles"));
        assert!(specs.iter().any(|s| s.label == "HW-instructions"));
    }
}

//! End-to-end tests against the live kernel.
//!
//! Hardware counters are frequently unavailable in VMs and containers, and
//! `perf_event_open` itself may be forbidden outright by a strict
//! `perf_event_paranoid` setting. Every test probes for what it needs and
//! returns early, with a note, on machines that cannot run it.

use std::os::unix::io::{AsRawFd, RawFd};

use kprof::events::{Cache, CacheId, CacheOp, CacheResult, Hardware, Software};
use kprof::{Domain, Session, WALL_TIME};

fn software_counters_available() -> bool {
    let mut slot: RawFd = -1;
    let mut session = Session::empty();
    matches!(
        session.register_event("probe", &mut slot, Software::CPU_CLOCK, Domain::USER),
        Ok(true)
    )
}

fn hardware_counters_available() -> bool {
    let mut slot: RawFd = -1;
    let mut session = Session::empty();
    matches!(
        session.register_event("probe", &mut slot, Hardware::CPU_CYCLES, Domain::USER),
        Ok(true)
    )
}

/// A workload the optimizer cannot delete: `iterations` volatile stores,
/// each behind a loop backedge.
fn busy_loop(iterations: u64) {
    let mut sink = 0_u64;
    for i in 0..iterations {
        unsafe { std::ptr::write_volatile(&mut sink, i) };
    }
}

#[test]
fn default_session_empty_region() {
    if !software_counters_available() {
        eprintln!("perf_event_open unavailable here; skipping");
        return;
    }
    let mut session = Session::new().expect("default session");

    session.start().unwrap();
    session.stop().unwrap();

    let report = session.report(false).unwrap();
    assert_eq!(report.len(), session.counters().len() + 1);
    let (label, wall) = report.last().unwrap();
    assert_eq!(label, WALL_TIME);
    // The region brackets at least the disable ioctls.
    assert!(*wall > 0);
    assert_eq!(*wall, session.duration_ns());
}

#[test]
fn busy_loop_counts_instructions() {
    if !hardware_counters_available() {
        eprintln!("hardware counters unavailable here; skipping");
        return;
    }
    let mut session = Session::empty();
    let mut group: RawFd = -1;
    assert!(session
        .register_event("HW-instructions", &mut group, Hardware::INSTRUCTIONS, Domain::USER)
        .unwrap());
    let have_cycles = session
        .register_event("CPU-cycles", &mut group, Hardware::CPU_CYCLES, Domain::USER)
        .unwrap();
    let have_branches = session
        .register_event(
            "Branch-instructions",
            &mut group,
            Hardware::BRANCH_INSTRUCTIONS,
            Domain::USER,
        )
        .unwrap();

    session.start().unwrap();
    busy_loop(1_000_000);
    session.stop().unwrap();

    // Each iteration retires several instructions, so the loop alone clears
    // the iteration count.
    assert!(session.counter("HW-instructions").unwrap() >= 1_000_000);
    if have_cycles {
        assert!(session.counter("CPU-cycles").unwrap() > 0);
    }
    if have_branches {
        // One backedge per iteration.
        assert!(session.counter("Branch-instructions").unwrap() >= 1_000_000);
    }
}

#[test]
fn csv_config_builds_one_group() {
    if !hardware_counters_available() {
        eprintln!("hardware counters unavailable here; skipping");
        return;
    }
    let path = std::env::temp_dir().join(format!("kprof-test-{}.csv", std::process::id()));
    std::fs::write(
        &path,
        "cyc,PERF_TYPE_HARDWARE,PERF_COUNT_HW_CPU_CYCLES\n\
         ins,PERF_TYPE_HARDWARE,PERF_COUNT_HW_INSTRUCTIONS\n",
    )
    .unwrap();
    let session = Session::from_config(&path);
    let _ = std::fs::remove_file(&path);
    let mut session = session.expect("two-counter session");

    assert_eq!(session.counter_labels(), ["cyc", "ins"]);
    assert_eq!(session.leader_count(), 1);

    session.start().unwrap();
    busy_loop(100_000);
    session.stop().unwrap();

    // Both members of the group are captured by the same atomic read.
    assert!(session.counter("cyc").unwrap() > 0);
    assert!(session.counter("ins").unwrap() > 0);

    let report = session.report(false).unwrap();
    let labels: Vec<&str> = report.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, ["cyc", "ins", WALL_TIME]);
}

#[test]
fn oversized_group_splits_but_keeps_counting() {
    if !hardware_counters_available() {
        eprintln!("hardware counters unavailable here; skipping");
        return;
    }
    let hardware = [
        ("cycles", Hardware::CPU_CYCLES),
        ("instructions", Hardware::INSTRUCTIONS),
        ("cache-references", Hardware::CACHE_REFERENCES),
        ("cache-misses", Hardware::CACHE_MISSES),
        ("branches", Hardware::BRANCH_INSTRUCTIONS),
        ("branch-misses", Hardware::BRANCH_MISSES),
        ("bus-cycles", Hardware::BUS_CYCLES),
        ("stalled-frontend", Hardware::STALLED_CYCLES_FRONTEND),
        ("stalled-backend", Hardware::STALLED_CYCLES_BACKEND),
        ("ref-cycles", Hardware::REF_CPU_CYCLES),
    ];
    let caches = [
        ("l1d-read-access", CacheId::L1D, CacheOp::READ, CacheResult::ACCESS),
        ("l1d-read-miss", CacheId::L1D, CacheOp::READ, CacheResult::MISS),
        ("l1d-write-access", CacheId::L1D, CacheOp::WRITE, CacheResult::ACCESS),
        ("l1i-read-access", CacheId::L1I, CacheOp::READ, CacheResult::ACCESS),
        ("l1i-read-miss", CacheId::L1I, CacheOp::READ, CacheResult::MISS),
        ("ll-read-access", CacheId::LL, CacheOp::READ, CacheResult::ACCESS),
        ("ll-read-miss", CacheId::LL, CacheOp::READ, CacheResult::MISS),
        ("ll-write-access", CacheId::LL, CacheOp::WRITE, CacheResult::ACCESS),
        ("dtlb-read-access", CacheId::DTLB, CacheOp::READ, CacheResult::ACCESS),
        ("dtlb-read-miss", CacheId::DTLB, CacheOp::READ, CacheResult::MISS),
    ];

    let mut session = Session::empty();
    let mut group: RawFd = -1;
    for (label, event) in hardware {
        session
            .register_event(label, &mut group, event, Domain::USER)
            .unwrap();
    }
    for (label, which, operation, result) in caches {
        let cache = Cache {
            which,
            operation,
            result,
        };
        session
            .register_event(label, &mut group, cache, Domain::USER)
            .unwrap();
    }

    // The probe counter opened, so at minimum the first registration did.
    assert!(!session.counters().is_empty());

    // Twenty hardware events never fit one PMU group; if most of them opened,
    // the session must have been forced to split.
    if session.counters().len() >= 12 {
        assert!(session.leader_count() >= 2);
    }

    // A rejected follower either became a leader or was dropped; whatever
    // made it into the session has a real leader descriptor.
    for counter in session.counters() {
        assert!(counter.leader_fd() >= 0);
        assert_eq!(
            counter.is_leader(),
            counter.leader_fd() == counter.as_raw_fd()
        );
    }

    session.start().unwrap();
    busy_loop(100_000);
    session.stop().unwrap();

    // The report covers exactly the counters that opened, in order.
    let report = session.report(false).unwrap();
    assert_eq!(report.len(), session.counters().len() + 1);
    let mut expected: Vec<&str> = session.counter_labels();
    expected.push(WALL_TIME);
    let labels: Vec<&str> = report.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, expected);
}

#[test]
fn overhead_correction_shrinks_counts() {
    if !hardware_counters_available() {
        eprintln!("hardware counters unavailable here; skipping");
        return;
    }
    let mut session = Session::empty();
    let mut group: RawFd = -1;
    assert!(session
        .register_event("CPU-cycles", &mut group, Hardware::CPU_CYCLES, Domain::USER)
        .unwrap());

    session.start().unwrap();
    busy_loop(1_000_000);
    session.stop().unwrap();

    let uncorrected = session.report(false).unwrap()[0].1;
    let corrected = session.report(true).unwrap()[0].1;

    assert!(uncorrected > 0);
    assert!(corrected < uncorrected);
}

#[test]
fn duplicate_labels_return_first_match() {
    if !software_counters_available() {
        eprintln!("perf_event_open unavailable here; skipping");
        return;
    }
    let mut session = Session::empty();
    let mut group: RawFd = -1;
    assert!(session
        .register_event("clock", &mut group, Software::CPU_CLOCK, Domain::USER)
        .unwrap());
    assert!(session
        .register_event("clock", &mut group, Software::TASK_CLOCK, Domain::USER)
        .unwrap());

    session.start().unwrap();
    busy_loop(10_000);
    session.stop().unwrap();

    assert_eq!(session.counter("clock"), Some(session.counters()[0].value()));
}

//! Compare raw and overhead-corrected counts for one counter group, and
//! derive instructions-per-cycle from a single atomic group read.

use std::os::unix::io::RawFd;

use kprof::events::Hardware;
use kprof::{Domain, Session};

fn main() -> kprof::Result<()> {
    env_logger::init();

    let mut session = Session::empty();
    let mut group: RawFd = -1;
    session.register_event("cycles", &mut group, Hardware::CPU_CYCLES, Domain::USER)?;
    session.register_event("instructions", &mut group, Hardware::INSTRUCTIONS, Domain::USER)?;

    session.start()?;
    let mut sink = 0_u64;
    for i in 0..10_000_000_u64 {
        unsafe { std::ptr::write_volatile(&mut sink, i) };
    }
    session.stop()?;

    let cycles = session.counter("cycles").unwrap_or(0);
    let instructions = session.counter("instructions").unwrap_or(0);
    println!("wall time : {} ns", session.duration_ns());
    if cycles > 0 {
        println!("ipc       : {:.2}", instructions as f64 / cycles as f64);
    }

    println!("\nraw:");
    for (label, value) in session.report(false)? {
        println!("{:>16} : {}", label, value);
    }
    println!("\noverhead-corrected:");
    for (label, value) in session.report(true)? {
        println!("{:>16} : {}", label, value);
    }
    Ok(())
}

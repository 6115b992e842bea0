//! Print the default counter report for a small workload.
//!
//! Set `KPROF_COUNTER_FILE` or `KPROF_COUNTER_CONF` to measure a different
//! counter selection, and `RUST_LOG=kprof=debug` to watch the registration
//! decisions.

use kprof::Session;

fn main() -> kprof::Result<()> {
    env_logger::init();

    let mut session = Session::new()?;

    session.start()?;
    let mut sum = 0_u64;
    for i in 0..5_000_000_u64 {
        sum = sum.wrapping_add(i ^ (i >> 3));
    }
    unsafe { std::ptr::read_volatile(&sum) };
    session.stop()?;

    for (label, value) in session.report(false)? {
        println!("{:>24} : {}", label, value);
    }
    Ok(())
}

//! End-to-end locking scenarios across threads: interleaved reads,
//! recursive acquisition, symmetric deadlocks, held-time warnings, and
//! unwind safety.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use guardcell::assert::AssertionError;
use guardcell::sync::SpinningBarrier;
use guardcell::{
    ensure, CellId, CellTraits, GuardedCell, HeldReport, LockTimeout, WatchedTraits,
};
use parking_lot::Mutex;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Policy with a const-generic millisecond timeout and no hooks.
#[derive(Default)]
struct MillisTimeout<const MS: u64>;

impl<const MS: u64> CellTraits for MillisTimeout<MS> {
    type Held = ();

    fn timeout(&self) -> LockTimeout {
        LockTimeout::After(Duration::from_millis(MS))
    }

    fn on_locked(&self, _cell: CellId) {}
}

/// A reader that drops its guard between looks at a value another
/// thread keeps bumping. Observing two different values is fine; the
/// scenario only demands that nothing tears or panics.
#[test]
fn interleaved_reads_survive_a_concurrent_writer() {
    init_logging();
    let cell = Arc::new(GuardedCell::<u64>::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let cell = Arc::clone(&cell);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if let Ok(mut w) = cell.write() {
                    *w += 1;
                }
                thread::yield_now();
            }
        })
    };

    let mut observed_change = false;
    for _ in 0..200 {
        let v1 = match cell.read() {
            Ok(r) => *r,
            Err(_) => continue,
        };
        let v2 = match cell.read() {
            Ok(r) => *r,
            Err(_) => continue,
        };
        // The counter only grows; an inversion would mean a torn read.
        assert!(v2 >= v1, "reads went backwards: {v1} then {v2}");
        if v2 != v1 {
            observed_change = true;
        }
    }

    stop.store(true, Ordering::Relaxed);
    writer.join().expect("writer thread");
    tracing::info!(observed_change, "interleaved read scenario done");
}

/// Reacquiring a write guard on the same thread must fail after two
/// timeout intervals (the failed wait plus the deadlock probe), with
/// nothing for the probe to pick up.
#[test]
fn recursive_write_is_refused() {
    init_logging();
    let cell = GuardedCell::<u32, MillisTimeout<10>>::new(0);

    let _outer = cell.write().expect("outer write");
    let started = Instant::now();
    let err = cell.write().expect_err("recursive write must time out");
    let elapsed = started.elapsed();

    assert_eq!(err.timeout(), Duration::from_millis(10));
    assert!(!err.try_again(), "no counterpart could have released");
    assert!(
        elapsed >= Duration::from_millis(18),
        "both timeout intervals must elapse, got {elapsed:?}"
    );
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
}

/// Two threads acquiring two cells in opposite orders. The probe holds
/// each failing thread long enough that its counterpart also times out,
/// so the deadlock is reported symmetrically on both sides.
#[test]
fn symmetric_deadlock_fails_on_both_sides() {
    init_logging();
    let a = Arc::new(GuardedCell::<u32, MillisTimeout<2>>::new(0));
    let b = Arc::new(GuardedCell::<u32, MillisTimeout<2>>::new(0));
    let barrier = Arc::new(SpinningBarrier::new(2));

    let cross = |first: Arc<GuardedCell<u32, MillisTimeout<2>>>,
                 second: Arc<GuardedCell<u32, MillisTimeout<2>>>,
                 barrier: Arc<SpinningBarrier>| {
        thread::spawn(move || {
            let held = first.write().expect("first cell is free");
            barrier.wait();
            let outcome = second.write().map(|_| ()).err();
            // Keep the held guard until the counterpart finished its
            // attempts, so neither side can slip through.
            barrier.wait();
            drop(held);
            outcome
        })
    };

    let t1 = cross(Arc::clone(&a), Arc::clone(&b), Arc::clone(&barrier));
    let t2 = cross(b, a, barrier);

    let e1 = t1.join().expect("thread 1").expect("thread 1 must fail");
    let e2 = t2.join().expect("thread 2").expect("thread 2 must fail");

    assert!(
        !(e1.try_again() && e2.try_again()),
        "at most one side may see the probe succeed"
    );
}

/// A guard held an order of magnitude past the watch threshold reports
/// exactly once, after release, with the full hold time observed.
#[test]
fn held_too_long_warns_once_after_release() {
    init_logging();
    let fired = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(Mutex::new(Duration::ZERO));

    let report: HeldReport = {
        let fired = Arc::clone(&fired);
        let observed = Arc::clone(&observed);
        Arc::new(move |warning| {
            fired.fetch_add(1, Ordering::SeqCst);
            *observed.lock() = warning.observed;
        })
    };

    let cell = GuardedCell::with_traits(
        0u32,
        WatchedTraits::new(LockTimeout::DEFAULT, Duration::from_millis(1)).with_report(report),
    );

    {
        let mut w = cell.write().expect("write");
        *w = 1;
        thread::sleep(Duration::from_millis(10));
        assert_eq!(fired.load(Ordering::SeqCst), 0, "nothing fires while held");
    }

    assert_eq!(fired.load(Ordering::SeqCst), 1, "exactly one warning");
    assert!(*observed.lock() >= Duration::from_millis(10));

    // Subsequent quick guards stay silent.
    drop(cell.read().expect("read"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// Unwinding through a write guard still releases the lock: another
/// thread's try_write succeeds immediately afterwards.
#[test]
fn panic_inside_write_guard_releases_the_lock() {
    init_logging();
    let cell = Arc::new(GuardedCell::<u32>::new(1));

    let unwound = catch_unwind(AssertUnwindSafe(|| {
        let mut w = cell.write().expect("write");
        *w = 2;
        panic!("unwind through the guard");
    }));
    assert!(unwound.is_err());

    let probe = {
        let cell = Arc::clone(&cell);
        thread::spawn(move || cell.try_write().is_some())
    };
    assert!(probe.join().expect("probe thread"), "lock must be free");
    assert_eq!(*cell.read().expect("read"), 2, "the write before the panic stuck");
}

struct Tracked {
    live: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            live: Arc::clone(live),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn build_cell(
    fail: bool,
    live: &Arc<AtomicUsize>,
) -> Result<GuardedCell<Tracked>, AssertionError> {
    let value = Tracked::new(live);
    ensure!(!fail, "construction rejected");
    Ok(GuardedCell::new(value))
}

/// A failure while producing the value happens before any cell exists:
/// nothing is partially built and nothing leaks.
#[test]
fn failed_construction_leaves_no_cell_behind() {
    init_logging();
    let live = Arc::new(AtomicUsize::new(0));

    let err = build_cell(true, &live).expect_err("construction must fail");
    assert_eq!(err.message(), Some("construction rejected"));
    assert_eq!(live.load(Ordering::SeqCst), 0, "the value was torn down");

    let cell = build_cell(false, &live).expect("construction succeeds");
    assert_eq!(live.load(Ordering::SeqCst), 1);
    drop(cell);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

/// Readers on several threads share the lock concurrently; a writer
/// gets exclusivity once they are gone.
#[test]
fn shared_readers_then_exclusive_writer() {
    init_logging();
    let cell = Arc::new(GuardedCell::<Vec<u32>>::new(vec![1, 2, 3]));
    let barrier = Arc::new(SpinningBarrier::new(4));

    let mut readers = Vec::new();
    for _ in 0..3 {
        let cell = Arc::clone(&cell);
        let barrier = Arc::clone(&barrier);
        readers.push(thread::spawn(move || {
            let r = cell.read().expect("read");
            // All three readers hold their guards at this rendezvous.
            barrier.wait();
            r.len()
        }));
    }

    barrier.wait();
    for reader in readers {
        assert_eq!(reader.join().expect("reader thread"), 3);
    }

    cell.write().expect("write after readers").push(4);
    assert_eq!(cell.read().expect("read").len(), 4);
}

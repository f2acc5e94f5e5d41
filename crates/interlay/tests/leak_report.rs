//! Accounting properties of the object tracker, including the
//! classification sweep and thread-interleaving invariance.

use interlay::{Handle, LeakClass, ObjectKind, ObjectTracker};

fn tracker_with(kind: ObjectKind, allocs: u64, retains: u64, releases: u64) -> ObjectTracker {
    let tracker = ObjectTracker::new();
    let handle = Handle::from_raw(0x77);
    for _ in 0..allocs {
        tracker.record_allocation(kind, handle);
    }
    for _ in 0..retains {
        tracker.record_retain(kind, handle);
    }
    for _ in 0..releases {
        tracker.record_release(kind, handle);
    }
    tracker
}

#[test]
fn classification_sweep() {
    let cases: &[(u64, u64, u64, LeakClass)] = &[
        (0, 0, 0, LeakClass::Untouched),
        (3, 2, 4, LeakClass::PossibleLeak),
        (3, 2, 6, LeakClass::UnexpectedCounts),
        (3, 2, 5, LeakClass::Clean),
        (0, 0, 1, LeakClass::UnexpectedCounts),
        (1, 0, 0, LeakClass::PossibleLeak),
        (0, 2, 2, LeakClass::Clean),
    ];
    for &(allocs, retains, releases, expected) in cases {
        let tracker = tracker_with(ObjectKind::Program, allocs, retains, releases);
        assert_eq!(
            tracker.snapshot(ObjectKind::Program).classify(),
            expected,
            "allocs={allocs} retains={retains} releases={releases}"
        );
    }
}

#[test]
fn interleaving_across_threads_yields_identical_counters() {
    // The same multiset of operations, split across threads in different
    // proportions, must land on the same final counters.
    let run = |threads: usize| {
        let tracker = std::sync::Arc::new(ObjectTracker::new());
        let per_thread = 1200 / threads;
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let tracker = std::sync::Arc::clone(&tracker);
                std::thread::spawn(move || {
                    let handle = Handle::from_raw(0x99);
                    for _ in 0..per_thread {
                        tracker.record_allocation(ObjectKind::MemObject, handle);
                        tracker.record_release(ObjectKind::MemObject, handle);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        tracker.snapshot(ObjectKind::MemObject)
    };

    for threads in [1, 2, 4, 8] {
        let counts = run(threads);
        assert_eq!(counts.allocations, 1200);
        assert_eq!(counts.releases, 1200);
        assert_eq!(counts.classify(), LeakClass::Clean);
    }
}

#[test]
fn report_orders_types_and_prints_full_blocks() {
    let tracker = ObjectTracker::new();
    let handle = Handle::from_raw(0x42);
    // Touch types out of report order; the report still walks the fixed
    // type order.
    tracker.record_allocation(ObjectKind::Event, handle);
    tracker.record_allocation(ObjectKind::Device, handle);
    tracker.record_release(ObjectKind::Device, handle);
    tracker.record_release(ObjectKind::Semaphore, handle);

    let mut out = Vec::new();
    tracker.write_report(&mut out).unwrap();
    let report = String::from_utf8(out).unwrap();

    assert_eq!(
        report,
        "No cl_device_id leaks detected.\n\
         \x20   Number of Allocations: 1\n\
         \x20   Number of Retains:     0\n\
         \x20   Number of Releases:    1\n\
         Possible leak of type cl_event!\n\
         \x20   Number of Allocations: 1\n\
         \x20   Number of Retains:     0\n\
         \x20   Number of Releases:    0\n\
         Unexpected counts for type cl_semaphore_khr!\n\
         \x20   Number of Allocations: 0\n\
         \x20   Number of Retains:     0\n\
         \x20   Number of Releases:    1\n"
    );
}

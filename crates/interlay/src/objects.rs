//! Aggregate object-lifecycle accounting.
//!
//! Counting is per type, not per instance: the hot path is a single
//! relaxed atomic increment and never allocates, locks, or stores the
//! handle. The invariant `releases <= allocations + retains` is only
//! checked at reporting time.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::api::Handle;

/// The closed set of tracked object types. Counts for one type never
/// affect another.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    Device,
    Context,
    CommandQueue,
    MemObject,
    Sampler,
    Program,
    Kernel,
    Event,
    Semaphore,
    CommandBuffer,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 10] = [
        ObjectKind::Device,
        ObjectKind::Context,
        ObjectKind::CommandQueue,
        ObjectKind::MemObject,
        ObjectKind::Sampler,
        ObjectKind::Program,
        ObjectKind::Kernel,
        ObjectKind::Event,
        ObjectKind::Semaphore,
        ObjectKind::CommandBuffer,
    ];

    /// The wrapped API's name for this object type.
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Device => "cl_device_id",
            ObjectKind::Context => "cl_context",
            ObjectKind::CommandQueue => "cl_command_queue",
            ObjectKind::MemObject => "cl_mem",
            ObjectKind::Sampler => "cl_sampler",
            ObjectKind::Program => "cl_program",
            ObjectKind::Kernel => "cl_kernel",
            ObjectKind::Event => "cl_event",
            ObjectKind::Semaphore => "cl_semaphore_khr",
            ObjectKind::CommandBuffer => "cl_command_buffer_khr",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Final state of one type's counters.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeakClass {
    /// Never touched; the report stays silent.
    Untouched,
    /// Every allocation and retain was matched by a release.
    Clean,
    /// Fewer releases than allocations plus retains.
    PossibleLeak,
    /// More releases than allocations plus retains - the tracker missed
    /// allocations or counted an operation the implementation rejected.
    UnexpectedCounts,
}

/// Snapshot of one type's counters.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct TypeCounts {
    pub allocations: u64,
    pub retains: u64,
    pub releases: u64,
}

impl TypeCounts {
    pub fn classify(&self) -> LeakClass {
        if self.allocations == 0 && self.retains == 0 && self.releases == 0 {
            LeakClass::Untouched
        } else if self.releases < self.allocations + self.retains {
            LeakClass::PossibleLeak
        } else if self.releases > self.allocations + self.retains {
            LeakClass::UnexpectedCounts
        } else {
            LeakClass::Clean
        }
    }
}

#[derive(Default)]
struct Counters {
    allocations: AtomicU64,
    retains: AtomicU64,
    releases: AtomicU64,
}

/// Lock-free per-type lifecycle counters.
#[derive(Default)]
pub struct ObjectTracker {
    counters: [Counters; 10],
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one successful allocation. Null handles are ignored,
    /// mirroring the wrapped API's own tolerance of null in some paths.
    pub fn record_allocation(&self, kind: ObjectKind, handle: Handle) {
        if !handle.is_null() {
            self.counters[kind.index()]
                .allocations
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_retain(&self, kind: ObjectKind, handle: Handle) {
        if !handle.is_null() {
            self.counters[kind.index()]
                .retains
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_release(&self, kind: ObjectKind, handle: Handle) {
        if !handle.is_null() {
            self.counters[kind.index()]
                .releases
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, kind: ObjectKind) -> TypeCounts {
        let counters = &self.counters[kind.index()];
        TypeCounts {
            allocations: counters.allocations.load(Ordering::Relaxed),
            retains: counters.retains.load(Ordering::Relaxed),
            releases: counters.releases.load(Ordering::Relaxed),
        }
    }

    /// Writes the final accounting report: one block per type with any
    /// activity, silence for the rest.
    pub fn write_report(&self, out: &mut dyn Write) -> io::Result<()> {
        for kind in ObjectKind::ALL {
            let counts = self.snapshot(kind);
            let heading = match counts.classify() {
                LeakClass::Untouched => continue,
                LeakClass::Clean => format!("No {} leaks detected.", kind.label()),
                LeakClass::PossibleLeak => format!("Possible leak of type {}!", kind.label()),
                LeakClass::UnexpectedCounts => {
                    format!("Unexpected counts for type {}!", kind.label())
                }
            };
            writeln!(out, "{heading}")?;
            writeln!(out, "    Number of Allocations: {}", counts.allocations)?;
            writeln!(out, "    Number of Retains:     {}", counts.retains)?;
            writeln!(out, "    Number of Releases:    {}", counts.releases)?;
        }
        Ok(())
    }
}

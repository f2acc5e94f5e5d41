//! Lock-free per-entry-point host timing.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::pipeline::FnId;

struct Slot {
    calls: AtomicU64,
    total_ns: AtomicU64,
    min_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
            min_ns: AtomicU64::new(u64::MAX),
            max_ns: AtomicU64::new(0),
        }
    }
}

/// Timing stats for one entry point, snapshotted for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FnTiming {
    pub name: &'static str,
    pub calls: u64,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

impl FnTiming {
    pub fn avg_ns(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_ns / self.calls
        }
    }
}

/// One fixed slot per intercepted identity; recording is four relaxed
/// atomic updates, nothing more.
pub struct HostTiming {
    slots: [Slot; FnId::COUNT],
}

impl Default for HostTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTiming {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::new()),
        }
    }

    pub fn record(&self, id: FnId, elapsed_ns: u64) {
        let slot = &self.slots[id.index()];
        slot.calls.fetch_add(1, Ordering::Relaxed);
        slot.total_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
        slot.min_ns.fetch_min(elapsed_ns, Ordering::Relaxed);
        slot.max_ns.fetch_max(elapsed_ns, Ordering::Relaxed);
    }

    /// Entry points that were actually called, sorted by total time
    /// descending, ties broken by name for deterministic reports.
    pub fn snapshot(&self) -> Vec<FnTiming> {
        let mut rows: Vec<FnTiming> = FnId::ALL
            .iter()
            .filter_map(|&id| {
                let slot = &self.slots[id.index()];
                let calls = slot.calls.load(Ordering::Relaxed);
                if calls == 0 {
                    return None;
                }
                Some(FnTiming {
                    name: id.name(),
                    calls,
                    total_ns: slot.total_ns.load(Ordering::Relaxed),
                    min_ns: slot.min_ns.load(Ordering::Relaxed),
                    max_ns: slot.max_ns.load(Ordering::Relaxed),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.total_ns.cmp(&a.total_ns).then_with(|| a.name.cmp(b.name)));
        rows
    }
}

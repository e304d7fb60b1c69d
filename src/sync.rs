use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The shared resource the processes compete for. An atomic cell gives
/// tear-free reads and writes and nothing more: it is not a lock, and the
/// quorum protocol is the only thing keeping writers from overlapping.
#[derive(Clone, Debug)]
pub struct SharedCell(Arc<AtomicI64>);

impl SharedCell {
    pub fn new(value: i64) -> Self {
        Self(Arc::new(AtomicI64::new(value)))
    }

    pub fn read(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Stores a new value, returning the one it replaced.
    pub fn write(&self, value: i64) -> i64 {
        self.0.swap(value, Ordering::SeqCst)
    }
}

/// Trace observer counting how many processes are in the critical section
/// at once. The protocol never reads it; tests and the simulation report
/// use the peak to check mutual exclusion.
#[derive(Clone, Debug, Default)]
pub struct CriticalSectionGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CriticalSectionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

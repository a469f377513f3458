use core::sync::atomic::{AtomicU64, Ordering};
use minstant::Instant;

/// Relaxed counter on its own cache line, bumped by one ring endpoint and
/// read by whoever reports.
#[repr(align(64))]
pub struct StatCounter(AtomicU64);

impl StatCounter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline(always)]
    pub fn inc(&self) {
        self.add(1);
    }

    #[inline(always)]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for StatCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Handoff counters shared by the producer and consumer threads.
///
/// Relaxed: these are reporting figures, never used to synchronise the ring.
#[derive(Default)]
pub struct QueueStats {
    pub enqueued: StatCounter,
    pub dequeued: StatCounter,
    /// Enqueue attempts refused because the ring was full.
    pub rejected: StatCounter,
}

impl QueueStats {
    pub const fn new() -> Self {
        Self {
            enqueued: StatCounter::new(),
            dequeued: StatCounter::new(),
            rejected: StatCounter::new(),
        }
    }

    /// Items published but not yet observed by the consumer.
    pub fn in_flight(&self) -> u64 {
        self.enqueued.get().saturating_sub(self.dequeued.get())
    }
}

/// Per-drain timing kept by the consumer: how long each simulated audio
/// callback spent pulling its batch off the ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchLatency {
    pub batches: u64,
    pub items: u64,
    pub total_nanos: u64,
    pub worst_nanos: u64,
}

impl BatchLatency {
    /// Close a batch that began at `started` and moved `items` records.
    #[inline(always)]
    pub fn record(&mut self, started: Instant, items: usize) {
        self.record_nanos(started.elapsed().as_nanos() as u64, items);
    }

    #[inline(always)]
    pub fn record_nanos(&mut self, nanos: u64, items: usize) {
        self.batches += 1;
        self.items += items as u64;
        self.total_nanos = self.total_nanos.saturating_add(nanos);
        self.worst_nanos = self.worst_nanos.max(nanos);
    }

    pub fn mean_nanos(&self) -> u64 {
        self.total_nanos.checked_div(self.batches).unwrap_or(0)
    }

    pub fn mean_batch(&self) -> u64 {
        self.items.checked_div(self.batches).unwrap_or(0)
    }
}

/// Wall-clock span of a whole run.
pub struct RunTimer(Instant);

impl RunTimer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.0.elapsed().as_micros() as u64
    }

    /// Throughput of `items` over `micros`; 0 when no time was measured.
    pub fn rate_per_sec(items: u64, micros: u64) -> u64 {
        if micros == 0 {
            0
        } else {
            items.saturating_mul(1_000_000) / micros
        }
    }
}

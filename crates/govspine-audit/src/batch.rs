//! Per-request mutation counters for batch suppression
//!
//! Counts individual mutations per `(request_id, entity_type)`. Once a
//! request has performed more than the threshold for one entity type, the
//! middleware stops writing individual entries for that pair. Counters
//! expire a fixed window after they were opened and are swept
//! opportunistically, so the map stays bounded without a background task.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use govspine_core::config::AuditConfig;
use govspine_core::domain::RequestId;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    opened: Instant,
}

/// Concurrent counter map keyed by request and entity type
#[derive(Debug)]
pub struct BatchTracker {
    counters: DashMap<(RequestId, String), Counter>,
    threshold: u32,
    window: Duration,
    last_sweep: Mutex<Instant>,
}

impl BatchTracker {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            threshold,
            window,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.batch_threshold, config.batch_window())
    }

    /// Counts one mutation and reports whether it should still be logged
    /// individually.
    pub fn record(&self, request_id: RequestId, entity_type: &str) -> bool {
        self.record_at(request_id, entity_type, Instant::now())
    }

    pub(crate) fn record_at(&self, request_id: RequestId, entity_type: &str, now: Instant) -> bool {
        self.maybe_sweep(now);

        let mut counter = self
            .counters
            .entry((request_id, entity_type.to_string()))
            .or_insert(Counter {
                count: 0,
                opened: now,
            });

        if now.saturating_duration_since(counter.opened) >= self.window {
            *counter = Counter {
                count: 0,
                opened: now,
            };
        }

        counter.count = counter.count.saturating_add(1);
        let individual = counter.count <= self.threshold;

        if !individual && counter.count == self.threshold + 1 {
            tracing::debug!(
                request_id = %request_id,
                entity_type = %entity_type,
                threshold = self.threshold,
                "Batch threshold reached, suppressing individual audit entries"
            );
        }

        individual
    }

    /// Number of live counters
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drops counters whose window has elapsed
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let window = self.window;
        self.counters
            .retain(|_, c| now.saturating_duration_since(c.opened) < window);
    }

    // At most one sweep per window; contention just skips it.
    fn maybe_sweep(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last) >= self.window {
            *last = now;
            drop(last);
            self.sweep_at(now);
        }
    }
}

impl Default for BatchTracker {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

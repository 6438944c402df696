//! Actor system counters.

use crate::lanes::OutputKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// System-wide metrics, updated with relaxed atomics from any task
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub results_enqueued: AtomicU64,
    pub exceptions_enqueued: AtomicU64,
    pub messages_dispatched: AtomicU64,
    pub handler_invocations: AtomicU64,
    pub handler_failures: AtomicU64,
    pub total_handler_time_ns: AtomicU64,
    pub terminal_collected: AtomicU64,
    pub orphans_dropped: AtomicU64,
    pub unknown_receivers: AtomicU64,
}

impl SystemMetrics {
    pub fn record_enqueued(&self, kind: OutputKind, count: usize) {
        let counter = match kind {
            OutputKind::Result => &self.results_enqueued,
            OutputKind::Exception => &self.exceptions_enqueued,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_call(&self, duration: Duration, success: bool) {
        self.handler_invocations.fetch_add(1, Ordering::Relaxed);
        self.total_handler_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if !success {
            self.handler_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_collected(&self) {
        self.terminal_collected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphan(&self) {
        self.orphans_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_receiver(&self) {
        self.unknown_receivers.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn get_stats(&self) -> SystemStats {
        SystemStats {
            results_enqueued: self.results_enqueued.load(Ordering::Relaxed),
            exceptions_enqueued: self.exceptions_enqueued.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            total_handler_time_ns: self.total_handler_time_ns.load(Ordering::Relaxed),
            terminal_collected: self.terminal_collected.load(Ordering::Relaxed),
            orphans_dropped: self.orphans_dropped.load(Ordering::Relaxed),
            unknown_receivers: self.unknown_receivers.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemStats {
    pub results_enqueued: u64,
    pub exceptions_enqueued: u64,
    pub messages_dispatched: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
    pub total_handler_time_ns: u64,
    pub terminal_collected: u64,
    pub orphans_dropped: u64,
    pub unknown_receivers: u64,
}

impl SystemStats {
    pub fn avg_handler_time_ns(&self) -> f64 {
        if self.handler_invocations == 0 {
            return 0.0;
        }
        self.total_handler_time_ns as f64 / self.handler_invocations as f64
    }

    pub fn total_enqueued(&self) -> u64 {
        self.results_enqueued + self.exceptions_enqueued
    }
}

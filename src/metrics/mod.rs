//! Request outcome counters

use crate::orchestrator::{CompletionOutcome, RunReport};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Counters since process start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayMetrics {
    /// Requests handed to the orchestrator
    pub requests: u64,
    pub successes: u64,
    pub empty_results: u64,
    pub failures: u64,
    /// Drafts that could not be created (notice fallback used)
    pub draft_fallbacks: u64,
    pub draft_updates: u64,
    pub draft_update_failures: u64,
    /// Final messages the chat platform rejected
    pub final_send_failures: u64,
    /// Webhook bodies that could not be parsed
    pub invalid_updates: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&mut self, report: &RunReport) {
        self.requests += 1;
        match report.outcome {
            CompletionOutcome::Success(_) => self.successes += 1,
            CompletionOutcome::EmptyResult => self.empty_results += 1,
            CompletionOutcome::Failure(_) => self.failures += 1,
        }
        if !report.draft_created {
            self.draft_fallbacks += 1;
        }
        self.draft_updates += report.draft_updates as u64;
        self.draft_update_failures += report.draft_update_failures as u64;
        if !report.final_delivered {
            self.final_send_failures += 1;
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 1.0;
        }
        (self.successes + self.empty_results) as f64 / self.requests as f64
    }
}

/// Thread-safe metrics tracker
#[derive(Clone, Default)]
pub struct MetricsTracker {
    inner: Arc<Mutex<RelayMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self, report: &RunReport) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.record_run(report);
        }
    }

    pub fn record_invalid_update(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.invalid_updates += 1;
        }
    }

    pub fn get_metrics(&self) -> RelayMetrics {
        self.inner
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for RelayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics ===")?;
        writeln!(f, "Requests: {}", self.requests)?;
        writeln!(f, "Successes: {}", self.successes)?;
        writeln!(f, "Empty results: {}", self.empty_results)?;
        writeln!(f, "Failures: {}", self.failures)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate() * 100.0)?;
        writeln!(
            f,
            "Draft updates: {} ({} failed, {} fallbacks)",
            self.draft_updates, self.draft_update_failures, self.draft_fallbacks
        )?;
        writeln!(f, "Final send failures: {}", self.final_send_failures)?;
        writeln!(f, "Invalid updates: {}", self.invalid_updates)?;
        Ok(())
    }
}

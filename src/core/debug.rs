//! Debug and statistics module

use std::collections::VecDeque;
use std::time::Duration;

use crate::preload::{SweepKind, SweepReport};

/// Log level for per-resource detail lines
pub(crate) fn detail_level(verbose: bool) -> log::Level {
    if verbose {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

/// Sweep statistics tracker
#[derive(Debug)]
pub struct PreloadStats {
    /// Sweep duration history for averaging
    durations: VecDeque<Duration>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Completed load sweeps
    load_sweeps: u64,
    /// Completed unload sweeps
    unload_sweeps: u64,
    /// Images requested by load sweeps
    requested: u64,
    /// Requests that ended in a failed asset
    failed: u64,
    /// Images released by unload sweeps
    released: u64,
    /// Unloads skipped because the image was protected or absent
    skipped: u64,
    /// Average sweep duration in milliseconds
    avg_sweep_ms: f32,
    /// Longest sweep duration in milliseconds
    max_sweep_ms: f32,
}

impl PreloadStats {
    /// Create a new stats tracker
    pub fn new() -> Self {
        Self {
            durations: VecDeque::with_capacity(32),
            max_samples: 32,
            load_sweeps: 0,
            unload_sweeps: 0,
            requested: 0,
            failed: 0,
            released: 0,
            skipped: 0,
            avg_sweep_ms: 0.0,
            max_sweep_ms: 0.0,
        }
    }

    /// Record a finished sweep
    pub fn record_sweep(&mut self, report: &SweepReport) {
        match report.kind {
            SweepKind::Load => {
                self.load_sweeps += 1;
                self.requested += report.total as u64;
                self.failed += report.failed as u64;
            }
            SweepKind::Unload => {
                self.unload_sweeps += 1;
                self.released += report.succeeded as u64;
                self.skipped += report.skipped as u64;
            }
        }

        if self.durations.len() >= self.max_samples {
            self.durations.pop_front();
        }
        self.durations.push_back(report.elapsed);
        self.update_durations();
    }

    fn update_durations(&mut self) {
        if self.durations.is_empty() {
            return;
        }

        let total: Duration = self.durations.iter().sum();
        let max = self.durations.iter().max().copied().unwrap_or_default();

        self.avg_sweep_ms = total.as_secs_f32() * 1000.0 / self.durations.len() as f32;
        self.max_sweep_ms = max.as_secs_f32() * 1000.0;
    }

    /// Completed sweeps of either kind
    pub fn sweeps(&self) -> u64 {
        self.load_sweeps + self.unload_sweeps
    }

    /// Images requested by load sweeps
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Requests that ended in a failed asset
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Images released by unload sweeps
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Unloads skipped because the image was protected or absent
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Average sweep duration in milliseconds
    pub fn avg_sweep_ms(&self) -> f32 {
        self.avg_sweep_ms
    }

    /// Get a formatted stats string
    pub fn format_stats(&self) -> String {
        format!(
            "Sweeps: {} load / {} unload | Images: {} requested, {} failed, {} released | Sweep: {:.2}ms (max: {:.2})",
            self.load_sweeps,
            self.unload_sweeps,
            self.requested,
            self.failed,
            self.released,
            self.avg_sweep_ms,
            self.max_sweep_ms
        )
    }
}

impl Default for PreloadStats {
    fn default() -> Self {
        Self::new()
    }
}

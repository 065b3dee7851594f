//! Periodic throughput and engine-statistics reporting.
//!
//! Advisory instrumentation only: a reporter counts completions on the
//! coordinating thread and prints a throughput line every
//! `progress_interval` items, plus an engine stats dump every
//! `stats_interval` items. Progress goes to stdout so the error stream stays
//! clean for diagnostics; a failing stats call is downgraded to a warning and
//! never interrupts the run.

use std::time::Instant;

use crate::engine::EngineGateway;
use crate::pipeline::PipelineConfig;

/// Per-phase completion counter with interval reporting.
///
/// Mutated only by the single thread draining completed tasks, so no
/// cross-task synchronization is needed.
#[derive(Debug)]
pub struct ProgressReporter {
    label: &'static str,
    progress_interval: u64,
    stats_interval: u64,
    count: u64,
    last_mark: Instant,
}

impl ProgressReporter {
    /// Creates a reporter for one phase; `label` names the unit of work in
    /// the printed lines ("adds", "redo records", "entities").
    #[must_use]
    pub fn new(label: &'static str, config: &PipelineConfig) -> Self {
        Self {
            label,
            progress_interval: config.progress_interval.max(1),
            stats_interval: config.stats_interval.max(1),
            count: 0,
            last_mark: Instant::now(),
        }
    }

    /// Items counted so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Records one processed item, emitting interval reports when due.
    pub fn tick(&mut self, gateway: &dyn EngineGateway) {
        self.count += 1;

        if self.count % self.progress_interval == 0 {
            let elapsed = self.last_mark.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 {
                (self.progress_interval as f64 / elapsed) as u64
            } else {
                0
            };
            println!(
                "Processed {} {}, {speed} records per second",
                self.count, self.label
            );
            self.last_mark = Instant::now();
        }

        if self.count % self.stats_interval == 0 {
            match gateway.stats() {
                Ok(stats) => println!("\n{}\n", String::from_utf8_lossy(&stats)),
                Err(err) => log::warn!("engine stats unavailable: {err}"),
            }
        }
    }

    /// Prints the phase total.
    pub fn finish(&self) {
        println!("Processed total of {} {}", self.count, self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    fn config(progress: u64, stats: u64) -> PipelineConfig {
        PipelineConfig {
            progress_interval: progress,
            stats_interval: stats,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn counts_every_tick() {
        let engine = MemoryEngine::new();
        let mut progress = ProgressReporter::new("adds", &config(1000, 10_000));
        for _ in 0..7 {
            progress.tick(&engine);
        }
        assert_eq!(progress.count(), 7);
    }

    #[test]
    fn zero_intervals_are_clamped() {
        // A zero interval must not panic on the modulo.
        let engine = MemoryEngine::new();
        let mut progress = ProgressReporter::new("adds", &config(0, 0));
        progress.tick(&engine);
        assert_eq!(progress.count(), 1);
    }
}

//! Fixed-interval scheduler
//!
//! The Scheduler is responsible for:
//! - Running one cycle immediately at startup
//! - Running one cycle per interval afterwards
//! - Containing failures: a failed cycle is logged and the loop goes on
//! - Stopping when the shutdown future resolves
//!
//! ## Timing
//!
//! Cycles never overlap. A cycle runs to completion inside the loop body, and
//! missed ticks are delayed rather than bunched up, so a slow cycle pushes the
//! next one back instead of running concurrently with it.
//!
//! Shutdown ends the wait between ticks. A cycle that is already in flight is
//! allowed to finish.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::reconciler::{CycleResult, Reconciler};

/// Shortest accepted interval; `tokio::time::interval` rejects zero
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Report emitted after every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle counter
    pub cycle: u64,
    /// When the cycle started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// How long the cycle took
    pub elapsed: Duration,
    /// The cycle outcome
    pub result: CycleResult,
}

/// Totals over the lifetime of a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub unchanged: u64,
    pub updated: u64,
    pub failed: u64,
}

impl RunSummary {
    fn record(&mut self, result: &CycleResult) {
        self.cycles += 1;
        match result {
            CycleResult::NoChangeNeeded { .. } => self.unchanged += 1,
            CycleResult::Updated { .. } => self.updated += 1,
            CycleResult::Failed { .. } => self.failed += 1,
        }
    }
}

/// Drives a [`Reconciler`] at a fixed interval
pub struct Scheduler {
    /// Time between cycle starts
    interval: Duration,

    /// Optional sink for cycle reports
    report_tx: Option<mpsc::Sender<CycleReport>>,
}

impl Scheduler {
    /// Create a scheduler without a report channel
    ///
    /// A zero `interval` is raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            report_tx: None,
        }
    }

    /// Create a scheduler that publishes a [`CycleReport`] after each cycle
    ///
    /// The channel is bounded; when it is full, reports are dropped (with a
    /// warning) rather than stalling the loop.
    pub fn with_reports(interval: Duration, capacity: usize) -> (Self, mpsc::Receiver<CycleReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                interval: interval.max(MIN_INTERVAL),
                report_tx: Some(tx),
            },
            rx,
        )
    }

    /// The configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// # Returns
    ///
    /// Totals for all cycles that ran
    pub async fn run<F>(&self, reconciler: &Reconciler, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        tokio::pin!(shutdown);

        info!(
            "Scheduler started for {}, running checks every {:?}",
            reconciler.record_name(),
            self.interval
        );

        let mut summary = RunSummary::default();

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(_) = ticks.next() => {
                    let report = self.run_cycle(reconciler, summary.cycles + 1).await;
                    summary.record(&report.result);
                    self.emit_report(report);
                }
            }
        }

        info!(
            "Scheduler stopped after {} cycle(s): {} unchanged, {} updated, {} failed",
            summary.cycles, summary.unchanged, summary.updated, summary.failed
        );
        summary
    }

    /// Run exactly one cycle and report it
    pub async fn run_once(&self, reconciler: &Reconciler) -> CycleResult {
        let report = self.run_cycle(reconciler, 1).await;
        let result = report.result.clone();
        self.emit_report(report);
        result
    }

    async fn run_cycle(&self, reconciler: &Reconciler, cycle: u64) -> CycleReport {
        let started_at = chrono::Utc::now();
        let start = tokio::time::Instant::now();

        let result = reconciler.run_cycle().await;
        let elapsed = start.elapsed();

        if let CycleResult::Failed { step, error } = &result {
            warn!(
                "Cycle {} failed during {} ({}); will try again in {:?}",
                cycle, step, error, self.interval
            );
        } else {
            debug!("Cycle {} finished in {:?}", cycle, elapsed);
        }

        CycleReport {
            cycle,
            started_at,
            elapsed,
            result,
        }
    }

    fn emit_report(&self, report: CycleReport) {
        let Some(tx) = &self.report_tx else {
            return;
        };

        match tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Report channel full, dropping cycle report");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Report receiver dropped, discarding cycle report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reconciler::CycleStep;

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(&CycleResult::NoChangeNeeded {
            ip: "203.0.113.45".to_string(),
        });
        summary.record(&CycleResult::Failed {
            step: CycleStep::ResolveIp,
            error: Error::network("timeout"),
        });
        summary.record(&CycleResult::Updated {
            old_ip: "203.0.113.45".to_string(),
            new_ip: "203.0.113.99".to_string(),
        });

        assert_eq!(
            summary,
            RunSummary {
                cycles: 3,
                unchanged: 1,
                updated: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        assert_eq!(Scheduler::new(Duration::ZERO).interval(), MIN_INTERVAL);
        let (scheduler, _rx) = Scheduler::with_reports(Duration::ZERO, 1);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
    }

    #[test]
    fn test_with_reports_keeps_interval() {
        let (scheduler, _rx) = Scheduler::with_reports(Duration::from_secs(60), 0);
        assert_eq!(scheduler.interval(), Duration::from_secs(60));
    }
}

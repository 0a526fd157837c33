//! Cycle scheduling with single-flight guarantee.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::transport::Transport;

use super::engine::DlmEngine;
use super::types::CycleSummary;

/// Periodic driver for the DLM engine.
///
/// At most one cycle is ever in flight: the loop awaits each cycle to
/// completion before the next tick can fire, and ticks that arrive while a
/// cycle is still running are skipped, never queued or run concurrently.
/// Overlapping cycles would double-count session state, so the
/// guarantee is structural rather than best-effort.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    cycle_budget: Duration,
}

impl Scheduler {
    /// Creates a scheduler firing every `interval` with a per-cycle budget.
    ///
    /// # Panics
    ///
    /// Panics if either duration is zero.
    pub fn new(interval: Duration, cycle_budget: Duration) -> Self {
        assert!(!interval.is_zero(), "interval must be > 0");
        assert!(!cycle_budget.is_zero(), "cycle budget must be > 0");
        Self {
            interval,
            cycle_budget,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drives the engine for `max_cycles` cycles, or indefinitely when
    /// `None`. The first cycle runs immediately.
    ///
    /// `pre_cycle` runs before every cycle; it is where simulated device
    /// state advances when the site runs against the simulator.
    ///
    /// A cycle exceeding the budget is abandoned (remaining commands are
    /// skipped, already-issued commands stand) and the next tick proceeds
    /// normally. Summaries are collected only for bounded runs; an unbounded
    /// run reports through logs alone.
    pub async fn run<T, F>(
        &self,
        engine: &mut DlmEngine<T>,
        max_cycles: Option<u64>,
        mut pre_cycle: F,
    ) -> Vec<CycleSummary>
    where
        T: Transport,
        F: FnMut(),
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summaries = Vec::new();
        let mut completed: u64 = 0;

        loop {
            if let Some(max) = max_cycles {
                if completed >= max {
                    break;
                }
            }
            interval.tick().await;
            pre_cycle();

            let summary = match tokio::time::timeout(self.cycle_budget, engine.run_cycle()).await
            {
                Ok(summary) => summary,
                Err(_) => {
                    warn!(
                        cycle = engine.cycles(),
                        budget_ms = self.cycle_budget.as_millis() as u64,
                        "cycle exceeded budget, abandoned"
                    );
                    CycleSummary::aborted(
                        engine.cycles(),
                        engine.settings().ceiling_kw,
                        "cycle budget exceeded",
                    )
                }
            };

            completed += 1;
            if max_cycles.is_some() {
                summaries.push(summary);
            }
        }
        summaries
    }
}

//! Time-driven transitions.
//!
//! One tick readies meetings about to start, ends meetings that have
//! overrun their grace period, and closes polls whose window has passed.
//! Each pass is independent: a failure is logged and the next pass still
//! runs. Ticks are serial, so a slow tick delays the next one instead of
//! overlapping it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use chama_governance::{announce_result, PollEngine, RoleEscalationCoordinator};
use chama_groups::NotificationSink;
use chama_meetings::MeetingOrchestrator;
use chama_store::LedgerStore;
use chama_types::Clock;

use crate::metrics::NodeMetrics;

/// What a single tick changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub meetings_readied: usize,
    pub meetings_ended: usize,
    pub polls_closed: usize,
    pub failed_passes: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.meetings_readied == 0 && self.meetings_ended == 0 && self.polls_closed == 0
    }
}

pub struct TimeScheduler<S: LedgerStore> {
    meetings: Arc<MeetingOrchestrator<S>>,
    polls: Arc<PollEngine<S>>,
    escalations: Arc<RoleEscalationCoordinator<S>>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    interval: Duration,
}

impl<S: LedgerStore> TimeScheduler<S> {
    pub fn new(
        meetings: Arc<MeetingOrchestrator<S>>,
        polls: Arc<PollEngine<S>>,
        escalations: Arc<RoleEscalationCoordinator<S>>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            meetings,
            polls,
            escalations,
            notifier,
            clock,
            metrics,
            interval,
        }
    }

    /// Run every pass once against the current time.
    pub async fn tick(&self) -> TickReport {
        let timer = self.metrics.scheduler_tick_seconds.start_timer();
        let now = self.clock.now();
        let mut report = TickReport::default();

        match self.meetings.advance_ready(now).await {
            Ok(readied) => report.meetings_readied = readied.len(),
            Err(e) => {
                warn!(error = %e, "ready pass failed");
                report.failed_passes += 1;
            }
        }

        match self.meetings.end_overrunning(now).await {
            Ok(ended) => {
                report.meetings_ended = ended.len();
                self.metrics.meetings_ended.inc_by(ended.len() as u64);
            }
            Err(e) => {
                warn!(error = %e, "overrun pass failed");
                report.failed_passes += 1;
            }
        }

        match self.polls.close_overdue(now) {
            Ok(declared) => {
                report.polls_closed = declared.len();
                for event in &declared {
                    self.metrics.record_declared(event, &self.escalations);
                    announce_result(self.notifier.as_ref(), event).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "poll close pass failed");
                report.failed_passes += 1;
            }
        }

        self.metrics.scheduler_ticks.inc();
        if report.failed_passes > 0 {
            self.metrics.scheduler_tick_errors.inc();
        }
        timer.observe_duration();

        if report.is_idle() {
            debug!(at = %now, "scheduler tick idle");
        } else {
            info!(
                at = %now,
                readied = report.meetings_readied,
                ended = report.meetings_ended,
                polls_closed = report.polls_closed,
                "scheduler tick"
            );
        }
        report
    }

    /// Tick every interval until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

//! Prometheus metrics for the node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; [`NodeMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    exponential_buckets, register_histogram_with_registry, register_int_counter_with_registry,
    Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

use chama_governance::{ResultDeclared, RoleEscalationCoordinator, APPROVE};
use chama_store::LedgerStore;
use chama_types::{PollKind, PollResult};
use tracing::warn;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Governance ──────────────────────────────────────────────────────
    pub votes_cast: IntCounter,
    pub polls_sealed: IntCounter,
    /// Escalations that moved a member into the requested role.
    pub role_changes: IntCounter,

    // ── Shares ──────────────────────────────────────────────────────────
    pub share_purchases: IntCounter,
    pub share_transfers: IntCounter,

    // ── Meetings ────────────────────────────────────────────────────────
    pub meetings_started: IntCounter,
    pub meetings_ended: IntCounter,

    // ── Scheduler ───────────────────────────────────────────────────────
    pub scheduler_ticks: IntCounter,
    /// Ticks in which at least one pass failed.
    pub scheduler_tick_errors: IntCounter,
    pub scheduler_tick_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let votes_cast = counter(&registry, "chama_votes_cast_total", "Ballots recorded")?;
        let polls_sealed = counter(
            &registry,
            "chama_polls_sealed_total",
            "Polls whose result has been declared",
        )?;
        let role_changes = counter(
            &registry,
            "chama_role_changes_total",
            "Roles assigned through approved escalation polls",
        )?;
        let share_purchases = counter(
            &registry,
            "chama_share_purchases_total",
            "Share purchases from offerings",
        )?;
        let share_transfers = counter(
            &registry,
            "chama_share_transfers_total",
            "Member-to-member share transfers",
        )?;
        let meetings_started = counter(&registry, "chama_meetings_started_total", "Meetings started")?;
        let meetings_ended = counter(
            &registry,
            "chama_meetings_ended_total",
            "Meetings ended, by a host or by the scheduler",
        )?;
        let scheduler_ticks = counter(&registry, "chama_scheduler_ticks_total", "Scheduler ticks run")?;
        let scheduler_tick_errors = counter(
            &registry,
            "chama_scheduler_tick_errors_total",
            "Scheduler ticks with at least one failed pass",
        )?;

        let scheduler_tick_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "chama_scheduler_tick_seconds",
                "Wall time of one scheduler tick"
            )
            .buckets(exponential_buckets(0.001, 4.0, 8)?),
            registry
        )?;

        Ok(Self {
            registry,
            votes_cast,
            polls_sealed,
            role_changes,
            share_purchases,
            share_transfers,
            meetings_started,
            meetings_ended,
            scheduler_ticks,
            scheduler_tick_errors,
            scheduler_tick_seconds,
        })
    }

    /// Count a declared poll result and, for an approved escalation, the
    /// role change it applied. An approval for a candidate who has left the
    /// group changes no role and is not counted.
    pub fn record_declared<S: LedgerStore>(
        &self,
        event: &ResultDeclared,
        escalations: &RoleEscalationCoordinator<S>,
    ) {
        self.polls_sealed.inc();
        if !approves_escalation(event) {
            return;
        }
        match escalations.role_change_applied(&event.poll) {
            Ok(true) => self.role_changes.inc(),
            Ok(false) => {}
            Err(e) => warn!(poll = %event.poll, error = %e, "could not read escalation outcome"),
        }
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn approves_escalation(event: &ResultDeclared) -> bool {
    event.kind == PollKind::RoleEscalation
        && event.result == PollResult::Passed
        && event.winning_option == Some(APPROVE)
}

//! The node composition root.
//!
//! [`ChamaNode`] wires the storage backend, the external collaborators and
//! every engine together, counts the interesting operations in
//! [`NodeMetrics`], and owns the background scheduler task.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use chama_governance::{
    announce_result, PollEngine, ResultDeclared, RoleEscalationCoordinator, VoteOutcome,
};
use chama_groups::{GroupAdmin, LogNotifier, MembershipDirectory, NotificationSink, WebhookNotifier};
use chama_ledger::WalletLedger;
use chama_meetings::{CalendarMirror, ConferencingClient, LiveKitClient, MeetingOrchestrator};
use chama_shares::{SharePurchase, ShareTransfer, SharesEngine};
use chama_store::{LedgerStore, MeetingRecord, ShareHoldingRecord, TransactionRecord};
use chama_store_sqlite::{IntegrityReport, SqliteStore};
use chama_types::{Clock, CoreError, Deadline, MeetingId, PollId, SystemClock, UserId};

use crate::config::ChamaConfig;
use crate::lifecycle::{stop_signal, BackgroundTasks};
use crate::metrics::NodeMetrics;
use crate::scheduler::{TickReport, TimeScheduler};
use crate::NodeError;

/// How long a background loop gets to finish its current tick on stop.
const STOP_GRACE: Duration = Duration::from_secs(30);

/// The node's view of the outside world.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub conferencing: Arc<dyn ConferencingClient>,
    pub notifier: Arc<dyn NotificationSink>,
    pub calendar: Option<Arc<dyn CalendarMirror>>,
}

impl Collaborators {
    /// Wall clock, LiveKit, and a webhook or log notifier, as configured.
    pub fn from_config(config: &ChamaConfig) -> Result<Self, NodeError> {
        let conferencing = Arc::new(LiveKitClient::new(config.livekit()?));
        let notifier: Arc<dyn NotificationSink> = match &config.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::with_timeout(
                url.clone(),
                Duration::from_secs(config.notifications.timeout_secs),
            )),
            None => Arc::new(LogNotifier),
        };
        Ok(Self {
            clock: Arc::new(SystemClock),
            conferencing,
            notifier,
            calendar: None,
        })
    }
}

pub struct ChamaNode<S: LedgerStore> {
    config: ChamaConfig,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<NodeMetrics>,
    tasks: BackgroundTasks,

    directory: MembershipDirectory<S>,
    admin: GroupAdmin<S>,
    wallets: WalletLedger<S>,
    polls: Arc<PollEngine<S>>,
    escalations: Arc<RoleEscalationCoordinator<S>>,
    shares: SharesEngine<S>,
    meetings: Arc<MeetingOrchestrator<S>>,
}

impl ChamaNode<SqliteStore> {
    /// Open the configured SQLite database and wire production collaborators.
    pub fn open(config: ChamaConfig) -> Result<Self, NodeError> {
        config.validate()?;
        if let Some(parent) = config.store.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Arc::new(SqliteStore::open(&config.store.path)?);
        let collaborators = Collaborators::from_config(&config)?;
        Self::new(config, store, collaborators)
    }

    /// Verify the ledger invariants over the whole database.
    pub fn check_integrity(&self) -> Result<IntegrityReport, NodeError> {
        Ok(self.store.check_integrity()?)
    }
}

/// Verify the configured database without wiring any collaborators.
pub fn check_database(config: &ChamaConfig) -> Result<IntegrityReport, NodeError> {
    let path = &config.store.path;
    if !path.exists() {
        return Err(NodeError::Config(format!("no database at {}", path.display())));
    }
    let store = SqliteStore::open(path)?;
    Ok(store.check_integrity()?)
}

impl<S: LedgerStore> ChamaNode<S> {
    pub fn new(config: ChamaConfig, store: Arc<S>, collaborators: Collaborators) -> Result<Self, NodeError> {
        config.validate()?;
        let Collaborators {
            clock,
            conferencing,
            notifier,
            calendar,
        } = collaborators;
        let currency = config.currency()?;
        let poll_settings = config.poll_settings()?;

        let escalations = Arc::new(RoleEscalationCoordinator::new(
            store.clone(),
            clock.clone(),
            poll_settings,
        ));
        let polls = Arc::new(
            PollEngine::new(store.clone(), clock.clone(), poll_settings).subscribe(escalations.clone()),
        );
        let mut meetings = MeetingOrchestrator::new(
            store.clone(),
            clock.clone(),
            conferencing,
            notifier.clone(),
            config.meeting_settings(),
        );
        if let Some(calendar) = calendar {
            meetings = meetings.with_calendar(calendar);
        }

        Ok(Self {
            directory: MembershipDirectory::new(store.clone()),
            admin: GroupAdmin::new(store.clone(), clock.clone()),
            wallets: WalletLedger::new(store.clone(), clock.clone(), currency.clone()),
            shares: SharesEngine::new(store.clone(), clock.clone(), currency),
            meetings: Arc::new(meetings),
            polls,
            escalations,
            metrics: Arc::new(NodeMetrics::new()?),
            tasks: BackgroundTasks::new(),
            config,
            store,
            clock,
            notifier,
        })
    }

    pub fn config(&self) -> &ChamaConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn directory(&self) -> &MembershipDirectory<S> {
        &self.directory
    }

    pub fn admin(&self) -> &GroupAdmin<S> {
        &self.admin
    }

    pub fn wallets(&self) -> &WalletLedger<S> {
        &self.wallets
    }

    pub fn polls(&self) -> &PollEngine<S> {
        &self.polls
    }

    pub fn escalations(&self) -> &RoleEscalationCoordinator<S> {
        &self.escalations
    }

    pub fn shares(&self) -> &SharesEngine<S> {
        &self.shares
    }

    pub fn meetings(&self) -> &MeetingOrchestrator<S> {
        &self.meetings
    }

    /// A fresh per-request deadline.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.request_timeout())
    }

    // ── Instrumented operations ─────────────────────────────────────────

    /// Cast a vote and announce the result if this ballot decided the poll.
    pub async fn cast_vote(&self, poll: &PollId, voter: &UserId, ordinal: u32) -> Result<VoteOutcome, CoreError> {
        let outcome = self.polls.cast_vote(poll, voter, ordinal, &self.deadline())?;
        self.metrics.votes_cast.inc();
        if let Some(event) = &outcome.declared {
            self.declared(event).await;
        }
        Ok(outcome)
    }

    /// Close a poll whose window has passed and announce the result.
    pub async fn close_poll(&self, poll: &PollId) -> Result<ResultDeclared, CoreError> {
        let event = self.polls.close_poll(poll, &self.deadline())?;
        self.declared(&event).await;
        Ok(event)
    }

    async fn declared(&self, event: &ResultDeclared) {
        self.metrics.record_declared(event, &self.escalations);
        announce_result(self.notifier.as_ref(), event).await;
    }

    pub fn buy_shares(
        &self,
        buyer: &UserId,
        purchase: SharePurchase,
    ) -> Result<(ShareHoldingRecord, TransactionRecord), CoreError> {
        let bought = self.shares.buy_shares(buyer, purchase, &self.deadline())?;
        self.metrics.share_purchases.inc();
        Ok(bought)
    }

    pub fn transfer_shares(
        &self,
        seller: &UserId,
        transfer: ShareTransfer,
    ) -> Result<(ShareHoldingRecord, TransactionRecord), CoreError> {
        let moved = self.shares.transfer_shares(seller, transfer, &self.deadline())?;
        self.metrics.share_transfers.inc();
        Ok(moved)
    }

    pub async fn start_meeting(&self, meeting: &MeetingId, user: &UserId) -> Result<MeetingRecord, CoreError> {
        let change = self.meetings.start_meeting(meeting, user, &self.deadline()).await?;
        if change.changed {
            self.metrics.meetings_started.inc();
        }
        Ok(change.meeting)
    }

    pub async fn end_meeting(&self, meeting: &MeetingId, user: &UserId) -> Result<MeetingRecord, CoreError> {
        let change = self.meetings.end_meeting(meeting, user, &self.deadline()).await?;
        if change.changed {
            self.metrics.meetings_ended.inc();
        }
        Ok(change.meeting)
    }

    // ── Background work ─────────────────────────────────────────────────

    fn scheduler(&self) -> TimeScheduler<S> {
        TimeScheduler::new(
            self.meetings.clone(),
            self.polls.clone(),
            self.escalations.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            self.metrics.clone(),
            self.config.tick_interval(),
        )
    }

    /// Run one scheduler tick inline.
    pub async fn tick(&self) -> TickReport {
        self.scheduler().tick().await
    }

    /// Spawn the scheduler loop.
    pub fn start(&mut self) {
        let scheduler = self.scheduler();
        self.tasks.spawn("scheduler", |stop| scheduler.run(stop));
        info!(tasks = self.tasks.len(), "chama node started");
    }

    /// Signal every background task and wait for them to return.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        let stopped = self.tasks.stop(STOP_GRACE).await;
        info!("chama node stopped");
        stopped
    }

    /// Start, run until SIGINT or SIGTERM, then stop.
    pub async fn run_until_signal(&mut self) -> Result<(), NodeError> {
        self.start();
        stop_signal().await;
        self.stop().await
    }
}

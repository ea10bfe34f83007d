//! Nullable store: an in-memory [`LedgerStore`] for testing.
//!
//! A transaction runs against a private copy of every table. The copy replaces
//! the shared state when the closure returns `Ok` and is dropped otherwise, so
//! rollback is exact. Key and uniqueness constraints mirror the relational
//! schema so engine tests see the same failures they would in production.

use crate::lock;
use chama_store::{
    AttendanceRecord, DividendDeclarationRecord, GroupRecord, LedgerStore, LedgerTxn,
    MeetingRecord, MeetingStore, MembershipRecord, MembershipStore, PollOptionRecord, PollRecord,
    PollStore, RetryPolicy, RoleChangeRecord, RoleEscalationRecord, ShareHoldingRecord,
    ShareOfferingRecord, ShareStore, ShareTransactionRecord, StoreError, TransactionLog,
    TransactionRecord, UserRecord, VoteRecord, WalletRecord, WalletStore,
};
use chama_types::{
    Amount, DividendId, DividendStatus, EscalationId, EscalationStatus, GroupId, HoldingId,
    MeetingId, MeetingStatus, OfferingId, OfferingStatus, PollId, PollStatus, Role, Timestamp,
    TransactionId, UserId, VoterHash, WalletId, WalletOwner,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    memberships: Vec<MembershipRecord>,
    role_changes: Vec<RoleChangeRecord>,
    wallets: Vec<WalletRecord>,
    transactions: Vec<TransactionRecord>,
    polls: Vec<PollRecord>,
    options: Vec<PollOptionRecord>,
    votes: Vec<VoteRecord>,
    escalations: Vec<RoleEscalationRecord>,
    offerings: Vec<ShareOfferingRecord>,
    holdings: Vec<ShareHoldingRecord>,
    share_txs: Vec<ShareTransactionRecord>,
    dividends: Vec<DividendDeclarationRecord>,
    meetings: Vec<MeetingRecord>,
    attendance: Vec<AttendanceRecord>,
}

/// An in-memory ledger store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pending_conflicts: AtomicUsize,
    retry: RetryPolicy,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            pending_conflicts: AtomicUsize::new(0),
            retry: RetryPolicy::new(3, 1, 4, 0.0),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Make the next `n` transactions fail with a serialization conflict
    /// before running their closure.
    pub fn inject_conflicts(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        if self.take_conflict() {
            return Err(StoreError::Conflict("injected conflict".into()).into());
        }
        // Holding the lock for the whole closure serializes transactions.
        let mut shared = lock(&self.tables);
        let mut working = shared.clone();
        let value = f(&mut MemoryTxn {
            tables: &mut working,
        })?;
        *shared = working;
        Ok(value)
    }

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut snapshot = lock(&self.tables).clone();
        f(&mut MemoryTxn {
            tables: &mut snapshot,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }
}

/// Handle over a private copy of the tables.
pub struct MemoryTxn<'a> {
    tables: &'a mut Tables,
}

fn find<'t, R>(
    rows: &'t [R],
    entity: &'static str,
    id: impl ToString,
    pred: impl Fn(&R) -> bool,
) -> Result<&'t R, StoreError> {
    rows.iter()
        .find(|r| pred(r))
        .ok_or_else(|| StoreError::not_found(entity, id.to_string()))
}

fn find_mut<'t, R>(
    rows: &'t mut [R],
    entity: &'static str,
    id: impl ToString,
    pred: impl Fn(&R) -> bool,
) -> Result<&'t mut R, StoreError> {
    rows.iter_mut()
        .find(|r| pred(r))
        .ok_or_else(|| StoreError::not_found(entity, id.to_string()))
}

fn sorted_by_key<R: Clone, K: Ord>(rows: impl Iterator<Item = R>, key: impl Fn(&R) -> K) -> Vec<R> {
    let mut out: Vec<R> = rows.collect();
    out.sort_by_key(|r| key(r));
    out
}

impl MemoryTxn<'_> {
    fn require_group(&self, group: &GroupId) -> Result<(), StoreError> {
        if self.tables.groups.iter().any(|g| g.id == *group) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("FOREIGN KEY: group {group}")))
        }
    }

    fn require_user(&self, user: &UserId) -> Result<(), StoreError> {
        if self.tables.users.iter().any(|u| u.id == *user) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("FOREIGN KEY: user {user}")))
        }
    }

    /// At most one active holder per (group, singleton role).
    fn check_singleton(&self, group: &GroupId, user: &UserId, role: Role, active: bool) -> Result<(), StoreError> {
        if !active || !role.is_singleton() {
            return Ok(());
        }
        let taken = self
            .tables
            .memberships
            .iter()
            .any(|m| m.group == *group && m.user != *user && m.active && m.role == role);
        if taken {
            return Err(StoreError::Duplicate(format!("memberships.{group}.{role}")));
        }
        Ok(())
    }
}

impl MembershipStore for MemoryTxn<'_> {
    fn insert_user(&mut self, user: &UserRecord) -> Result<(), StoreError> {
        for existing in &self.tables.users {
            if existing.id == user.id {
                return Err(StoreError::Duplicate(format!("users.id {}", user.id)));
            }
            if user.email.is_some() && existing.email == user.email {
                return Err(StoreError::Duplicate("users.email".into()));
            }
            if user.phone.is_some() && existing.phone == user.phone {
                return Err(StoreError::Duplicate("users.phone".into()));
            }
        }
        self.tables.users.push(user.clone());
        Ok(())
    }

    fn get_user(&mut self, id: &UserId) -> Result<UserRecord, StoreError> {
        find(&self.tables.users, "user", id, |u| u.id == *id).cloned()
    }

    fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .tables
            .users
            .iter()
            .find(|u| {
                (email.is_some() && u.email.as_deref() == email)
                    || (phone.is_some() && u.phone.as_deref() == phone)
            })
            .cloned())
    }

    fn insert_group(&mut self, group: &GroupRecord) -> Result<(), StoreError> {
        if self.tables.groups.iter().any(|g| g.id == group.id) {
            return Err(StoreError::Duplicate(format!("chamas.id {}", group.id)));
        }
        self.tables.groups.push(group.clone());
        Ok(())
    }

    fn get_group(&mut self, id: &GroupId) -> Result<GroupRecord, StoreError> {
        find(&self.tables.groups, "group", id, |g| g.id == *id).cloned()
    }

    fn get_membership(
        &mut self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        Ok(self
            .tables
            .memberships
            .iter()
            .find(|m| m.group == *group && m.user == *user)
            .cloned())
    }

    fn put_membership(&mut self, membership: &MembershipRecord) -> Result<(), StoreError> {
        self.require_group(&membership.group)?;
        self.require_user(&membership.user)?;
        self.check_singleton(&membership.group, &membership.user, membership.role, membership.active)?;
        let rows = &mut self.tables.memberships;
        match rows
            .iter_mut()
            .find(|m| m.group == membership.group && m.user == membership.user)
        {
            Some(row) => *row = membership.clone(),
            None => rows.push(membership.clone()),
        }
        Ok(())
    }

    fn list_memberships(
        &mut self,
        group: &GroupId,
        active_only: bool,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .memberships
                .iter()
                .filter(|m| m.group == *group && (m.active || !active_only))
                .cloned(),
            |m| (m.joined_at, m.user),
        ))
    }

    fn set_member_role(
        &mut self,
        group: &GroupId,
        user: &UserId,
        role: Role,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let active = self
            .tables
            .memberships
            .iter()
            .find(|m| m.group == *group && m.user == *user)
            .map(|m| m.active)
            .ok_or_else(|| StoreError::not_found("membership", format!("{group}/{user}")))?;
        self.check_singleton(group, user, role, active)?;
        let row = find_mut(&mut self.tables.memberships, "membership", format!("{group}/{user}"), |m| {
            m.group == *group && m.user == *user
        })?;
        row.role = role;
        row.updated_at = at;
        Ok(())
    }

    fn holders_of(&mut self, group: &GroupId, role: Role) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(self
            .tables
            .memberships
            .iter()
            .filter(|m| m.group == *group && m.role == role && m.active)
            .cloned()
            .collect())
    }

    fn append_role_change(&mut self, change: &RoleChangeRecord) -> Result<(), StoreError> {
        self.require_group(&change.group)?;
        self.tables.role_changes.push(change.clone());
        Ok(())
    }

    fn list_role_changes(&mut self, group: &GroupId) -> Result<Vec<RoleChangeRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.role_changes.iter().filter(|c| c.group == *group).cloned(),
            |c| c.at,
        ))
    }
}

impl WalletStore for MemoryTxn<'_> {
    fn insert_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        if self
            .tables
            .wallets
            .iter()
            .any(|w| w.id == wallet.id || w.owner == wallet.owner)
        {
            return Err(StoreError::Duplicate(format!("wallets.owner {:?}", wallet.owner)));
        }
        match &wallet.owner {
            WalletOwner::User(user) => self.require_user(user)?,
            WalletOwner::Group(group) => self.require_group(group)?,
        }
        self.tables.wallets.push(wallet.clone());
        Ok(())
    }

    fn get_wallet(&mut self, id: &WalletId) -> Result<WalletRecord, StoreError> {
        find(&self.tables.wallets, "wallet", id, |w| w.id == *id).cloned()
    }

    fn wallet_for_owner(&mut self, owner: &WalletOwner) -> Result<Option<WalletRecord>, StoreError> {
        Ok(self.tables.wallets.iter().find(|w| w.owner == *owner).cloned())
    }

    fn credit(&mut self, id: &WalletId, amount: Amount, at: Timestamp) -> Result<Amount, StoreError> {
        let wallet = find_mut(&mut self.tables.wallets, "wallet", id, |w| w.id == *id)?;
        wallet.balance = wallet.balance.checked_add(amount).ok_or_else(|| {
            StoreError::Constraint(format!("balance overflow crediting wallet {id}"))
        })?;
        wallet.updated_at = at;
        Ok(wallet.balance)
    }

    fn debit(&mut self, id: &WalletId, amount: Amount, at: Timestamp) -> Result<Amount, StoreError> {
        let wallet = find_mut(&mut self.tables.wallets, "wallet", id, |w| w.id == *id)?;
        let balance = wallet.balance;
        wallet.balance = balance
            .checked_sub(amount)
            .ok_or_else(|| StoreError::InsufficientFunds {
                wallet: id.to_string(),
                needed: amount.minor(),
                available: balance.minor(),
            })?;
        wallet.updated_at = at;
        Ok(wallet.balance)
    }

    fn list_wallets(&mut self) -> Result<Vec<WalletRecord>, StoreError> {
        Ok(sorted_by_key(self.tables.wallets.iter().cloned(), |w| (w.created_at, w.id)))
    }
}

impl TransactionLog for MemoryTxn<'_> {
    fn append_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError> {
        if self.tables.transactions.iter().any(|t| t.id == tx.id) {
            return Err(StoreError::Duplicate(format!("transactions.id {}", tx.id)));
        }
        self.tables.transactions.push(tx.clone());
        Ok(())
    }

    fn get_transaction(&mut self, id: &TransactionId) -> Result<TransactionRecord, StoreError> {
        find(&self.tables.transactions, "transaction", id, |t| t.id == *id).cloned()
    }

    fn transactions_for_wallet(&mut self, wallet: &WalletId) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .transactions
                .iter()
                .filter(|t| t.from_wallet == Some(*wallet) || t.to_wallet == Some(*wallet))
                .cloned(),
            |t| t.created_at,
        ))
    }

    fn transactions_for_group(&mut self, group: &GroupId) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .transactions
                .iter()
                .filter(|t| t.group == Some(*group))
                .cloned(),
            |t| t.created_at,
        ))
    }
}

impl PollStore for MemoryTxn<'_> {
    fn insert_poll(&mut self, poll: &PollRecord, options: &[PollOptionRecord]) -> Result<(), StoreError> {
        self.require_group(&poll.group)?;
        if self.tables.polls.iter().any(|p| p.id == poll.id) {
            return Err(StoreError::Duplicate(format!("polls.id {}", poll.id)));
        }
        self.tables.polls.push(poll.clone());
        self.tables.options.extend(options.iter().cloned());
        Ok(())
    }

    fn get_poll(&mut self, id: &PollId) -> Result<PollRecord, StoreError> {
        find(&self.tables.polls, "poll", id, |p| p.id == *id).cloned()
    }

    fn update_poll(&mut self, poll: &PollRecord) -> Result<(), StoreError> {
        let row = find_mut(&mut self.tables.polls, "poll", poll.id, |p| p.id == poll.id)?;
        row.status = poll.status;
        row.votes_cast_count = poll.votes_cast_count;
        row.result = poll.result;
        row.winning_option = poll.winning_option;
        row.result_declared_at = poll.result_declared_at;
        row.updated_at = poll.updated_at;
        Ok(())
    }

    fn get_options(&mut self, poll: &PollId) -> Result<Vec<PollOptionRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.options.iter().filter(|o| o.poll == *poll).cloned(),
            |o| o.ordinal,
        ))
    }

    fn increment_option(&mut self, poll: &PollId, ordinal: u32) -> Result<u32, StoreError> {
        let option = find_mut(
            &mut self.tables.options,
            "poll option",
            format!("{poll}#{ordinal}"),
            |o| o.poll == *poll && o.ordinal == ordinal,
        )?;
        option.vote_count += 1;
        Ok(option.vote_count)
    }

    fn insert_vote(&mut self, vote: &VoteRecord) -> Result<(), StoreError> {
        if !self
            .tables
            .options
            .iter()
            .any(|o| o.poll == vote.poll && o.ordinal == vote.option)
        {
            return Err(StoreError::Constraint(format!(
                "FOREIGN KEY: poll option {}#{}",
                vote.poll, vote.option
            )));
        }
        if vote.valid
            && self
                .tables
                .votes
                .iter()
                .any(|v| v.valid && v.poll == vote.poll && v.voter_hash == vote.voter_hash)
        {
            return Err(StoreError::Duplicate("votes.poll_id, votes.voter_hash".into()));
        }
        self.tables.votes.push(vote.clone());
        Ok(())
    }

    fn has_valid_vote(&mut self, poll: &PollId, voter: &VoterHash) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .votes
            .iter()
            .any(|v| v.valid && v.poll == *poll && v.voter_hash == *voter))
    }

    fn count_valid_votes(&mut self, poll: &PollId) -> Result<u32, StoreError> {
        let count = self
            .tables
            .votes
            .iter()
            .filter(|v| v.valid && v.poll == *poll)
            .count();
        u32::try_from(count).map_err(|_| StoreError::Corruption(format!("vote count {count}")))
    }

    fn list_polls(&mut self, group: &GroupId, status: Option<PollStatus>) -> Result<Vec<PollRecord>, StoreError> {
        // Newest first; later inserts win ties.
        let mut polls: Vec<PollRecord> = self
            .tables
            .polls
            .iter()
            .filter(|p| p.group == *group && status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        polls.reverse();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    fn overdue_polls(&mut self, now: Timestamp) -> Result<Vec<PollRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .polls
                .iter()
                .filter(|p| p.status == PollStatus::Active && p.end_at <= now)
                .cloned(),
            |p| p.end_at,
        ))
    }

    fn insert_escalation(&mut self, request: &RoleEscalationRecord) -> Result<(), StoreError> {
        if !self.tables.polls.iter().any(|p| p.id == request.poll) {
            return Err(StoreError::Constraint(format!("FOREIGN KEY: poll {}", request.poll)));
        }
        if self
            .tables
            .escalations
            .iter()
            .any(|e| e.id == request.id || e.poll == request.poll)
        {
            return Err(StoreError::Duplicate(format!("role_escalations.poll_id {}", request.poll)));
        }
        self.tables.escalations.push(request.clone());
        Ok(())
    }

    fn get_escalation(&mut self, id: &EscalationId) -> Result<RoleEscalationRecord, StoreError> {
        find(&self.tables.escalations, "role escalation request", id, |e| e.id == *id).cloned()
    }

    fn escalation_for_poll(&mut self, poll: &PollId) -> Result<Option<RoleEscalationRecord>, StoreError> {
        Ok(self.tables.escalations.iter().find(|e| e.poll == *poll).cloned())
    }

    fn set_escalation_status(
        &mut self,
        id: &EscalationId,
        status: EscalationStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let row = find_mut(&mut self.tables.escalations, "role escalation request", id, |e| e.id == *id)?;
        row.status = status;
        row.updated_at = at;
        Ok(())
    }

    fn open_escalations(
        &mut self,
        group: &GroupId,
        candidate: &UserId,
        role: Role,
    ) -> Result<Vec<RoleEscalationRecord>, StoreError> {
        Ok(self
            .tables
            .escalations
            .iter()
            .filter(|e| {
                e.group == *group
                    && e.candidate == *candidate
                    && e.requested_role == role
                    && e.status == EscalationStatus::Voting
            })
            .cloned()
            .collect())
    }
}

impl ShareStore for MemoryTxn<'_> {
    fn insert_offering(&mut self, offering: &ShareOfferingRecord) -> Result<(), StoreError> {
        self.require_group(&offering.group)?;
        if self.tables.offerings.iter().any(|o| o.id == offering.id) {
            return Err(StoreError::Duplicate(format!("share_offerings.id {}", offering.id)));
        }
        self.tables.offerings.push(offering.clone());
        Ok(())
    }

    fn get_offering(&mut self, id: &OfferingId) -> Result<ShareOfferingRecord, StoreError> {
        find(&self.tables.offerings, "share offering", id, |o| o.id == *id).cloned()
    }

    fn list_offerings(
        &mut self,
        group: &GroupId,
        status: Option<OfferingStatus>,
    ) -> Result<Vec<ShareOfferingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .offerings
                .iter()
                .filter(|o| o.group == *group && status.map_or(true, |s| o.status == s))
                .cloned(),
            |o| o.created_at,
        ))
    }

    fn take_offering_shares(
        &mut self,
        id: &OfferingId,
        quantity: u64,
        at: Timestamp,
    ) -> Result<ShareOfferingRecord, StoreError> {
        let offering = find_mut(&mut self.tables.offerings, "share offering", id, |o| o.id == *id)?;
        let remaining = offering
            .total_shares
            .checked_sub(quantity)
            .ok_or(StoreError::InsufficientShares {
                requested: quantity,
                available: offering.total_shares,
            })?;
        offering.total_shares = remaining;
        if remaining == 0 {
            offering.status = OfferingStatus::Exhausted;
        }
        offering.updated_at = at;
        Ok(offering.clone())
    }

    fn set_offering_status(&mut self, id: &OfferingId, status: OfferingStatus, at: Timestamp) -> Result<(), StoreError> {
        let offering = find_mut(&mut self.tables.offerings, "share offering", id, |o| o.id == *id)?;
        offering.status = status;
        offering.updated_at = at;
        Ok(())
    }

    fn insert_holding(&mut self, holding: &ShareHoldingRecord) -> Result<(), StoreError> {
        self.require_group(&holding.group)?;
        self.require_user(&holding.member)?;
        if !holding.is_consistent() {
            return Err(StoreError::Constraint("CHECK: total_value = shares_owned * share_value".into()));
        }
        if self.tables.holdings.iter().any(|h| h.id == holding.id) {
            return Err(StoreError::Duplicate(format!("share_holdings.id {}", holding.id)));
        }
        self.tables.holdings.push(holding.clone());
        Ok(())
    }

    fn get_holding(&mut self, id: &HoldingId) -> Result<ShareHoldingRecord, StoreError> {
        find(&self.tables.holdings, "share holding", id, |h| h.id == *id).cloned()
    }

    fn update_holding(&mut self, holding: &ShareHoldingRecord) -> Result<(), StoreError> {
        if !holding.is_consistent() {
            return Err(StoreError::Constraint("CHECK: total_value = shares_owned * share_value".into()));
        }
        let row = find_mut(&mut self.tables.holdings, "share holding", holding.id, |h| h.id == holding.id)?;
        row.shares_owned = holding.shares_owned;
        row.share_value = holding.share_value;
        row.total_value = holding.total_value;
        row.status = holding.status;
        row.updated_at = holding.updated_at;
        Ok(())
    }

    fn holdings_for_member(&mut self, group: &GroupId, member: &UserId) -> Result<Vec<ShareHoldingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .holdings
                .iter()
                .filter(|h| h.group == *group && h.member == *member)
                .cloned(),
            |h| h.purchase_date,
        ))
    }

    fn holdings_for_group(&mut self, group: &GroupId) -> Result<Vec<ShareHoldingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.holdings.iter().filter(|h| h.group == *group).cloned(),
            |h| h.purchase_date,
        ))
    }

    fn append_share_transaction(&mut self, tx: &ShareTransactionRecord) -> Result<(), StoreError> {
        self.require_group(&tx.group)?;
        self.tables.share_txs.push(tx.clone());
        Ok(())
    }

    fn share_transactions(&mut self, group: &GroupId) -> Result<Vec<ShareTransactionRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.share_txs.iter().filter(|t| t.group == *group).cloned(),
            |t| t.created_at,
        ))
    }

    fn insert_dividend(&mut self, dividend: &DividendDeclarationRecord) -> Result<(), StoreError> {
        self.require_group(&dividend.group)?;
        self.tables.dividends.push(dividend.clone());
        Ok(())
    }

    fn get_dividend(&mut self, id: &DividendId) -> Result<DividendDeclarationRecord, StoreError> {
        find(&self.tables.dividends, "dividend declaration", id, |d| d.id == *id).cloned()
    }

    fn set_dividend_status(&mut self, id: &DividendId, status: DividendStatus, at: Timestamp) -> Result<(), StoreError> {
        let row = find_mut(&mut self.tables.dividends, "dividend declaration", id, |d| d.id == *id)?;
        row.status = status;
        row.updated_at = at;
        Ok(())
    }

    fn list_dividends(&mut self, group: &GroupId) -> Result<Vec<DividendDeclarationRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.dividends.iter().filter(|d| d.group == *group).cloned(),
            |d| d.declaration_date,
        ))
    }
}

impl MeetingStore for MemoryTxn<'_> {
    fn insert_meeting(&mut self, meeting: &MeetingRecord) -> Result<(), StoreError> {
        self.require_group(&meeting.group)?;
        if self.tables.meetings.iter().any(|m| m.id == meeting.id) {
            return Err(StoreError::Duplicate(format!("meetings.id {}", meeting.id)));
        }
        self.tables.meetings.push(meeting.clone());
        Ok(())
    }

    fn get_meeting(&mut self, id: &MeetingId) -> Result<MeetingRecord, StoreError> {
        find(&self.tables.meetings, "meeting", id, |m| m.id == *id).cloned()
    }

    fn update_meeting(&mut self, meeting: &MeetingRecord) -> Result<(), StoreError> {
        let row = find_mut(&mut self.tables.meetings, "meeting", meeting.id, |m| m.id == meeting.id)?;
        row.conference_room_id = meeting.conference_room_id.clone();
        row.conference_room_name = meeting.conference_room_name.clone();
        row.status = meeting.status;
        row.started_at = meeting.started_at;
        row.ended_at = meeting.ended_at;
        row.updated_at = meeting.updated_at;
        Ok(())
    }

    fn list_meetings(&mut self, group: &GroupId, status: Option<MeetingStatus>) -> Result<Vec<MeetingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .meetings
                .iter()
                .filter(|m| m.group == *group && status.map_or(true, |s| m.status == s))
                .cloned(),
            |m| m.scheduled_at,
        ))
    }

    fn meetings_scheduled_between(
        &mut self,
        status: MeetingStatus,
        after: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .meetings
                .iter()
                .filter(|m| m.status == status && m.scheduled_at > after && m.scheduled_at <= until)
                .cloned(),
            |m| m.scheduled_at,
        ))
    }

    fn meetings_overrunning(&mut self, now: Timestamp, grace_secs: u64) -> Result<Vec<MeetingRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables
                .meetings
                .iter()
                .filter(|m| {
                    m.status == MeetingStatus::Active
                        && m.auto_end_at(grace_secs).is_some_and(|end| end <= now)
                })
                .cloned(),
            |m| m.started_at,
        ))
    }

    fn get_attendance(&mut self, meeting: &MeetingId, user: &UserId) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .tables
            .attendance
            .iter()
            .find(|a| a.meeting == *meeting && a.user == *user)
            .cloned())
    }

    fn put_attendance(&mut self, attendance: &AttendanceRecord) -> Result<(), StoreError> {
        if !self.tables.meetings.iter().any(|m| m.id == attendance.meeting) {
            return Err(StoreError::Constraint(format!("FOREIGN KEY: meeting {}", attendance.meeting)));
        }
        self.require_user(&attendance.user)?;
        let rows = &mut self.tables.attendance;
        match rows
            .iter_mut()
            .find(|a| a.meeting == attendance.meeting && a.user == attendance.user)
        {
            Some(row) => *row = attendance.clone(),
            None => rows.push(attendance.clone()),
        }
        Ok(())
    }

    fn list_attendance(&mut self, meeting: &MeetingId) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(sorted_by_key(
            self.tables.attendance.iter().filter(|a| a.meeting == *meeting).cloned(),
            |a| (a.created_at, a.user),
        ))
    }
}

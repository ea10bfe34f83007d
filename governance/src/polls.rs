//! Polls and anonymous ballots.

use std::sync::Arc;

use chama_crypto::voter_hash;
use chama_groups::{active_member_count, resolve_membership};
use chama_store::{LedgerStore, LedgerTxn, PollOptionRecord, PollRecord, VoteRecord};
use chama_types::time::DAY;
use chama_types::{
    Clock, CoreError, Deadline, GroupId, PollId, PollKind, PollResult, PollStatus, Role,
    Threshold, Timestamp, UserId,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::events::{ResultDeclared, ResultSubscriber};
use crate::tally::{Decision, TallyRule};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub default_threshold: Threshold,
    pub role_escalation_window_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            default_threshold: Threshold::HALF,
            role_escalation_window_secs: 7 * DAY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewPoll {
    pub group: GroupId,
    pub title: String,
    pub description: String,
    pub kind: PollKind,
    pub end_at: Timestamp,
    pub options: Vec<String>,
    pub anonymous: bool,
    pub requires_majority: bool,
    /// `None` uses the configured default.
    pub threshold: Option<Threshold>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub poll: PollRecord,
    /// Set when this vote decided the poll.
    pub declared: Option<ResultDeclared>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub ordinal: u32,
    pub text: String,
    pub votes: u32,
}

/// Per-option counts. Never carries voter identities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub poll: PollId,
    pub status: PollStatus,
    pub eligible_voter_count: u32,
    pub votes_cast: u32,
    pub options: Vec<OptionTally>,
    pub result: PollResult,
    pub winning_option: Option<u32>,
}

pub struct PollEngine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    subscribers: Vec<Arc<dyn ResultSubscriber>>,
}

impl<S: LedgerStore> PollEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: PollSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber for result declarations.
    pub fn subscribe(mut self, subscriber: Arc<dyn ResultSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Create a poll. Role-escalation polls are opened only through
    /// `RoleEscalationCoordinator::request_role_escalation`.
    pub fn create_poll(
        &self,
        creator: &UserId,
        new: NewPoll,
        deadline: &Deadline,
    ) -> Result<PollRecord, CoreError> {
        if new.kind == PollKind::RoleEscalation {
            return Err(CoreError::Validation(
                "role escalation polls are opened by an escalation request".into(),
            ));
        }
        let now = self.clock.now();
        let poll = self.store.with_transaction(|txn| {
            let poll = open_poll(txn, creator, &new, self.settings.default_threshold, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(poll)
        })?;
        info!(poll = %poll.id, group = %poll.group, eligible = poll.eligible_voter_count, "poll opened");
        Ok(poll)
    }

    /// Cast `voter`'s ballot for option `ordinal`.
    pub fn cast_vote(
        &self,
        poll_id: &PollId,
        voter: &UserId,
        ordinal: u32,
        deadline: &Deadline,
    ) -> Result<VoteOutcome, CoreError> {
        let now = self.clock.now();
        let outcome = self.store.with_transaction(|txn| {
            let mut poll = txn.get_poll(poll_id)?;
            if poll.is_sealed() || now >= poll.end_at {
                return Err(CoreError::PollSealed);
            }
            resolve_membership(txn, voter, &poll.group)?;
            let mut options = txn.get_options(poll_id)?;
            let Some(chosen) = options.iter_mut().find(|o| o.ordinal == ordinal) else {
                return Err(CoreError::Validation(format!(
                    "poll {poll_id} has no option {ordinal}"
                )));
            };
            let hash = voter_hash(voter, poll_id);
            if txn.has_valid_vote(poll_id, &hash)? {
                return Err(CoreError::AlreadyVoted);
            }
            txn.insert_vote(&VoteRecord {
                poll: *poll_id,
                option: ordinal,
                voter_hash: hash,
                cast_at: now,
                valid: true,
            })?;
            chosen.vote_count = txn.increment_option(poll_id, ordinal)?;
            poll.votes_cast_count += 1;
            poll.updated_at = now;

            let counts: Vec<u32> = options.iter().map(|o| o.vote_count).collect();
            let decision = TallyRule::for_poll(&poll).after_vote(&counts);
            let declared = if decision.is_declared() {
                Some(self.seal(txn, &mut poll, decision, now)?)
            } else {
                txn.update_poll(&poll)?;
                None
            };
            deadline.check()?;
            Ok::<_, CoreError>(VoteOutcome { poll, declared })
        })?;

        info!(poll = %poll_id, votes = outcome.poll.votes_cast_count, "vote recorded");
        if let Some(event) = &outcome.declared {
            info!(poll = %poll_id, result = %event.result, winner = ?event.winning_option, "poll sealed");
        }
        Ok(outcome)
    }

    /// Apply the end-of-poll rule to a poll whose window has passed.
    pub fn close_poll(&self, poll_id: &PollId, deadline: &Deadline) -> Result<ResultDeclared, CoreError> {
        let now = self.clock.now();
        let event = self.store.with_transaction(|txn| {
            let mut poll = txn.get_poll(poll_id)?;
            if poll.is_sealed() {
                return Err(CoreError::PollSealed);
            }
            if now < poll.end_at {
                return Err(CoreError::InvalidState(format!(
                    "poll {poll_id} is open until {}",
                    poll.end_at
                )));
            }
            let counts: Vec<u32> = txn.get_options(poll_id)?.iter().map(|o| o.vote_count).collect();
            let decision = TallyRule::for_poll(&poll).at_close(&counts);
            let event = self.seal(txn, &mut poll, decision, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(event)
        })?;
        info!(poll = %poll_id, result = %event.result, winner = ?event.winning_option, "poll sealed");
        Ok(event)
    }

    /// Close every active poll whose window ended at or before `now`.
    ///
    /// Each poll closes in its own transaction. A poll sealed concurrently by
    /// a deciding vote is skipped; other failures are logged and skipped.
    pub fn close_overdue(&self, now: Timestamp) -> Result<Vec<ResultDeclared>, CoreError> {
        let overdue = self
            .store
            .read(|txn| Ok::<_, CoreError>(txn.overdue_polls(now)?))?;
        let mut declared = Vec::with_capacity(overdue.len());
        for poll in overdue {
            match self.close_poll(&poll.id, &Deadline::unbounded()) {
                Ok(event) => declared.push(event),
                Err(CoreError::PollSealed) => {}
                Err(e) => warn!(poll = %poll.id, error = %e, "failed to close overdue poll"),
            }
        }
        Ok(declared)
    }

    /// Cancel an active poll. Only its creator or the chairperson may.
    pub fn cancel_poll(
        &self,
        poll_id: &PollId,
        requester: &UserId,
        deadline: &Deadline,
    ) -> Result<PollRecord, CoreError> {
        let now = self.clock.now();
        let poll = self.store.with_transaction(|txn| {
            let mut poll = txn.get_poll(poll_id)?;
            let membership = resolve_membership(txn, requester, &poll.group)?;
            if poll.creator != *requester && membership.role != Role::Chairperson {
                return Err(CoreError::InsufficientRole {
                    actual: membership.role.to_string(),
                    action: "cancel poll".into(),
                });
            }
            if poll.result.is_declared() {
                return Err(CoreError::PollSealed);
            }
            poll.status = poll.status.cancel()?;
            poll.updated_at = now;
            txn.update_poll(&poll)?;
            for subscriber in &self.subscribers {
                subscriber.on_poll_cancelled(txn, &poll)?;
            }
            deadline.check()?;
            Ok::<_, CoreError>(poll)
        })?;
        info!(poll = %poll_id, by = %requester, "poll cancelled");
        Ok(poll)
    }

    pub fn get_poll(&self, poll_id: &PollId, requester: &UserId) -> Result<PollRecord, CoreError> {
        self.store.read(|txn| {
            let poll = txn.get_poll(poll_id)?;
            resolve_membership(txn, requester, &poll.group)?;
            Ok(poll)
        })
    }

    pub fn get_tally(&self, poll_id: &PollId, requester: &UserId) -> Result<Tally, CoreError> {
        self.store.read(|txn| {
            let poll = txn.get_poll(poll_id)?;
            resolve_membership(txn, requester, &poll.group)?;
            let options = txn
                .get_options(poll_id)?
                .into_iter()
                .map(|o| OptionTally {
                    ordinal: o.ordinal,
                    text: o.text,
                    votes: o.vote_count,
                })
                .collect();
            Ok(Tally {
                poll: poll.id,
                status: poll.status,
                eligible_voter_count: poll.eligible_voter_count,
                votes_cast: poll.votes_cast_count,
                options,
                result: poll.result,
                winning_option: poll.winning_option,
            })
        })
    }

    /// Whether `user` has a valid ballot on the poll. Reveals nothing else.
    pub fn has_voted(&self, poll_id: &PollId, user: &UserId) -> Result<bool, CoreError> {
        self.store.read(|txn| {
            let poll = txn.get_poll(poll_id)?;
            resolve_membership(txn, user, &poll.group)?;
            Ok(txn.has_valid_vote(poll_id, &voter_hash(user, poll_id))?)
        })
    }

    /// Polls of a group, newest first.
    pub fn list_polls(
        &self,
        group: &GroupId,
        requester: &UserId,
        status: Option<PollStatus>,
    ) -> Result<Vec<PollRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.list_polls(group, status)?)
        })
    }

    fn seal(
        &self,
        txn: &mut dyn LedgerTxn,
        poll: &mut PollRecord,
        decision: Decision,
        now: Timestamp,
    ) -> Result<ResultDeclared, CoreError> {
        poll.status = poll.status.complete()?;
        poll.result = decision.result();
        poll.winning_option = decision.winner();
        poll.result_declared_at = Some(now);
        poll.updated_at = now;
        txn.update_poll(poll)?;
        let event = ResultDeclared::from_sealed(poll, now);
        for subscriber in &self.subscribers {
            subscriber.on_result_declared(txn, &event)?;
        }
        Ok(event)
    }
}

/// Validate and insert a poll inside an open transaction.
pub(crate) fn open_poll(
    txn: &mut dyn LedgerTxn,
    creator: &UserId,
    new: &NewPoll,
    default_threshold: Threshold,
    now: Timestamp,
) -> Result<PollRecord, CoreError> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(CoreError::Validation("poll title must not be empty".into()));
    }
    if new.end_at <= now {
        return Err(CoreError::Validation("poll must end in the future".into()));
    }
    if new.options.len() < 2 {
        return Err(CoreError::Validation("a poll needs at least two options".into()));
    }
    if new.options.iter().any(|text| text.trim().is_empty()) {
        return Err(CoreError::Validation("poll options must not be empty".into()));
    }
    resolve_membership(txn, creator, &new.group)?;

    let poll = PollRecord {
        id: PollId::new(),
        group: new.group,
        title: title.to_string(),
        description: new.description.trim().to_string(),
        kind: new.kind,
        creator: *creator,
        start_at: now,
        end_at: new.end_at,
        status: PollStatus::Active,
        anonymous: new.anonymous,
        requires_majority: new.requires_majority,
        threshold: new.threshold.unwrap_or(default_threshold),
        eligible_voter_count: active_member_count(txn, &new.group)?,
        votes_cast_count: 0,
        result: PollResult::Undeclared,
        winning_option: None,
        result_declared_at: None,
        created_at: now,
        updated_at: now,
    };
    let options: Vec<PollOptionRecord> = (0u32..)
        .zip(&new.options)
        .map(|(ordinal, text)| PollOptionRecord {
            poll: poll.id,
            ordinal,
            text: text.trim().to_string(),
            vote_count: 0,
        })
        .collect();
    txn.insert_poll(&poll, &options)?;
    Ok(poll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_groups::{GroupAdmin, NewUser};
    use chama_nullables::{MemoryStore, NullClock};

    const T0: u64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<NullClock>,
        engine: PollEngine<MemoryStore>,
        group: GroupId,
        members: Vec<UserId>,
        outsider: UserId,
    }

    fn fixture(member_count: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(NullClock::new(T0));
        let admin = GroupAdmin::new(store.clone(), clock.clone());
        let d = Deadline::unbounded();
        let user = |n: usize| {
            admin
                .register_user(
                    NewUser {
                        email: Some(format!("m{n}@example.com")),
                        phone: None,
                        display_name: format!("Member {n}"),
                        credential_digest: "x".into(),
                    },
                    &d,
                )
                .unwrap()
                .id
        };
        let members: Vec<UserId> = (0..member_count).map(user).collect();
        let outsider = user(99);
        let group = admin.create_group("Harambee", &members[0], &d).unwrap().id;
        for m in &members[1..] {
            admin.join_group(&group, m, &d).unwrap();
        }
        Fixture {
            clock: clock.clone(),
            engine: PollEngine::new(store, clock, PollSettings::default()),
            group,
            members,
            outsider,
        }
    }

    fn general(group: GroupId) -> NewPoll {
        NewPoll {
            group,
            title: "Buy a water tank".into(),
            description: String::new(),
            kind: PollKind::FinancialDecision,
            end_at: Timestamp::new(T0 + DAY),
            options: vec!["Yes".into(), "No".into()],
            anonymous: true,
            requires_majority: false,
            threshold: None,
        }
    }

    #[test]
    fn create_validates_input() {
        let f = fixture(2);
        let d = Deadline::unbounded();
        let creator = f.members[0];
        let one_option = NewPoll {
            options: vec!["Yes".into()],
            ..general(f.group)
        };
        assert!(matches!(f.engine.create_poll(&creator, one_option, &d), Err(CoreError::Validation(_))));
        let blank = NewPoll {
            options: vec!["Yes".into(), "  ".into()],
            ..general(f.group)
        };
        assert!(matches!(f.engine.create_poll(&creator, blank, &d), Err(CoreError::Validation(_))));
        let past = NewPoll {
            end_at: Timestamp::new(T0),
            ..general(f.group)
        };
        assert!(matches!(f.engine.create_poll(&creator, past, &d), Err(CoreError::Validation(_))));
        assert!(matches!(
            f.engine.create_poll(&f.outsider, general(f.group), &d),
            Err(CoreError::NotAMember { .. })
        ));
        let poll = f.engine.create_poll(&creator, general(f.group), &d).unwrap();
        assert_eq!(poll.eligible_voter_count, 2);
        assert_eq!(poll.threshold, Threshold::HALF);
    }

    #[test]
    fn double_vote_is_rejected_and_counted_once() {
        let f = fixture(4);
        let d = Deadline::unbounded();
        let poll = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        f.engine.cast_vote(&poll.id, &f.members[1], 0, &d).unwrap();
        assert!(matches!(
            f.engine.cast_vote(&poll.id, &f.members[1], 0, &d),
            Err(CoreError::AlreadyVoted)
        ));
        let tally = f.engine.get_tally(&poll.id, &f.members[2]).unwrap();
        assert_eq!(tally.votes_cast, 1);
        assert_eq!(tally.options.iter().map(|o| o.votes).sum::<u32>(), 1);
        assert!(f.engine.has_voted(&poll.id, &f.members[1]).unwrap());
        assert!(!f.engine.has_voted(&poll.id, &f.members[2]).unwrap());
    }

    #[test]
    fn votes_need_membership_and_a_real_option() {
        let f = fixture(3);
        let d = Deadline::unbounded();
        let poll = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        assert!(matches!(
            f.engine.cast_vote(&poll.id, &f.outsider, 0, &d),
            Err(CoreError::NotAMember { .. })
        ));
        assert!(matches!(
            f.engine.cast_vote(&poll.id, &f.members[1], 7, &d),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn votes_after_end_are_sealed_and_close_applies_plurality() {
        let f = fixture(5);
        let d = Deadline::unbounded();
        let poll = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        f.engine.cast_vote(&poll.id, &f.members[1], 1, &d).unwrap();
        f.clock.set(T0 + DAY);
        assert!(matches!(
            f.engine.cast_vote(&poll.id, &f.members[2], 0, &d),
            Err(CoreError::PollSealed)
        ));
        let closed = f.engine.close_overdue(f.clock.now()).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result, PollResult::Passed);
        assert_eq!(closed[0].winning_option, Some(1));
        assert!(f.engine.close_overdue(f.clock.now()).unwrap().is_empty());
        assert!(matches!(f.engine.close_poll(&poll.id, &d), Err(CoreError::PollSealed)));
    }

    #[test]
    fn early_close_is_refused() {
        let f = fixture(2);
        let d = Deadline::unbounded();
        let poll = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        assert!(matches!(f.engine.close_poll(&poll.id, &d), Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn cancel_is_limited_to_creator_or_chair() {
        let f = fixture(3);
        let d = Deadline::unbounded();
        let poll = f.engine.create_poll(&f.members[1], general(f.group), &d).unwrap();
        assert!(matches!(
            f.engine.cancel_poll(&poll.id, &f.members[2], &d),
            Err(CoreError::InsufficientRole { .. })
        ));
        let cancelled = f.engine.cancel_poll(&poll.id, &f.members[0], &d).unwrap();
        assert_eq!(cancelled.status, PollStatus::Cancelled);
        assert_eq!(cancelled.result, PollResult::Undeclared);
        assert!(matches!(
            f.engine.cast_vote(&poll.id, &f.members[2], 0, &d),
            Err(CoreError::PollSealed)
        ));
        assert!(matches!(
            f.engine.cancel_poll(&poll.id, &f.members[1], &d),
            Err(CoreError::PollSealed)
        ));
    }

    #[test]
    fn list_filters_by_status() {
        let f = fixture(2);
        let d = Deadline::unbounded();
        let first = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        f.clock.advance(60);
        let second = f.engine.create_poll(&f.members[0], general(f.group), &d).unwrap();
        f.engine.cancel_poll(&first.id, &f.members[0], &d).unwrap();
        let all = f.engine.list_polls(&f.group, &f.members[1], None).unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        let active = f
            .engine
            .list_polls(&f.group, &f.members[1], Some(PollStatus::Active))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert!(matches!(
            f.engine.list_polls(&f.group, &f.outsider, None),
            Err(CoreError::NotAMember { .. })
        ));
    }

    #[test]
    fn role_escalation_polls_cannot_be_created_directly() {
        let f = fixture(2);
        let poll = NewPoll {
            kind: PollKind::RoleEscalation,
            ..general(f.group)
        };
        assert!(matches!(
            f.engine.create_poll(&f.members[0], poll, &Deadline::unbounded()),
            Err(CoreError::Validation(_))
        ));
    }
}

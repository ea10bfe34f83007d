//! Polls, options, anonymous ballots and role-escalation requests.

use crate::StoreError;
use chama_types::{
    EscalationId, EscalationStatus, GroupId, PollId, PollKind, PollResult, PollStatus, Role,
    Threshold, Timestamp, UserId, VoterHash,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    pub id: PollId,
    pub group: GroupId,
    pub title: String,
    pub description: String,
    pub kind: PollKind,
    pub creator: UserId,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    pub status: PollStatus,
    pub anonymous: bool,
    pub requires_majority: bool,
    pub threshold: Threshold,
    /// Active member count when the poll was created.
    pub eligible_voter_count: u32,
    pub votes_cast_count: u32,
    pub result: PollResult,
    pub winning_option: Option<u32>,
    pub result_declared_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PollRecord {
    /// Sealed polls accept no further votes.
    pub fn is_sealed(&self) -> bool {
        self.status != PollStatus::Active || self.result.is_declared()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionRecord {
    pub poll: PollId,
    pub ordinal: u32,
    pub text: String,
    pub vote_count: u32,
}

/// A ballot. Carries no voter identity, only the voter hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub poll: PollId,
    pub option: u32,
    pub voter_hash: VoterHash,
    pub cast_at: Timestamp,
    pub valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEscalationRecord {
    pub id: EscalationId,
    pub group: GroupId,
    pub candidate: UserId,
    pub current_role: Role,
    pub requested_role: Role,
    pub requester: UserId,
    pub poll: PollId,
    pub justification: String,
    pub status: EscalationStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub trait PollStore {
    /// Insert a poll with its options. Ordinals must be `0..n`.
    fn insert_poll(
        &mut self,
        poll: &PollRecord,
        options: &[PollOptionRecord],
    ) -> Result<(), StoreError>;

    fn get_poll(&mut self, id: &PollId) -> Result<PollRecord, StoreError>;

    /// Persist the mutable fields of a poll (status, counters, result).
    fn update_poll(&mut self, poll: &PollRecord) -> Result<(), StoreError>;

    /// Options ordered by ordinal.
    fn get_options(&mut self, poll: &PollId) -> Result<Vec<PollOptionRecord>, StoreError>;

    /// Bump an option's counter and return the new count.
    fn increment_option(&mut self, poll: &PollId, ordinal: u32) -> Result<u32, StoreError>;

    /// Fails with `Duplicate` if a valid vote with the same voter hash exists.
    fn insert_vote(&mut self, vote: &VoteRecord) -> Result<(), StoreError>;

    fn has_valid_vote(&mut self, poll: &PollId, voter: &VoterHash) -> Result<bool, StoreError>;

    fn count_valid_votes(&mut self, poll: &PollId) -> Result<u32, StoreError>;

    /// Polls of a group, newest first, optionally filtered by status.
    fn list_polls(
        &mut self,
        group: &GroupId,
        status: Option<PollStatus>,
    ) -> Result<Vec<PollRecord>, StoreError>;

    /// Active polls with `end_at <= now`.
    fn overdue_polls(&mut self, now: Timestamp) -> Result<Vec<PollRecord>, StoreError>;

    fn insert_escalation(&mut self, request: &RoleEscalationRecord) -> Result<(), StoreError>;

    fn get_escalation(&mut self, id: &EscalationId) -> Result<RoleEscalationRecord, StoreError>;

    fn escalation_for_poll(
        &mut self,
        poll: &PollId,
    ) -> Result<Option<RoleEscalationRecord>, StoreError>;

    fn set_escalation_status(
        &mut self,
        id: &EscalationId,
        status: EscalationStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Requests still in `voting` for this candidate and role.
    fn open_escalations(
        &mut self,
        group: &GroupId,
        candidate: &UserId,
        role: Role,
    ) -> Result<Vec<RoleEscalationRecord>, StoreError>;
}

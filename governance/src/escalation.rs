//! Role escalation: a member asks the group to move a candidate into a role,
//! the group votes, and a passed vote applies the change atomically with the
//! sealing of the poll.

use std::sync::Arc;

use chama_groups::resolve_membership;
use chama_store::{LedgerStore, LedgerTxn, PollRecord, RoleChangeRecord, RoleEscalationRecord};
use chama_types::{
    Clock, CoreError, Deadline, EscalationId, EscalationStatus, GroupId, PollId, PollKind,
    PollResult, Role, RoleChangeId, Timestamp, UserId,
};
use tracing::info;

use crate::events::{ResultDeclared, ResultSubscriber};
use crate::polls::{open_poll, NewPoll, PollSettings};

/// Ordinal of the approving option on an escalation poll.
pub const APPROVE: u32 = 0;
/// Ordinal of the rejecting option.
pub const REJECT: u32 = 1;

#[derive(Clone, Debug)]
pub struct EscalationRequest {
    pub group: GroupId,
    pub candidate: UserId,
    pub requested_role: Role,
    pub justification: String,
}

pub struct RoleEscalationCoordinator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
}

impl<S: LedgerStore> RoleEscalationCoordinator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: PollSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Open an escalation request and its two-option poll.
    pub fn request_role_escalation(
        &self,
        requester: &UserId,
        request: EscalationRequest,
        deadline: &Deadline,
    ) -> Result<(RoleEscalationRecord, PollRecord), CoreError> {
        let now = self.clock.now();
        let justification = request.justification.trim().to_string();
        let opened = self.store.with_transaction(|txn| {
            resolve_membership(txn, requester, &request.group)?;
            let candidate = resolve_membership(txn, &request.candidate, &request.group)?;
            if candidate.role == request.requested_role {
                return Err(CoreError::Validation(format!(
                    "candidate already holds the {} role",
                    request.requested_role
                )));
            }
            if !txn
                .open_escalations(&request.group, &request.candidate, request.requested_role)?
                .is_empty()
            {
                return Err(CoreError::InvalidState(format!(
                    "an escalation to {} is already being voted on for this member",
                    request.requested_role
                )));
            }
            let candidate_name = txn.get_user(&request.candidate)?.display_name;

            let poll = open_poll(
                txn,
                requester,
                &NewPoll {
                    group: request.group,
                    title: format!("Appoint {candidate_name} as {}", request.requested_role),
                    description: justification.clone(),
                    kind: PollKind::RoleEscalation,
                    end_at: now.plus_secs(self.settings.role_escalation_window_secs),
                    options: vec!["Approve".into(), "Reject".into()],
                    anonymous: true,
                    requires_majority: true,
                    threshold: None,
                },
                self.settings.default_threshold,
                now,
            )?;
            let record = RoleEscalationRecord {
                id: EscalationId::new(),
                group: request.group,
                candidate: request.candidate,
                current_role: candidate.role,
                requested_role: request.requested_role,
                requester: *requester,
                poll: poll.id,
                justification: justification.clone(),
                status: EscalationStatus::Voting,
                created_at: now,
                updated_at: now,
            };
            txn.insert_escalation(&record)?;
            deadline.check()?;
            Ok::<_, CoreError>((record, poll))
        })?;

        info!(
            request = %opened.0.id,
            candidate = %request.candidate,
            role = %request.requested_role,
            poll = %opened.1.id,
            "role escalation requested"
        );
        Ok(opened)
    }

    pub fn get_request(
        &self,
        id: &EscalationId,
        requester: &UserId,
    ) -> Result<RoleEscalationRecord, CoreError> {
        self.store.read(|txn| {
            let request = txn.get_escalation(id)?;
            resolve_membership(txn, requester, &request.group)?;
            Ok(request)
        })
    }

    /// Whether the escalation voted on in `poll` ended with the role applied.
    /// A passed vote whose candidate has since left settles as rejected.
    pub fn role_change_applied(&self, poll: &PollId) -> Result<bool, CoreError> {
        self.store.read(|txn| {
            Ok(txn
                .escalation_for_poll(poll)?
                .is_some_and(|request| request.status == EscalationStatus::Approved))
        })
    }

    /// Audit trail of role changes in a group, oldest first.
    pub fn list_role_changes(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<RoleChangeRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.list_role_changes(group)?)
        })
    }
}

impl<S: LedgerStore> ResultSubscriber for RoleEscalationCoordinator<S> {
    fn on_result_declared(
        &self,
        txn: &mut dyn LedgerTxn,
        event: &ResultDeclared,
    ) -> Result<(), CoreError> {
        if event.kind != PollKind::RoleEscalation {
            return Ok(());
        }
        let Some(request) = txn.escalation_for_poll(&event.poll)? else {
            return Err(CoreError::internal(format!(
                "role escalation poll {} has no request",
                event.poll
            )));
        };
        let approved =
            event.result == PollResult::Passed && event.winning_option == Some(APPROVE);
        let approved = approved && apply_role_change(txn, &request, event.declared_at)?;
        let status = request.status.settle(approved)?;
        txn.set_escalation_status(&request.id, status, event.declared_at)?;
        info!(request = %request.id, %status, "role escalation settled");
        Ok(())
    }

    fn on_poll_cancelled(&self, txn: &mut dyn LedgerTxn, poll: &PollRecord) -> Result<(), CoreError> {
        if poll.kind != PollKind::RoleEscalation {
            return Ok(());
        }
        if let Some(request) = txn.escalation_for_poll(&poll.id)? {
            let status = request.status.settle(false)?;
            txn.set_escalation_status(&request.id, status, poll.updated_at)?;
        }
        Ok(())
    }
}

/// Move the candidate into the requested role, first demoting whoever holds
/// it when the role is a singleton. Returns `false` without changing anything
/// when the candidate has left the group since the request was opened.
fn apply_role_change(
    txn: &mut dyn LedgerTxn,
    request: &RoleEscalationRecord,
    at: Timestamp,
) -> Result<bool, CoreError> {
    let candidate = match resolve_membership(txn, &request.candidate, &request.group) {
        Ok(membership) => membership,
        Err(CoreError::NotAMember { .. }) => return Ok(false),
        Err(e) => return Err(e),
    };

    let mut displaced = Vec::new();
    if request.requested_role.is_singleton() {
        for holder in txn.holders_of(&request.group, request.requested_role)? {
            if holder.user != request.candidate {
                txn.set_member_role(&request.group, &holder.user, Role::Member, at)?;
                displaced.push(holder.user);
            }
        }
    }
    txn.set_member_role(&request.group, &request.candidate, request.requested_role, at)?;

    let mut reason = format!("role escalation {} approved", request.id);
    for user in &displaced {
        reason.push_str(&format!("; displaced {user}"));
    }
    txn.append_role_change(&RoleChangeRecord {
        id: RoleChangeId::new(),
        group: request.group,
        user: request.candidate,
        old_role: candidate.role,
        new_role: request.requested_role,
        changed_by: request.requester,
        reason,
        at,
    })?;
    info!(
        group = %request.group,
        user = %request.candidate,
        from = %candidate.role,
        to = %request.requested_role,
        displaced = displaced.len(),
        "role changed"
    );
    Ok(true)
}

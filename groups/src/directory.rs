//! Membership resolution, the authorization fast path.
//!
//! The free functions work inside a caller's open transaction so that the
//! authorization check and the mutation it guards see the same state.
//! [`MembershipDirectory`] wraps them for reads outside a transaction.

use std::sync::Arc;

use chama_store::{LedgerStore, LedgerTxn};
use chama_types::{CoreError, GroupId, Role, UserId};
use serde::Serialize;

/// An active membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Membership {
    pub group: GroupId,
    pub user: UserId,
    pub role: Role,
}

/// One row of a member listing, used for poll eligibility snapshots and
/// notification fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberEntry {
    pub user: UserId,
    pub role: Role,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// `NotAMember` unless `user` has an active membership in `group`.
pub fn resolve_membership(
    txn: &mut dyn LedgerTxn,
    user: &UserId,
    group: &GroupId,
) -> Result<Membership, CoreError> {
    match txn.get_membership(group, user)? {
        Some(m) if m.active => Ok(Membership {
            group: m.group,
            user: m.user,
            role: m.role,
        }),
        _ => Err(CoreError::NotAMember {
            user: user.to_string(),
            group: group.to_string(),
        }),
    }
}

/// Resolve the membership and require one of `allowed` roles.
pub fn require_role(
    txn: &mut dyn LedgerTxn,
    user: &UserId,
    group: &GroupId,
    allowed: &[Role],
    action: &str,
) -> Result<Membership, CoreError> {
    let membership = resolve_membership(txn, user, group)?;
    if allowed.contains(&membership.role) {
        Ok(membership)
    } else {
        Err(CoreError::InsufficientRole {
            actual: membership.role.to_string(),
            action: action.to_string(),
        })
    }
}

/// Active members of `group` with their contact details.
pub fn list_members(txn: &mut dyn LedgerTxn, group: &GroupId) -> Result<Vec<MemberEntry>, CoreError> {
    let memberships = txn.list_memberships(group, true)?;
    let mut members = Vec::with_capacity(memberships.len());
    for m in memberships {
        let user = txn.get_user(&m.user)?;
        members.push(MemberEntry {
            user: m.user,
            role: m.role,
            display_name: user.display_name,
            email: user.email,
            phone: user.phone,
        });
    }
    Ok(members)
}

pub fn active_member_count(txn: &mut dyn LedgerTxn, group: &GroupId) -> Result<u32, CoreError> {
    let count = txn.list_memberships(group, true)?.len();
    u32::try_from(count).map_err(|_| CoreError::internal(format!("group {group} has {count} members")))
}

/// Read-only directory over a store.
pub struct MembershipDirectory<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> MembershipDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn resolve_membership(&self, user: &UserId, group: &GroupId) -> Result<Membership, CoreError> {
        self.store.read(|txn| resolve_membership(txn, user, group))
    }

    pub fn list_members(&self, group: &GroupId) -> Result<Vec<MemberEntry>, CoreError> {
        self.store.read(|txn| list_members(txn, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{GroupAdmin, NewUser};
    use chama_nullables::{MemoryStore, NullClock};
    use chama_types::Deadline;

    fn user(admin: &GroupAdmin<MemoryStore>, email: &str) -> UserId {
        admin
            .register_user(
                NewUser {
                    email: Some(email.to_string()),
                    phone: None,
                    display_name: email.to_string(),
                    credential_digest: "digest".into(),
                },
                &Deadline::unbounded(),
            )
            .unwrap()
            .id
    }

    #[test]
    fn resolves_roles_and_rejects_outsiders() {
        let store = Arc::new(MemoryStore::new());
        let admin = GroupAdmin::new(store.clone(), Arc::new(NullClock::new(1_000)));
        let chair = user(&admin, "chair@example.com");
        let member = user(&admin, "member@example.com");
        let outsider = user(&admin, "outsider@example.com");
        let group = admin.create_group("Umoja", &chair, &Deadline::unbounded()).unwrap();
        admin.join_group(&group.id, &member, &Deadline::unbounded()).unwrap();

        let directory = MembershipDirectory::new(store);
        assert_eq!(
            directory.resolve_membership(&chair, &group.id).unwrap().role,
            Role::Chairperson
        );
        assert_eq!(
            directory.resolve_membership(&member, &group.id).unwrap().role,
            Role::Member
        );
        assert!(matches!(
            directory.resolve_membership(&outsider, &group.id),
            Err(CoreError::NotAMember { .. })
        ));

        let members = directory.list_members(&group.id).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].email.as_deref(), Some("chair@example.com"));
    }
}

//! Users, groups, memberships and the role-change audit trail.

use crate::StoreError;
use chama_types::{GroupId, GroupStatus, Role, RoleChangeId, Timestamp, UserId, UserStatus};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Normalised (trimmed, lowercase). Unique when present.
    pub email: Option<String>,
    /// Normalised (digits and a leading `+`). Unique when present.
    pub phone: Option<String>,
    pub display_name: String,
    pub credential_digest: String,
    pub status: UserStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub status: GroupStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One row per (group, user). Leaving sets `active = false`; rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub group: GroupId,
    pub user: UserId,
    pub role: Role,
    pub active: bool,
    pub joined_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangeRecord {
    pub id: RoleChangeId,
    pub group: GroupId,
    pub user: UserId,
    pub old_role: Role,
    pub new_role: Role,
    pub changed_by: UserId,
    pub reason: String,
    pub at: Timestamp,
}

pub trait MembershipStore {
    /// Fails with `Duplicate` when the email or phone is already registered.
    fn insert_user(&mut self, user: &UserRecord) -> Result<(), StoreError>;

    fn get_user(&mut self, id: &UserId) -> Result<UserRecord, StoreError>;

    /// Look up a user by normalised email or phone, whichever matches first.
    fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError>;

    fn insert_group(&mut self, group: &GroupRecord) -> Result<(), StoreError>;

    fn get_group(&mut self, id: &GroupId) -> Result<GroupRecord, StoreError>;

    fn get_membership(
        &mut self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError>;

    /// Insert or replace the (group, user) row.
    fn put_membership(&mut self, membership: &MembershipRecord) -> Result<(), StoreError>;

    /// Memberships of a group ordered by join time.
    fn list_memberships(
        &mut self,
        group: &GroupId,
        active_only: bool,
    ) -> Result<Vec<MembershipRecord>, StoreError>;

    /// Change the role of an existing membership.
    fn set_member_role(
        &mut self,
        group: &GroupId,
        user: &UserId,
        role: Role,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Active members currently holding `role`.
    fn holders_of(&mut self, group: &GroupId, role: Role)
        -> Result<Vec<MembershipRecord>, StoreError>;

    fn append_role_change(&mut self, change: &RoleChangeRecord) -> Result<(), StoreError>;

    /// Audit trail of a group, oldest first.
    fn list_role_changes(&mut self, group: &GroupId) -> Result<Vec<RoleChangeRecord>, StoreError>;
}

//! Admin tooling: user registration, group bootstrap, join and leave.

use std::sync::Arc;

use chama_store::{
    GroupRecord, LedgerStore, LedgerTxn, MembershipRecord, UserRecord, WalletRecord,
};
use chama_types::{
    Clock, CoreError, Deadline, GroupId, GroupStatus, Role, Timestamp, UserId, UserStatus,
    WalletOwner,
};
use tracing::info;

use crate::contact::{normalize_email, normalize_phone};

/// Registration input. At least one of `email` and `phone` is required.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub credential_digest: String,
}

pub struct GroupAdmin<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> GroupAdmin<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a user and open their personal wallet.
    pub fn register_user(&self, new: NewUser, deadline: &Deadline) -> Result<UserRecord, CoreError> {
        let email = new.email.as_deref().map(normalize_email).transpose()?;
        let phone = new.phone.as_deref().map(normalize_phone).transpose()?;
        if email.is_none() && phone.is_none() {
            return Err(CoreError::Validation(
                "an email address or phone number is required".into(),
            ));
        }
        let display_name = new.display_name.trim();
        if display_name.is_empty() {
            return Err(CoreError::Validation("display name must not be empty".into()));
        }

        let now = self.clock.now();
        let user = UserRecord {
            id: UserId::new(),
            email,
            phone,
            display_name: display_name.to_string(),
            credential_digest: new.credential_digest,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.store.with_transaction(|txn| {
            if txn
                .find_user_by_contact(user.email.as_deref(), user.phone.as_deref())?
                .is_some()
            {
                return Err(CoreError::InvalidState(
                    "email or phone is already registered".into(),
                ));
            }
            txn.insert_user(&user)?;
            txn.insert_wallet(&WalletRecord::open(WalletOwner::User(user.id), now))?;
            deadline.check()
        })?;

        info!(user = %user.id, "user registered");
        Ok(user)
    }

    /// Create a group with its group wallet; `founder` becomes chairperson.
    pub fn create_group(
        &self,
        name: &str,
        founder: &UserId,
        deadline: &Deadline,
    ) -> Result<GroupRecord, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("group name must not be empty".into()));
        }
        let now = self.clock.now();
        let group = GroupRecord {
            id: GroupId::new(),
            name: name.to_string(),
            status: GroupStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.store.with_transaction(|txn| {
            let user = txn.get_user(founder)?;
            if user.status != UserStatus::Active {
                return Err(CoreError::InvalidState(format!(
                    "user {founder} is {}",
                    user.status
                )));
            }
            txn.insert_group(&group)?;
            txn.insert_wallet(&WalletRecord::open(WalletOwner::Group(group.id), now))?;
            txn.put_membership(&membership(group.id, *founder, Role::Chairperson, now))?;
            deadline.check()
        })?;

        info!(group = %group.id, founder = %founder, "group created");
        Ok(group)
    }

    /// Add `user` as a plain member. A tombstoned membership is re-activated
    /// with role `member`.
    pub fn join_group(
        &self,
        group: &GroupId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<MembershipRecord, CoreError> {
        let now = self.clock.now();
        let joined = self.store.with_transaction(|txn| {
            let record = txn.get_group(group)?;
            if record.status != GroupStatus::Active {
                return Err(CoreError::InvalidState(format!("group {group} is {}", record.status)));
            }
            let account = txn.get_user(user)?;
            if account.status != UserStatus::Active {
                return Err(CoreError::InvalidState(format!("user {user} is {}", account.status)));
            }
            let joined = match txn.get_membership(group, user)? {
                Some(existing) if existing.active => {
                    return Err(CoreError::InvalidState(format!(
                        "user {user} is already a member of group {group}"
                    )))
                }
                Some(existing) => MembershipRecord {
                    role: Role::Member,
                    active: true,
                    joined_at: now,
                    updated_at: now,
                    ..existing
                },
                None => membership(*group, *user, Role::Member, now),
            };
            txn.put_membership(&joined)?;
            ensure_personal_wallet(txn, user, now)?;
            deadline.check()?;
            Ok(joined)
        })?;
        info!(group = %group, user = %user, "member joined");
        Ok(joined)
    }

    /// Tombstone the membership. The chairperson must hand over the role first.
    pub fn leave_group(&self, group: &GroupId, user: &UserId, deadline: &Deadline) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.store.with_transaction(|txn| {
            let current = crate::directory::resolve_membership(txn, user, group)?;
            if current.role == Role::Chairperson {
                return Err(CoreError::InvalidState(
                    "the chairperson cannot leave; elect a new chairperson first".into(),
                ));
            }
            let Some(record) = txn.get_membership(group, user)? else {
                return Err(CoreError::not_found("membership", user));
            };
            txn.put_membership(&MembershipRecord {
                active: false,
                updated_at: now,
                ..record
            })?;
            deadline.check()
        })?;
        info!(group = %group, user = %user, "member left");
        Ok(())
    }
}

fn membership(group: GroupId, user: UserId, role: Role, at: Timestamp) -> MembershipRecord {
    MembershipRecord {
        group,
        user,
        role,
        active: true,
        joined_at: at,
        created_at: at,
        updated_at: at,
    }
}

fn ensure_personal_wallet(txn: &mut dyn LedgerTxn, user: &UserId, at: Timestamp) -> Result<(), CoreError> {
    let owner = WalletOwner::User(*user);
    if txn.wallet_for_owner(&owner)?.is_none() {
        txn.insert_wallet(&WalletRecord::open(owner, at))?;
    }
    Ok(())
}

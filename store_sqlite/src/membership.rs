use chama_store::{GroupRecord, MembershipRecord, MembershipStore, RoleChangeRecord, StoreError, UserRecord};
use chama_types::{GroupId, Role, Timestamp, UserId};
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{parsed, ts};
use crate::error::SqlResultExt;
use crate::query::{MembershipColumn, Update};
use crate::SqliteTxn;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: parsed(row, "id")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        display_name: row.get("display_name")?,
        credential_digest: row.get("credential_digest")?,
        status: parsed(row, "status")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<MembershipRecord> {
    Ok(MembershipRecord {
        group: parsed(row, "group_id")?,
        user: parsed(row, "user_id")?,
        role: parsed(row, "role")?,
        active: row.get("active")?,
        joined_at: parsed(row, "joined_at")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn role_change_from_row(row: &Row<'_>) -> rusqlite::Result<RoleChangeRecord> {
    Ok(RoleChangeRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        user: parsed(row, "user_id")?,
        old_role: parsed(row, "old_role")?,
        new_role: parsed(row, "new_role")?,
        changed_by: parsed(row, "changed_by")?,
        reason: row.get("reason")?,
        at: parsed(row, "at")?,
    })
}

impl MembershipStore for SqliteTxn<'_> {
    fn insert_user(&mut self, user: &UserRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO users (id, email, phone, display_name, credential_digest, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.phone,
                    user.display_name,
                    user.credential_digest,
                    user.status.as_str(),
                    ts(user.created_at),
                    ts(user.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_user(&mut self, id: &UserId) -> Result<UserRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM users WHERE id = ?1",
                params![id.to_string()],
                user_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn find_user_by_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError> {
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT * FROM users
                 WHERE (?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND phone = ?2)
                 LIMIT 1",
                params![email, phone],
                user_from_row,
            )
            .optional()
            .db()
    }

    fn insert_group(&mut self, group: &GroupRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO chamas (id, name, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    group.id.to_string(),
                    group.name,
                    group.status.as_str(),
                    ts(group.created_at),
                    ts(group.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_group(&mut self, id: &GroupId) -> Result<GroupRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM chamas WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(GroupRecord {
                        id: parsed(row, "id")?,
                        name: row.get("name")?,
                        status: parsed(row, "status")?,
                        created_at: parsed(row, "created_at")?,
                        updated_at: parsed(row, "updated_at")?,
                    })
                },
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("group", id))
    }

    fn get_membership(
        &mut self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM memberships WHERE group_id = ?1 AND user_id = ?2",
                params![group.to_string(), user.to_string()],
                membership_from_row,
            )
            .optional()
            .db()
    }

    fn put_membership(&mut self, m: &MembershipRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO memberships (group_id, user_id, role, active, joined_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (group_id, user_id) DO UPDATE SET
                    role = excluded.role,
                    active = excluded.active,
                    joined_at = excluded.joined_at,
                    updated_at = excluded.updated_at",
                params![
                    m.group.to_string(),
                    m.user.to_string(),
                    m.role.as_str(),
                    m.active,
                    ts(m.joined_at),
                    ts(m.created_at),
                    ts(m.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn list_memberships(
        &mut self,
        group: &GroupId,
        active_only: bool,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM memberships
                 WHERE group_id = ?1 AND (?2 = 0 OR active = 1)
                 ORDER BY joined_at, user_id",
            )
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string(), active_only], membership_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn set_member_role(
        &mut self,
        group: &GroupId,
        user: &UserId,
        role: Role,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let changed = Update::new()
            .set(MembershipColumn::Role, role.as_str().to_string())
            .set(MembershipColumn::UpdatedAt, ts(at))
            .execute(
                self.conn,
                vec![Value::from(group.to_string()), Value::from(user.to_string())],
            )
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("membership", format!("{group}/{user}")));
        }
        Ok(())
    }

    fn holders_of(
        &mut self,
        group: &GroupId,
        role: Role,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM memberships WHERE group_id = ?1 AND role = ?2 AND active = 1")
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string(), role.as_str()], membership_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn append_role_change(&mut self, c: &RoleChangeRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO role_changes (id, group_id, user_id, old_role, new_role, changed_by, reason, at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    c.id.to_string(),
                    c.group.to_string(),
                    c.user.to_string(),
                    c.old_role.as_str(),
                    c.new_role.as_str(),
                    c.changed_by.to_string(),
                    c.reason,
                    ts(c.at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn list_role_changes(&mut self, group: &GroupId) -> Result<Vec<RoleChangeRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM role_changes WHERE group_id = ?1 ORDER BY at, rowid")
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string()], role_change_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

use chama_store::{PollOptionRecord, PollRecord, PollStore, RoleEscalationRecord, StoreError, VoteRecord};
use chama_types::{
    EscalationId, EscalationStatus, GroupId, PollId, PollStatus, Role, Threshold, Timestamp,
    UserId, VoterHash,
};
use rusqlite::types::{Type, Value};
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{counter, parsed, parsed_opt, ts, ts_opt, voter_hash};
use crate::error::SqlResultExt;
use crate::query::{PollColumn, Update};
use crate::SqliteTxn;

fn poll_from_row(row: &Row<'_>) -> rusqlite::Result<PollRecord> {
    let idx = row.as_ref().column_index("threshold_bps")?;
    let bps: u32 = row.get(idx)?;
    let threshold = Threshold::from_bps(bps)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))?;
    let winning_option: Option<u32> = row.get("winning_option")?;
    Ok(PollRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        kind: parsed(row, "kind")?,
        creator: parsed(row, "creator")?,
        start_at: parsed(row, "start_at")?,
        end_at: parsed(row, "end_at")?,
        status: parsed(row, "status")?,
        anonymous: row.get("anonymous")?,
        requires_majority: row.get("requires_majority")?,
        threshold,
        eligible_voter_count: counter(row, "eligible_voter_count")?,
        votes_cast_count: counter(row, "votes_cast_count")?,
        result: parsed(row, "result")?,
        winning_option,
        result_declared_at: parsed_opt(row, "result_declared_at")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn option_from_row(row: &Row<'_>) -> rusqlite::Result<PollOptionRecord> {
    Ok(PollOptionRecord {
        poll: parsed(row, "poll_id")?,
        ordinal: row.get("ordinal")?,
        text: row.get("text")?,
        vote_count: counter(row, "vote_count")?,
    })
}

fn escalation_from_row(row: &Row<'_>) -> rusqlite::Result<RoleEscalationRecord> {
    Ok(RoleEscalationRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        candidate: parsed(row, "candidate")?,
        current_role: parsed(row, "current_role")?,
        requested_role: parsed(row, "requested_role")?,
        requester: parsed(row, "requester")?,
        poll: parsed(row, "poll_id")?,
        justification: row.get("justification")?,
        status: parsed(row, "status")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

impl SqliteTxn<'_> {
    fn polls_where(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<PollRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).db()?;
        let rows = stmt.query_map(args, poll_from_row).db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

impl PollStore for SqliteTxn<'_> {
    fn insert_poll(
        &mut self,
        poll: &PollRecord,
        options: &[PollOptionRecord],
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO polls
                    (id, group_id, title, description, kind, creator, start_at, end_at, status,
                     anonymous, requires_majority, threshold_bps, eligible_voter_count,
                     votes_cast_count, result, winning_option, result_declared_at,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    poll.id.to_string(),
                    poll.group.to_string(),
                    poll.title,
                    poll.description,
                    poll.kind.as_str(),
                    poll.creator.to_string(),
                    ts(poll.start_at),
                    ts(poll.end_at),
                    poll.status.as_str(),
                    poll.anonymous,
                    poll.requires_majority,
                    poll.threshold.bps(),
                    poll.eligible_voter_count,
                    poll.votes_cast_count,
                    poll.result.as_str(),
                    poll.winning_option,
                    ts_opt(poll.result_declared_at),
                    ts(poll.created_at),
                    ts(poll.updated_at),
                ],
            )
            .db()?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO poll_options (poll_id, ordinal, text, vote_count) VALUES (?1, ?2, ?3, ?4)")
            .db()?;
        for option in options {
            stmt.execute(params![
                option.poll.to_string(),
                option.ordinal,
                option.text,
                option.vote_count,
            ])
            .db()?;
        }
        Ok(())
    }

    fn get_poll(&mut self, id: &PollId) -> Result<PollRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM polls WHERE id = ?1",
                params![id.to_string()],
                poll_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("poll", id))
    }

    fn update_poll(&mut self, poll: &PollRecord) -> Result<(), StoreError> {
        let changed = Update::new()
            .set(PollColumn::Status, poll.status.as_str().to_string())
            .set(PollColumn::VotesCastCount, poll.votes_cast_count)
            .set(PollColumn::Result, poll.result.as_str().to_string())
            .set(PollColumn::WinningOption, poll.winning_option)
            .set(PollColumn::ResultDeclaredAt, ts_opt(poll.result_declared_at))
            .set(PollColumn::UpdatedAt, ts(poll.updated_at))
            .execute(self.conn, vec![Value::from(poll.id.to_string())])
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("poll", poll.id));
        }
        Ok(())
    }

    fn get_options(&mut self, poll: &PollId) -> Result<Vec<PollOptionRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM poll_options WHERE poll_id = ?1 ORDER BY ordinal")
            .db()?;
        let rows = stmt
            .query_map(params![poll.to_string()], option_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn increment_option(&mut self, poll: &PollId, ordinal: u32) -> Result<u32, StoreError> {
        let count: Option<u32> = self
            .conn
            .query_row(
                "UPDATE poll_options SET vote_count = vote_count + 1
                 WHERE poll_id = ?1 AND ordinal = ?2
                 RETURNING vote_count",
                params![poll.to_string(), ordinal],
                |row| row.get(0),
            )
            .optional()
            .db()?;
        count.ok_or_else(|| StoreError::not_found("poll option", format!("{poll}#{ordinal}")))
    }

    fn insert_vote(&mut self, vote: &VoteRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO votes (poll_id, option_ordinal, voter_hash, cast_at, valid)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    vote.poll.to_string(),
                    vote.option,
                    vote.voter_hash.as_bytes().as_slice(),
                    ts(vote.cast_at),
                    vote.valid,
                ],
            )
            .db()?;
        Ok(())
    }

    fn has_valid_vote(&mut self, poll: &PollId, voter: &VoterHash) -> Result<bool, StoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM votes WHERE poll_id = ?1 AND voter_hash = ?2 AND valid = 1)",
                params![poll.to_string(), voter.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .db()
    }

    fn count_valid_votes(&mut self, poll: &PollId) -> Result<u32, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM votes WHERE poll_id = ?1 AND valid = 1",
                params![poll.to_string()],
                |row| row.get(0),
            )
            .db()
    }

    fn list_polls(
        &mut self,
        group: &GroupId,
        status: Option<PollStatus>,
    ) -> Result<Vec<PollRecord>, StoreError> {
        self.polls_where(
            "SELECT * FROM polls WHERE group_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, rowid DESC",
            &[&group.to_string(), &status.map(|s| s.as_str())],
        )
    }

    fn overdue_polls(&mut self, now: Timestamp) -> Result<Vec<PollRecord>, StoreError> {
        self.polls_where(
            "SELECT * FROM polls WHERE status = ?1 AND end_at <= ?2 ORDER BY end_at, rowid",
            &[&PollStatus::Active.as_str(), &ts(now)],
        )
    }

    fn insert_escalation(&mut self, r: &RoleEscalationRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO role_escalations
                    (id, group_id, candidate, current_role, requested_role, requester, poll_id,
                     justification, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    r.id.to_string(),
                    r.group.to_string(),
                    r.candidate.to_string(),
                    r.current_role.as_str(),
                    r.requested_role.as_str(),
                    r.requester.to_string(),
                    r.poll.to_string(),
                    r.justification,
                    r.status.as_str(),
                    ts(r.created_at),
                    ts(r.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_escalation(&mut self, id: &EscalationId) -> Result<RoleEscalationRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM role_escalations WHERE id = ?1",
                params![id.to_string()],
                escalation_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("role escalation request", id))
    }

    fn escalation_for_poll(
        &mut self,
        poll: &PollId,
    ) -> Result<Option<RoleEscalationRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM role_escalations WHERE poll_id = ?1",
                params![poll.to_string()],
                escalation_from_row,
            )
            .optional()
            .db()
    }

    fn set_escalation_status(
        &mut self,
        id: &EscalationId,
        status: EscalationStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE role_escalations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(at), id.to_string()],
            )
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("role escalation request", id));
        }
        Ok(())
    }

    fn open_escalations(
        &mut self,
        group: &GroupId,
        candidate: &UserId,
        role: Role,
    ) -> Result<Vec<RoleEscalationRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM role_escalations
                 WHERE group_id = ?1 AND candidate = ?2 AND requested_role = ?3 AND status = ?4",
            )
            .db()?;
        let rows = stmt
            .query_map(
                params![
                    group.to_string(),
                    candidate.to_string(),
                    role.as_str(),
                    EscalationStatus::Voting.as_str()
                ],
                escalation_from_row,
            )
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

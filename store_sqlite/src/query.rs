//! A small UPDATE builder.
//!
//! Column identifiers come from closed per-table enums, never from strings
//! supplied at run time, and every value is bound as a positional parameter.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// A column that may be named in an UPDATE against its table.
pub(crate) trait Column: Copy {
    const TABLE: &'static str;
    /// Column(s) identifying a row; bound after the SET values.
    const KEY: &'static [&'static str];

    fn name(self) -> &'static str;
}

pub(crate) struct Update<C: Column> {
    sets: Vec<(C, Value)>,
}

impl<C: Column> Update<C> {
    pub fn new() -> Self {
        Self { sets: Vec::new() }
    }

    pub fn set(mut self, column: C, value: impl Into<Value>) -> Self {
        self.sets.push((column, value.into()));
        self
    }

    /// Render the statement and its parameters, keys last.
    pub fn build(self, key: Vec<Value>) -> (String, Vec<Value>) {
        let mut sql = format!("UPDATE {} SET ", C::TABLE);
        let mut values = Vec::with_capacity(self.sets.len() + key.len());
        for (i, (column, value)) in self.sets.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} = ?{}", column.name(), i + 1));
            values.push(value);
        }
        for (j, key_column) in C::KEY.iter().enumerate() {
            sql.push_str(if j == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{key_column} = ?{}", values.len() + 1));
            if let Some(v) = key.get(j) {
                values.push(v.clone());
            }
        }
        (sql, values)
    }

    /// Execute against `conn`, returning the number of rows changed.
    pub fn execute(self, conn: &Connection, key: Vec<Value>) -> rusqlite::Result<usize> {
        let (sql, values) = self.build(key);
        conn.execute(&sql, params_from_iter(values.iter()))
    }
}

#[derive(Clone, Copy)]
pub(crate) enum PollColumn {
    Status,
    VotesCastCount,
    Result,
    WinningOption,
    ResultDeclaredAt,
    UpdatedAt,
}

impl Column for PollColumn {
    const TABLE: &'static str = "polls";
    const KEY: &'static [&'static str] = &["id"];

    fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::VotesCastCount => "votes_cast_count",
            Self::Result => "result",
            Self::WinningOption => "winning_option",
            Self::ResultDeclaredAt => "result_declared_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum HoldingColumn {
    SharesOwned,
    TotalValue,
    Status,
    UpdatedAt,
}

impl Column for HoldingColumn {
    const TABLE: &'static str = "share_holdings";
    const KEY: &'static [&'static str] = &["id"];

    fn name(self) -> &'static str {
        match self {
            Self::SharesOwned => "shares_owned",
            Self::TotalValue => "total_value",
            Self::Status => "status",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum MeetingColumn {
    ConferenceRoomId,
    ConferenceRoomName,
    Status,
    StartedAt,
    EndedAt,
    UpdatedAt,
}

impl Column for MeetingColumn {
    const TABLE: &'static str = "meetings";
    const KEY: &'static [&'static str] = &["id"];

    fn name(self) -> &'static str {
        match self {
            Self::ConferenceRoomId => "conference_room_id",
            Self::ConferenceRoomName => "conference_room_name",
            Self::Status => "status",
            Self::StartedAt => "started_at",
            Self::EndedAt => "ended_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum MembershipColumn {
    Role,
    UpdatedAt,
}

impl Column for MembershipColumn {
    const TABLE: &'static str = "memberships";
    const KEY: &'static [&'static str] = &["group_id", "user_id"];

    fn name(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::UpdatedAt => "updated_at",
        }
    }
}

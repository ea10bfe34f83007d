//! Database schema migration engine.
//!
//! Tracks a monotonically increasing schema version in the `meta` table and
//! runs sequential migration steps to bring an older database up to date.

use rusqlite::{params, Connection, OptionalExtension};

use crate::schema;
use crate::SqliteError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const VERSION_KEY: &str = "schema_version";

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh database (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - If the stored version is *higher* than what this code supports,
    ///   the database was written by newer code and we refuse to open it.
    pub fn run(conn: &mut Connection) -> Result<u32, SqliteError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )?;
        let current = schema_version(conn)?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::info!(version = current, "database schema is up to date");
            return Ok(current);
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(SqliteError::Schema(format!(
                "database schema version {current} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }

        let tx = conn.transaction()?;
        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(&tx, version, version + 1)?;
        }
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(CURRENT_SCHEMA_VERSION)
    }
}

/// Stored schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, SqliteError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| SqliteError::Schema(format!("unreadable schema version {v:?}"))),
    }
}

fn run_migration(conn: &Connection, from: u32, to: u32) -> Result<(), SqliteError> {
    match (from, to) {
        (0, 1) => Ok(conn.execute_batch(schema::V1_TABLES)?),
        (1, 2) => Ok(conn.execute_batch(schema::V2_CONSTRAINTS)?),
        _ => Err(SqliteError::Schema(format!("unknown migration: {from} -> {to}"))),
    }
}

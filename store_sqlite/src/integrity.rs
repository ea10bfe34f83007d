//! Database integrity checks.
//!
//! Run on startup (and by `chama-daemon check`) to detect corruption and
//! broken ledger invariants before the node starts serving requests.

use chama_store::StoreError;
use rusqlite::Connection;

use crate::error::SqlResultExt;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub tables_checked: u32,
    pub total_rows: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Tables that we expect to exist in a migrated ledger.
const EXPECTED_TABLES: &[&str] = &[
    "users",
    "chamas",
    "memberships",
    "role_changes",
    "wallets",
    "transactions",
    "polls",
    "poll_options",
    "votes",
    "role_escalations",
    "share_offerings",
    "share_holdings",
    "share_transactions",
    "dividend_declarations",
    "meetings",
    "attendance",
    "meta",
];

/// Ledger invariants: each query returns the number of violating rows.
const INVARIANTS: &[(&str, &str)] = &[
    (
        "negative wallet balance",
        "SELECT COUNT(*) FROM wallets WHERE balance < 0",
    ),
    (
        "poll vote counter differs from its option counts",
        "SELECT COUNT(*) FROM polls p
         WHERE p.votes_cast_count !=
               (SELECT COALESCE(SUM(o.vote_count), 0) FROM poll_options o WHERE o.poll_id = p.id)",
    ),
    (
        "poll vote counter differs from its valid ballots",
        "SELECT COUNT(*) FROM polls p
         WHERE p.votes_cast_count !=
               (SELECT COUNT(*) FROM votes v WHERE v.poll_id = p.id AND v.valid = 1)",
    ),
    (
        "voter hash counted twice on a poll",
        "SELECT COUNT(*) FROM (
             SELECT 1 FROM votes WHERE valid = 1
             GROUP BY poll_id, voter_hash HAVING COUNT(*) > 1)",
    ),
    (
        "holding value is not shares x unit value",
        "SELECT COUNT(*) FROM share_holdings WHERE total_value != shares_owned * share_value",
    ),
    (
        "more than one active holder of a singleton role",
        "SELECT COUNT(*) FROM (
             SELECT 1 FROM memberships
             WHERE active = 1 AND role IN ('chairperson', 'secretary', 'treasurer')
             GROUP BY group_id, role HAVING COUNT(*) > 1)",
    ),
    (
        "offering has more shares than it started with",
        "SELECT COUNT(*) FROM share_offerings WHERE total_shares > original_shares",
    ),
    (
        "wallet balance differs from the net of its ledger entries",
        "SELECT COUNT(*) FROM wallets w
         WHERE w.balance !=
               (SELECT COALESCE(SUM(t.amount), 0) FROM transactions t
                WHERE t.status = 'completed' AND t.to_wallet = w.id)
             - (SELECT COALESCE(SUM(t.amount), 0) FROM transactions t
                WHERE t.status = 'completed' AND t.from_wallet = w.id)",
    ),
    (
        "offering has more shares allocated than it issued",
        "SELECT COUNT(*) FROM share_offerings o
         WHERE (SELECT COALESCE(SUM(h.shares_owned), 0) FROM share_holdings h
                WHERE h.offering_id = o.id AND h.status = 'active') > o.original_shares",
    ),
    (
        "completed transfer debits and credits the same wallet",
        "SELECT COUNT(*) FROM transactions
         WHERE status = 'completed' AND from_wallet IS NOT NULL AND from_wallet = to_wallet",
    ),
];

/// Check database integrity.
///
/// Read failures are recorded in the report rather than causing a hard
/// error; only a failing `PRAGMA integrity_check` query itself is fatal.
pub fn check_integrity(conn: &Connection) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    let pragma: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .db()?;
    if pragma != "ok" {
        report.errors.push(format!("sqlite integrity_check: {pragma}"));
    }

    for &table in EXPECTED_TABLES {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [table],
                |row| row.get(0),
            )
            .db()?;
        if !exists {
            report.errors.push(format!("missing table '{table}'"));
            continue;
        }
        report.tables_checked += 1;
        // Table names come from the constant list above.
        match conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        }) {
            Ok(count) => report.total_rows += count.max(0) as u64,
            Err(e) => report
                .errors
                .push(format!("failed to read table '{table}': {e}")),
        }
    }

    for &(label, sql) in INVARIANTS {
        match conn.query_row(sql, [], |row| row.get::<_, i64>(0)) {
            Ok(0) => {}
            Ok(n) => report.errors.push(format!("{label}: {n} row(s)")),
            Err(e) => report.errors.push(format!("{label}: check failed: {e}")),
        }
    }

    if !report.is_healthy() {
        tracing::warn!(errors = report.errors.len(), "ledger integrity check failed");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Migrator;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        Migrator::run(&mut conn).unwrap();
        conn
    }

    #[test]
    fn fresh_database_is_healthy() {
        let report = check_integrity(&migrated()).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.tables_checked as usize, EXPECTED_TABLES.len());
    }

    #[test]
    fn detects_inconsistent_vote_counter() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO chamas VALUES ('g', 'G', 'active', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
             INSERT INTO polls VALUES ('p', 'g', 't', '', 'general', 'u', '2024-01-01T00:00:00Z',
                 '2024-01-02T00:00:00Z', 'active', 1, 1, 5000, 4, 3, 'undeclared', NULL, NULL,
                 '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');",
        )
        .unwrap();
        let report = check_integrity(&conn).unwrap();
        assert!(!report.is_healthy());
        assert!(report.errors.iter().any(|e| e.contains("option counts")));
    }

    #[test]
    fn detects_balance_without_ledger_entries() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO wallets (id, owner_kind, owner_id, balance, created_at, updated_at)
                 VALUES ('w1', 'user', 'u1', 700, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                        ('w2', 'user', 'u2', 300, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
             INSERT INTO transactions (id, kind, amount, currency, group_id, initiator, recipient,
                     from_wallet, to_wallet, status, metadata, created_at)
                 VALUES ('t1', 'contribution', 1000, 'KES', NULL, 'u1', 'u1', NULL, 'w1',
                         'completed', '{}', '2024-01-01T00:00:00Z'),
                        ('t2', 'transfer', 300, 'KES', NULL, 'u1', 'u2', 'w1', 'w2',
                         'completed', '{}', '2024-01-01T00:00:00Z');",
        )
        .unwrap();
        assert!(check_integrity(&conn).unwrap().is_healthy());

        conn.execute("UPDATE wallets SET balance = 900 WHERE id = 'w2'", [])
            .unwrap();
        let report = check_integrity(&conn).unwrap();
        assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
        assert!(report.errors[0].starts_with("wallet balance differs"));
    }

    #[test]
    fn detects_over_allocated_offering() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO chamas VALUES ('g', 'G', 'active', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
             INSERT INTO share_offerings (id, group_id, name, kind, total_shares, original_shares,
                     price_per_share, minimum_purchase, status, created_by, created_at, updated_at)
                 VALUES ('o', 'g', 'O', 'ordinary', 4, 10, 5, 1, 'active', 'u',
                         '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
             INSERT INTO share_holdings (id, group_id, member_id, offering_id, offering_name, kind,
                     shares_owned, share_value, total_value, certificate_number, purchase_date,
                     status, created_at, updated_at)
                 VALUES ('h1', 'g', 'a', 'o', 'O', 'ordinary', 6, 5, 30, 'c1',
                         '2024-01-01T00:00:00Z', 'active', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                        ('h2', 'g', 'b', 'o', 'O', 'ordinary', 6, 5, 30, 'c2',
                         '2024-01-01T00:00:00Z', 'transferred', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');",
        )
        .unwrap();
        // Retired holdings do not count toward the allocation.
        assert!(check_integrity(&conn).unwrap().is_healthy());

        conn.execute("UPDATE share_holdings SET status = 'active' WHERE id = 'h2'", [])
            .unwrap();
        let report = check_integrity(&conn).unwrap();
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("offering has more shares allocated")));
    }

    #[test]
    fn missing_tables_are_reported() {
        let conn = Connection::open_in_memory().unwrap();
        let report = check_integrity(&conn).unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.tables_checked, 0);
    }

    #[test]
    fn report_health() {
        let report = IntegrityReport {
            tables_checked: 5,
            total_rows: 100,
            errors: vec!["corruption detected".to_string()],
        };
        assert!(!report.is_healthy());
        assert!(IntegrityReport::default().is_healthy());
    }
}

use chama_store::{StoreError, TransactionLog, TransactionRecord};
use chama_types::{GroupId, TransactionId, WalletId};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{amount, money, parsed, parsed_opt, ts};
use crate::error::SqlResultExt;
use crate::SqliteTxn;

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let metadata: String = row.get("metadata")?;
    let metadata = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
    })?;
    Ok(TransactionRecord {
        id: parsed(row, "id")?,
        kind: parsed(row, "kind")?,
        amount: amount(row, "amount")?,
        currency: row.get("currency")?,
        group: parsed_opt(row, "group_id")?,
        initiator: parsed(row, "initiator")?,
        recipient: parsed_opt(row, "recipient")?,
        from_wallet: parsed_opt(row, "from_wallet")?,
        to_wallet: parsed_opt(row, "to_wallet")?,
        status: parsed(row, "status")?,
        metadata,
        created_at: parsed(row, "created_at")?,
    })
}

impl TransactionLog for SqliteTxn<'_> {
    fn append_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&tx.metadata)?;
        self.conn
            .execute(
                "INSERT INTO transactions
                    (id, kind, amount, currency, group_id, initiator, recipient,
                     from_wallet, to_wallet, status, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    tx.id.to_string(),
                    tx.kind.as_str(),
                    money(tx.amount)?,
                    tx.currency,
                    tx.group.map(|g| g.to_string()),
                    tx.initiator.to_string(),
                    tx.recipient.map(|u| u.to_string()),
                    tx.from_wallet.map(|w| w.to_string()),
                    tx.to_wallet.map(|w| w.to_string()),
                    tx.status.as_str(),
                    metadata,
                    ts(tx.created_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_transaction(&mut self, id: &TransactionId) -> Result<TransactionRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM transactions WHERE id = ?1",
                params![id.to_string()],
                transaction_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    fn transactions_for_wallet(
        &mut self,
        wallet: &WalletId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM transactions WHERE from_wallet = ?1 OR to_wallet = ?1
                 ORDER BY created_at, rowid",
            )
            .db()?;
        let rows = stmt
            .query_map(params![wallet.to_string()], transaction_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn transactions_for_group(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM transactions WHERE group_id = ?1 ORDER BY created_at, rowid")
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string()], transaction_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

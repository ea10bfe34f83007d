use chama_store::{StoreError, WalletRecord, WalletStore};
use chama_types::{Amount, GroupId, Timestamp, UserId, WalletId, WalletKind, WalletOwner};
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{amount, money, parsed, ts};
use crate::error::SqlResultExt;
use crate::SqliteTxn;

fn owner_columns(owner: &WalletOwner) -> (&'static str, String) {
    match owner {
        WalletOwner::User(id) => (WalletKind::Personal.as_str(), id.to_string()),
        WalletOwner::Group(id) => (WalletKind::Group.as_str(), id.to_string()),
    }
}

fn wallet_from_row(row: &Row<'_>) -> rusqlite::Result<WalletRecord> {
    let kind: WalletKind = parsed(row, "owner_kind")?;
    let owner = match kind {
        WalletKind::Personal => WalletOwner::User(parsed::<UserId>(row, "owner_id")?),
        WalletKind::Group => WalletOwner::Group(parsed::<GroupId>(row, "owner_id")?),
    };
    Ok(WalletRecord {
        id: parsed(row, "id")?,
        owner,
        balance: amount(row, "balance")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

impl SqliteTxn<'_> {
    fn balance_of(&self, id: &WalletId) -> Result<Amount, StoreError> {
        self.conn
            .query_row(
                "SELECT balance FROM wallets WHERE id = ?1",
                params![id.to_string()],
                |row| amount(row, "balance"),
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("wallet", id))
    }
}

impl WalletStore for SqliteTxn<'_> {
    fn insert_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        let (kind, owner_id) = owner_columns(&wallet.owner);
        self.conn
            .execute(
                "INSERT INTO wallets (id, owner_kind, owner_id, balance, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    wallet.id.to_string(),
                    kind,
                    owner_id,
                    money(wallet.balance)?,
                    ts(wallet.created_at),
                    ts(wallet.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_wallet(&mut self, id: &WalletId) -> Result<WalletRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM wallets WHERE id = ?1",
                params![id.to_string()],
                wallet_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("wallet", id))
    }

    fn wallet_for_owner(&mut self, owner: &WalletOwner) -> Result<Option<WalletRecord>, StoreError> {
        let (kind, owner_id) = owner_columns(owner);
        self.conn
            .query_row(
                "SELECT * FROM wallets WHERE owner_kind = ?1 AND owner_id = ?2",
                params![kind, owner_id],
                wallet_from_row,
            )
            .optional()
            .db()
    }

    fn credit(&mut self, id: &WalletId, value: Amount, at: Timestamp) -> Result<Amount, StoreError> {
        let balance = self.balance_of(id)?;
        let next = balance.checked_add(value).ok_or_else(|| {
            StoreError::Constraint(format!("balance overflow crediting wallet {id}"))
        })?;
        self.conn
            .execute(
                "UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE id = ?3",
                params![money(next)?, ts(at), id.to_string()],
            )
            .db()?;
        Ok(next)
    }

    fn debit(&mut self, id: &WalletId, value: Amount, at: Timestamp) -> Result<Amount, StoreError> {
        let balance = self.balance_of(id)?;
        let next = balance
            .checked_sub(value)
            .ok_or_else(|| StoreError::InsufficientFunds {
                wallet: id.to_string(),
                needed: value.minor(),
                available: balance.minor(),
            })?;
        self.conn
            .execute(
                "UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE id = ?3",
                params![money(next)?, ts(at), id.to_string()],
            )
            .db()?;
        Ok(next)
    }

    fn list_wallets(&mut self) -> Result<Vec<WalletRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM wallets ORDER BY created_at, id")
            .db()?;
        let rows = stmt.query_map([], wallet_from_row).db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

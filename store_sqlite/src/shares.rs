use chama_store::{
    DividendDeclarationRecord, ShareHoldingRecord, ShareOfferingRecord, ShareStore,
    ShareTransactionRecord, StoreError,
};
use chama_types::{
    DividendId, DividendStatus, GroupId, HoldingId, OfferingId, OfferingStatus, Timestamp, UserId,
};
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{amount, int, money, parsed, parsed_opt, ts, unsigned};
use crate::error::SqlResultExt;
use crate::query::{HoldingColumn, Update};
use crate::SqliteTxn;

fn offering_from_row(row: &Row<'_>) -> rusqlite::Result<ShareOfferingRecord> {
    Ok(ShareOfferingRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        name: row.get("name")?,
        kind: parsed(row, "kind")?,
        total_shares: unsigned(row, "total_shares")?,
        original_shares: unsigned(row, "original_shares")?,
        price_per_share: amount(row, "price_per_share")?,
        minimum_purchase: unsigned(row, "minimum_purchase")?,
        status: parsed(row, "status")?,
        created_by: parsed(row, "created_by")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn holding_from_row(row: &Row<'_>) -> rusqlite::Result<ShareHoldingRecord> {
    Ok(ShareHoldingRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        member: parsed(row, "member_id")?,
        offering: parsed_opt(row, "offering_id")?,
        offering_name: row.get("offering_name")?,
        kind: parsed(row, "kind")?,
        shares_owned: unsigned(row, "shares_owned")?,
        share_value: amount(row, "share_value")?,
        total_value: amount(row, "total_value")?,
        certificate_number: row.get("certificate_number")?,
        purchase_date: parsed(row, "purchase_date")?,
        status: parsed(row, "status")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn share_tx_from_row(row: &Row<'_>) -> rusqlite::Result<ShareTransactionRecord> {
    Ok(ShareTransactionRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        from_member: parsed_opt(row, "from_member")?,
        to_member: parsed_opt(row, "to_member")?,
        holding: parsed_opt(row, "holding_id")?,
        kind: parsed(row, "kind")?,
        shares_count: unsigned(row, "shares_count")?,
        unit_value: amount(row, "unit_value")?,
        total_amount: amount(row, "total_amount")?,
        date: parsed(row, "date")?,
        status: parsed(row, "status")?,
        created_at: parsed(row, "created_at")?,
    })
}

fn dividend_from_row(row: &Row<'_>) -> rusqlite::Result<DividendDeclarationRecord> {
    Ok(DividendDeclarationRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        declaration_date: parsed(row, "declaration_date")?,
        per_share_amount: amount(row, "per_share_amount")?,
        total_amount: amount(row, "total_amount")?,
        status: parsed(row, "status")?,
        declared_by: parsed(row, "declared_by")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

impl SqliteTxn<'_> {
    fn holdings_where(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ShareHoldingRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).db()?;
        let rows = stmt.query_map(args, holding_from_row).db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

impl ShareStore for SqliteTxn<'_> {
    fn insert_offering(&mut self, o: &ShareOfferingRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO share_offerings
                    (id, group_id, name, kind, total_shares, original_shares, price_per_share,
                     minimum_purchase, status, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    o.id.to_string(),
                    o.group.to_string(),
                    o.name,
                    o.kind.as_str(),
                    int(o.total_shares)?,
                    int(o.original_shares)?,
                    money(o.price_per_share)?,
                    int(o.minimum_purchase)?,
                    o.status.as_str(),
                    o.created_by.to_string(),
                    ts(o.created_at),
                    ts(o.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_offering(&mut self, id: &OfferingId) -> Result<ShareOfferingRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM share_offerings WHERE id = ?1",
                params![id.to_string()],
                offering_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("share offering", id))
    }

    fn list_offerings(
        &mut self,
        group: &GroupId,
        status: Option<OfferingStatus>,
    ) -> Result<Vec<ShareOfferingRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM share_offerings WHERE group_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at, rowid",
            )
            .db()?;
        let rows = stmt
            .query_map(
                params![group.to_string(), status.map(|s| s.as_str())],
                offering_from_row,
            )
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn take_offering_shares(
        &mut self,
        id: &OfferingId,
        quantity: u64,
        at: Timestamp,
    ) -> Result<ShareOfferingRecord, StoreError> {
        let mut offering = self.get_offering(id)?;
        let remaining = offering
            .total_shares
            .checked_sub(quantity)
            .ok_or(StoreError::InsufficientShares {
                requested: quantity,
                available: offering.total_shares,
            })?;
        offering.total_shares = remaining;
        if remaining == 0 {
            offering.status = OfferingStatus::Exhausted;
        }
        offering.updated_at = at;
        self.conn
            .execute(
                "UPDATE share_offerings SET total_shares = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    int(remaining)?,
                    offering.status.as_str(),
                    ts(at),
                    id.to_string()
                ],
            )
            .db()?;
        Ok(offering)
    }

    fn set_offering_status(
        &mut self,
        id: &OfferingId,
        status: OfferingStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE share_offerings SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(at), id.to_string()],
            )
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("share offering", id));
        }
        Ok(())
    }

    fn insert_holding(&mut self, h: &ShareHoldingRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO share_holdings
                    (id, group_id, member_id, offering_id, offering_name, kind, shares_owned,
                     share_value, total_value, certificate_number, purchase_date, status,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    h.id.to_string(),
                    h.group.to_string(),
                    h.member.to_string(),
                    h.offering.map(|o| o.to_string()),
                    h.offering_name,
                    h.kind.as_str(),
                    int(h.shares_owned)?,
                    money(h.share_value)?,
                    money(h.total_value)?,
                    h.certificate_number,
                    ts(h.purchase_date),
                    h.status.as_str(),
                    ts(h.created_at),
                    ts(h.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_holding(&mut self, id: &HoldingId) -> Result<ShareHoldingRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM share_holdings WHERE id = ?1",
                params![id.to_string()],
                holding_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("share holding", id))
    }

    fn update_holding(&mut self, h: &ShareHoldingRecord) -> Result<(), StoreError> {
        let changed = Update::new()
            .set(HoldingColumn::SharesOwned, int(h.shares_owned)?)
            .set(HoldingColumn::TotalValue, money(h.total_value)?)
            .set(HoldingColumn::Status, h.status.as_str().to_string())
            .set(HoldingColumn::UpdatedAt, ts(h.updated_at))
            .execute(self.conn, vec![Value::from(h.id.to_string())])
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("share holding", h.id));
        }
        Ok(())
    }

    fn holdings_for_member(
        &mut self,
        group: &GroupId,
        member: &UserId,
    ) -> Result<Vec<ShareHoldingRecord>, StoreError> {
        self.holdings_where(
            "SELECT * FROM share_holdings WHERE group_id = ?1 AND member_id = ?2
             ORDER BY purchase_date, rowid",
            &[&group.to_string(), &member.to_string()],
        )
    }

    fn holdings_for_group(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<ShareHoldingRecord>, StoreError> {
        self.holdings_where(
            "SELECT * FROM share_holdings WHERE group_id = ?1 ORDER BY purchase_date, rowid",
            &[&group.to_string()],
        )
    }

    fn append_share_transaction(&mut self, t: &ShareTransactionRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO share_transactions
                    (id, group_id, from_member, to_member, holding_id, kind, shares_count,
                     unit_value, total_amount, date, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    t.id.to_string(),
                    t.group.to_string(),
                    t.from_member.map(|u| u.to_string()),
                    t.to_member.map(|u| u.to_string()),
                    t.holding.map(|h| h.to_string()),
                    t.kind.as_str(),
                    int(t.shares_count)?,
                    money(t.unit_value)?,
                    money(t.total_amount)?,
                    ts(t.date),
                    t.status.as_str(),
                    ts(t.created_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn share_transactions(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<ShareTransactionRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM share_transactions WHERE group_id = ?1 ORDER BY created_at, rowid")
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string()], share_tx_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }

    fn insert_dividend(&mut self, d: &DividendDeclarationRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO dividend_declarations
                    (id, group_id, declaration_date, per_share_amount, total_amount, status,
                     declared_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    d.id.to_string(),
                    d.group.to_string(),
                    ts(d.declaration_date),
                    money(d.per_share_amount)?,
                    money(d.total_amount)?,
                    d.status.as_str(),
                    d.declared_by.to_string(),
                    ts(d.created_at),
                    ts(d.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_dividend(&mut self, id: &DividendId) -> Result<DividendDeclarationRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM dividend_declarations WHERE id = ?1",
                params![id.to_string()],
                dividend_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("dividend declaration", id))
    }

    fn set_dividend_status(
        &mut self,
        id: &DividendId,
        status: DividendStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE dividend_declarations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(at), id.to_string()],
            )
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("dividend declaration", id));
        }
        Ok(())
    }

    fn list_dividends(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<DividendDeclarationRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM dividend_declarations WHERE group_id = ?1
                 ORDER BY declaration_date, rowid",
            )
            .db()?;
        let rows = stmt
            .query_map(params![group.to_string()], dividend_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

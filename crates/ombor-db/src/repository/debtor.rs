//! # Debtor Repository
//!
//! Customers buying on credit, and their append-only ledger.
//!
//! ## Balance Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  path                         entry type    clamp                       │
//! │  ───────────────────────────  ──────────    ─────                       │
//! │  create with opening balance  adjustment    no                          │
//! │  PUT debtAmount               adjustment    no (delta = new − old)      │
//! │  PATCH /debt  add             adjustment    no                          │
//! │  PATCH /debt  subtract        payment       floor at 0                  │
//! │  credit sale created          sale          no                          │
//! │  credit sale deleted          refund        no                          │
//! │                                                                         │
//! │  After every path: debt_amount = Σ entries, status = paid iff ≤ 0      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use ombor_core::report::DebtorStats;
use ombor_core::validation::{
    validate_debt_change, validate_debtor_patch, validate_new_debtor, validate_search_query,
};
use ombor_core::{
    CoreError, DebtChange, Debtor, DebtorFilter, DebtorPatch, LedgerEntry, Money, NewDebtor,
    ValidationError, DEBTOR_SEARCH_LIMIT,
};

use crate::error::{DbError, DbResult};
use crate::protocol::{self, lock_row, post_debtor_delta, LockTable};
use crate::repository::{begin, commit, generate_id, like_pattern};

#[derive(Debug, Clone)]
pub struct DebtorRepository {
    pool: SqlitePool,
}

impl DebtorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DebtorRepository { pool }
    }

    /// Lists debtors, newest first. Ledgers are not loaded.
    pub async fn list(&self, filter: &DebtorFilter) -> DbResult<Vec<Debtor>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let debtors = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT * FROM debtors
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\' OR phone LIKE ?2 ESCAPE '\')
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        Ok(debtors)
    }

    /// Debtors who currently owe something.
    pub async fn active(&self) -> DbResult<Vec<Debtor>> {
        let debtors = sqlx::query_as::<_, Debtor>(
            "SELECT * FROM debtors WHERE debt_amount > 0 ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(debtors)
    }

    /// Matches name, phone or notes; largest debts first.
    ///
    /// ## Errors
    /// * `Validation(Required)` - empty query
    pub async fn search(&self, query: &str) -> DbResult<Vec<Debtor>> {
        let query = validate_search_query(query)?.ok_or_else(|| ValidationError::Required {
            field: "query".to_string(),
        })?;

        debug!(query = %query, "Searching debtors");

        let debtors = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT * FROM debtors
            WHERE name LIKE ?1 ESCAPE '\' OR phone LIKE ?1 ESCAPE '\' OR notes LIKE ?1 ESCAPE '\'
            ORDER BY debt_amount DESC
            LIMIT ?2
            "#,
        )
        .bind(like_pattern(&query))
        .bind(DEBTOR_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(debtors)
    }

    /// Gets a debtor with the full ledger, oldest entry first.
    pub async fn get(&self, id: &str) -> DbResult<Debtor> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Creates a debtor. A non-zero opening balance becomes the first
    /// ledger entry.
    pub async fn create(&self, input: &NewDebtor) -> DbResult<Debtor> {
        validate_new_debtor(input)?;

        let id = generate_id();
        let now = Utc::now();
        let phone = input.phone.trim();

        let mut tx = begin(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO debtors (
                id, name, phone, debt_amount, max_debt_amount, notes, status,
                last_transaction_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5, 'paid', ?6, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(phone)
        .bind(input.max_debt_amount.unwrap_or_default())
        .bind(input.notes.as_deref().unwrap_or_default().trim())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("phone", phone))?;

        let opening = input.debt_amount.unwrap_or_default();
        if !opening.is_zero() {
            let entry = LedgerEntry::adjustment(opening, "Opening balance", now);
            post_debtor_delta(&mut tx, &id, &entry).await?;
        }

        let debtor = load(&mut tx, &id).await?;
        commit(tx).await?;

        info!(id = %id, name = %debtor.name, balance = %debtor.debt_amount, "Debtor created");
        Ok(debtor)
    }

    /// Updates contact fields. A new `debtAmount` is applied as an
    /// adjustment entry for the difference, so the ledger still sums to it.
    pub async fn update(&self, id: &str, patch: &DebtorPatch) -> DbResult<Debtor> {
        validate_debtor_patch(patch)?;

        let now = Utc::now();
        let phone = patch.phone.as_deref().map(str::trim);

        let mut tx = begin(&self.pool).await?;

        if !lock_row(&mut tx, LockTable::Debtors, id).await? {
            return Err(CoreError::DebtorNotFound(id.to_string()).into());
        }

        sqlx::query(
            r#"
            UPDATE debtors SET
                name = COALESCE(?1, name),
                phone = COALESCE(?2, phone),
                max_debt_amount = COALESCE(?3, max_debt_amount),
                notes = COALESCE(?4, notes),
                updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(patch.name.as_deref().map(str::trim))
        .bind(phone)
        .bind(patch.max_debt_amount)
        .bind(patch.notes.as_deref().map(str::trim))
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("phone", phone.unwrap_or_default()))?;

        if let Some(target) = patch.debt_amount {
            let current: Money = sqlx::query_scalar("SELECT debt_amount FROM debtors WHERE id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

            let delta = target - current;
            if !delta.is_zero() {
                let entry = LedgerEntry::adjustment(delta, "Balance edited", now);
                post_debtor_delta(&mut tx, id, &entry).await?;
                debug!(id = %id, from = %current, to = %target, "Debtor balance edited");
            }
        }

        let debtor = load(&mut tx, id).await?;
        commit(tx).await?;
        Ok(debtor)
    }

    /// Deletes a debtor and its ledger. Their sales keep the `debtorId`.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM debtors WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DebtorNotFound(id.to_string()).into());
        }

        info!(id = %id, "Debtor deleted");
        Ok(())
    }

    /// Manual debt change (`PATCH /api/debtors/{id}/debt`).
    ///
    /// `add` raises the balance; `subtract` lowers it but never below zero.
    /// The ledger entry records the delta actually applied.
    pub async fn adjust_debt(&self, id: &str, change: &DebtChange) -> DbResult<Debtor> {
        validate_debt_change(change)?;

        let mut tx = begin(&self.pool).await?;
        let entry = protocol::adjust_debt(&mut tx, id, change, Utc::now()).await?;
        let debtor = load(&mut tx, id).await?;
        commit(tx).await?;

        info!(
            id = %id,
            kind = ?entry.kind,
            applied = %entry.amount,
            balance = %debtor.debt_amount,
            "Debtor balance changed"
        );
        Ok(debtor)
    }

    pub async fn stats(&self) -> DbResult<DebtorStats> {
        let (total, active, total_debt): (i64, i64, Money) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN debt_amount > 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(debt_amount), 0)
            FROM debtors
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DebtorStats::new(total, active, total_debt))
    }
}

/// Loads a debtor and its ledger on one connection.
pub(crate) async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Debtor> {
    let mut debtor = sqlx::query_as::<_, Debtor>("SELECT * FROM debtors WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::DebtorNotFound(id.to_string()))?;

    debtor.transactions = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT id, amount, kind, notes, date, sale_id, created_by
        FROM debtor_entries
        WHERE debtor_id = ?1
        ORDER BY seq
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(debtor)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, debtor};
    use ombor_core::ledger::ledger_balance;
    use ombor_core::{DebtDirection, DebtorStatus, LedgerEntryType};

    fn change(direction: DebtDirection, amount: i64) -> DebtChange {
        DebtChange {
            amount: Money::from_minor(amount),
            direction,
            notes: None,
        }
    }

    fn assert_consistent(d: &Debtor) {
        assert_eq!(d.status, DebtorStatus::from_balance(d.debt_amount));
        assert_eq!(ledger_balance(&d.transactions), d.debt_amount);
    }

    #[tokio::test]
    async fn test_create_without_balance_is_paid() {
        let db = db().await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        assert_eq!(d.status, DebtorStatus::Paid);
        assert!(d.transactions.is_empty());
        assert_consistent(&d);
    }

    #[tokio::test]
    async fn test_opening_balance_is_an_adjustment_entry() {
        let db = db().await;
        let d = debtor(&db, "Vali", "+998901112244", 7000).await;

        assert_eq!(d.debt_amount.minor(), 7000);
        assert_eq!(d.status, DebtorStatus::Active);
        assert_eq!(d.transactions.len(), 1);
        assert_eq!(d.transactions[0].kind, LedgerEntryType::Adjustment);
        assert_consistent(&d);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let db = db().await;
        debtor(&db, "Ali", "+998901112233", 0).await;

        let err = db
            .debtors()
            .create(&NewDebtor {
                name: "Other".into(),
                phone: "+998901112233".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: phone '+998901112233' already exists"
        );
    }

    #[tokio::test]
    async fn test_subtract_clamps_at_zero_and_records_applied_delta() {
        let db = db().await;
        let d = debtor(&db, "Ali", "+998901112233", 5000).await;

        let d = db
            .debtors()
            .adjust_debt(&d.id, &change(DebtDirection::Subtract, 8000))
            .await
            .unwrap();

        assert!(d.debt_amount.is_zero());
        assert_eq!(d.status, DebtorStatus::Paid);
        let last = d.transactions.last().unwrap();
        assert_eq!(last.kind, LedgerEntryType::Payment);
        assert_eq!(last.amount.minor(), -5000);
        assert_eq!(last.notes, "Payment received");
        assert_consistent(&d);
    }

    #[tokio::test]
    async fn test_add_raises_balance() {
        let db = db().await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        let d = db
            .debtors()
            .adjust_debt(
                &d.id,
                &DebtChange {
                    amount: Money::from_minor(2500),
                    direction: DebtDirection::Add,
                    notes: Some("Non uchun".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(d.debt_amount.minor(), 2500);
        assert_eq!(d.status, DebtorStatus::Active);
        assert_eq!(d.transactions[0].notes, "Non uchun");
        assert_consistent(&d);
    }

    #[tokio::test]
    async fn test_adjust_missing_debtor_is_not_found() {
        let db = db().await;
        let err = db
            .debtors()
            .adjust_debt("missing", &change(DebtDirection::Add, 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_balance_edit_keeps_ledger_in_sync() {
        let db = db().await;
        let d = debtor(&db, "Ali", "+998901112233", 3000).await;

        let d = db
            .debtors()
            .update(
                &d.id,
                &DebtorPatch {
                    debt_amount: Some(Money::zero()),
                    notes: Some("settled".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(d.debt_amount.is_zero());
        assert_eq!(d.status, DebtorStatus::Paid);
        assert_eq!(d.notes, "settled");
        assert_eq!(d.transactions.len(), 2);
        assert_consistent(&d);
    }

    #[tokio::test]
    async fn test_list_search_active_and_stats() {
        let db = db().await;
        debtor(&db, "Ali Valiyev", "+998901110001", 4000).await;
        debtor(&db, "Bobur", "+998901110002", 0).await;
        debtor(&db, "Aziz", "+998901110003", 2000).await;

        let repo = db.debtors();

        assert_eq!(repo.active().await.unwrap().len(), 2);

        let paid = repo
            .list(&DebtorFilter {
                status: Some(DebtorStatus::Paid),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].name, "Bobur");

        let found = repo.search("a").await.unwrap();
        assert_eq!(found[0].name, "Ali Valiyev");

        assert!(repo.search("   ").await.is_err());

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_debtors, 3);
        assert_eq!(stats.active_debtors, 2);
        assert_eq!(stats.paid_debtors, 1);
        assert_eq!(stats.total_debt.minor(), 6000);
        assert_eq!(stats.average_debt.minor(), 3000);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let db = db().await;
        let d = debtor(&db, "Ali", "+998901112233", 100).await;

        db.debtors().delete(&d.id).await.unwrap();
        assert!(db.debtors().delete(&d.id).await.unwrap_err().is_not_found());

        let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM debtor_entries")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(entries, 0);
    }
}

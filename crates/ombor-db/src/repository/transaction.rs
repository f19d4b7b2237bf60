//! # Transaction Repository
//!
//! Generic stock events: sales, purchases from suppliers, customer returns.
//!
//! ## Stock Direction
//! ```text
//! ┌──────────┬───────────────────────┬────────────────────────────────┐
//! │ type     │ create                │ delete (reversal)              │
//! ├──────────┼───────────────────────┼────────────────────────────────┤
//! │ sale     │ qty − n (checked)     │ qty + n                        │
//! │ purchase │ qty + n               │ qty − n (may go negative)      │
//! │ return   │ qty + n               │ qty − n (may go negative)      │
//! └──────────┴───────────────────────┴────────────────────────────────┘
//! ```
//!
//! Totals are computed here, never taken from the request:
//! `total_amount = Σ qty×price`, `total_cost = Σ qty×product.cost`,
//! `profit = total_amount − total_cost`.

use chrono::{DateTime, Local, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use ombor_core::ledger::{RecordKind, RecordTotals};
use ombor_core::report::{
    sales_report, DateRange, ReportSample, SalesReportRow, TimeBucket, TransactionStats,
};
use ombor_core::validation::{validate_new_transaction, validate_phone};
use ombor_core::{
    Money, NewTransaction, Transaction, TransactionFilter, TransactionItem, TransactionPatch,
};

use crate::error::DbResult;
use crate::protocol::{apply_request, lock_record, reverse_record};
use crate::repository::{begin, commit, generate_id};

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Transactions matching the filter, newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;

        let mut transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
              AND (?3 IS NULL OR kind = ?3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.kind)
        .fetch_all(&mut *conn)
        .await?;

        for transaction in transactions.iter_mut() {
            transaction.items = items_of(&mut conn, &transaction.id).await?;
        }
        Ok(transactions)
    }

    /// Transactions since local midnight.
    pub async fn today(&self) -> DbResult<Vec<Transaction>> {
        self.list(&TransactionFilter {
            range: DateRange::day_of(Local::now()),
            kind: None,
        })
        .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Transaction> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Records a transaction and moves stock atomically.
    ///
    /// ## Errors
    /// * `Validation` - no lines or a bad quantity
    /// * `ProductNotFound` / `InsufficientStock` - nothing is changed
    pub async fn create(&self, input: &NewTransaction) -> DbResult<Transaction> {
        validate_new_transaction(input)?;
        if let Some(phone) = non_blank(input.customer_phone.as_deref()) {
            validate_phone(phone)?;
        }

        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let lines = apply_request(&mut tx, input, now).await?;
        let totals = RecordTotals::compute(&lines.iter().map(|l| l.priced()).collect::<Vec<_>>())?;

        let transaction = Transaction {
            id: generate_id(),
            kind: input.kind,
            items: lines
                .iter()
                .map(|line| TransactionItem {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    price: line.price,
                    total: line.total(),
                })
                .collect(),
            total_amount: totals.total_amount,
            total_cost: totals.total_cost,
            profit: totals.profit,
            customer_name: non_blank(input.customer_name.as_deref()).map(String::from),
            customer_phone: non_blank(input.customer_phone.as_deref()).map(String::from),
            notes: non_blank(input.notes.as_deref()).map(String::from),
            created_at: now,
            updated_at: now,
        };

        insert(&mut tx, &transaction).await?;
        commit(tx).await?;

        info!(
            id = %transaction.id,
            kind = transaction.kind.as_str(),
            total = %transaction.total_amount,
            profit = %transaction.profit,
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Changes customer name, phone or notes. Blank values keep the
    /// stored one; financial fields never change.
    pub async fn update(&self, id: &str, patch: &TransactionPatch) -> DbResult<Transaction> {
        let phone = non_blank(patch.customer_phone.as_deref());
        if let Some(phone) = phone {
            validate_phone(phone)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                customer_name = COALESCE(?1, customer_name),
                customer_phone = COALESCE(?2, customer_phone),
                notes = COALESCE(?3, notes),
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(non_blank(patch.customer_name.as_deref()))
        .bind(phone)
        .bind(non_blank(patch.notes.as_deref()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecordKind::Transaction.not_found(id).into());
        }
        self.get(id).await
    }

    /// Deletes a transaction after reversing its stock movement.
    pub async fn delete(&self, id: &str) -> DbResult<Transaction> {
        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        lock_record(&mut tx, RecordKind::Transaction, id).await?;
        let transaction = load(&mut tx, id).await?;
        let reversal = reverse_record(&mut tx, &transaction, now).await?;

        sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        commit(tx).await?;

        info!(
            id = %id,
            kind = transaction.kind.as_str(),
            lines_reversed = reversal.lines_reversed,
            "Transaction deleted"
        );
        Ok(transaction)
    }

    /// Totals by type. `total_profit` sums every type.
    pub async fn stats(&self, range: &DateRange) -> DbResult<TransactionStats> {
        let stats = sqlx::query_as::<_, TransactionStats>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'sale' THEN total_amount ELSE 0 END), 0) AS total_sales,
                COALESCE(SUM(CASE WHEN kind = 'purchase' THEN total_amount ELSE 0 END), 0) AS total_purchases,
                COALESCE(SUM(profit), 0) AS total_profit,
                COUNT(*) AS total_transactions,
                COALESCE(SUM(CASE WHEN kind = 'sale' THEN 1 ELSE 0 END), 0) AS sale_count,
                COALESCE(SUM(CASE WHEN kind = 'purchase' THEN 1 ELSE 0 END), 0) AS purchase_count,
                COALESCE(SUM(CASE WHEN kind = 'return' THEN 1 ELSE 0 END), 0) AS return_count
            FROM transactions
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Sale-type transactions grouped by day, month or year, newest first.
    pub async fn sales_report(
        &self,
        bucket: TimeBucket,
        range: &DateRange,
    ) -> DbResult<Vec<SalesReportRow>> {
        let rows: Vec<(DateTime<Utc>, Money, Money)> = sqlx::query_as(
            r#"
            SELECT created_at, total_amount, profit FROM transactions
            WHERE kind = 'sale'
              AND (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales_report(
            bucket,
            rows.into_iter().map(|(at, amount, profit)| ReportSample { at, amount, profit }),
        ))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn insert(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, kind, total_amount, total_cost, profit,
            customer_name, customer_phone, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
    )
    .bind(&transaction.id)
    .bind(transaction.kind)
    .bind(transaction.total_amount)
    .bind(transaction.total_cost)
    .bind(transaction.profit)
    .bind(&transaction.customer_name)
    .bind(&transaction.customer_phone)
    .bind(&transaction.notes)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?;

    for item in &transaction.items {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (transaction_id, product_id, quantity, price, total)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&transaction.id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Transaction> {
    let mut transaction =
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RecordKind::Transaction.not_found(id))?;

    transaction.items = items_of(conn, id).await?;
    Ok(transaction)
}

async fn items_of(conn: &mut SqliteConnection, transaction_id: &str) -> DbResult<Vec<TransactionItem>> {
    let items = sqlx::query_as::<_, TransactionItem>(
        r#"
        SELECT product_id, quantity, price, total
        FROM transaction_items
        WHERE transaction_id = ?1
        ORDER BY seq
        "#,
    )
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{category, db, product, quantity};
    use crate::DbError;
    use ombor_core::{CoreError, LineInput, TransactionType};

    fn request(kind: TransactionType, product: &str, qty: i64, price: Option<i64>) -> NewTransaction {
        NewTransaction {
            kind,
            items: vec![LineInput {
                product: product.to_string(),
                quantity: qty,
                price: price.map(Money::from_minor),
                product_name: None,
            }],
            customer_name: None,
            customer_phone: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_sale_transaction_totals_and_profit() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        let t = db
            .transactions()
            .create(&request(TransactionType::Sale, &p.id, 3, Some(1000)))
            .await
            .unwrap();

        assert_eq!(quantity(&db, &p.id).await, 7);
        assert_eq!(t.total_amount.minor(), 3000);
        assert_eq!(t.total_cost.minor(), 1800);
        assert_eq!(t.profit.minor(), 1200);
        assert_eq!(t.items[0].total.minor(), 3000);

        let stored = db.transactions().get(&t.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.profit, t.profit);
    }

    #[tokio::test]
    async fn test_sale_transaction_checks_stock() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 2, 1000, 600).await;

        let err = db
            .transactions()
            .create(&request(TransactionType::Sale, &p.id, 3, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));
        assert_eq!(quantity(&db, &p.id).await, 2);
    }

    #[tokio::test]
    async fn test_purchase_reversal_may_go_negative() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 0, 1000, 600).await;

        let purchase = db
            .transactions()
            .create(&request(TransactionType::Purchase, &p.id, 10, Some(600)))
            .await
            .unwrap();
        assert_eq!(quantity(&db, &p.id).await, 10);

        db.transactions()
            .create(&request(TransactionType::Sale, &p.id, 8, None))
            .await
            .unwrap();
        assert_eq!(quantity(&db, &p.id).await, 2);

        db.transactions().delete(&purchase.id).await.unwrap();
        assert_eq!(quantity(&db, &p.id).await, -8);

        let again = db.transactions().delete(&purchase.id).await.unwrap_err();
        assert!(again.is_not_found());
        assert_eq!(quantity(&db, &p.id).await, -8);
    }

    #[tokio::test]
    async fn test_return_adds_stock_and_delete_removes_it() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 5, 1000, 600).await;

        let ret = db
            .transactions()
            .create(&request(TransactionType::Return, &p.id, 2, None))
            .await
            .unwrap();
        assert_eq!(quantity(&db, &p.id).await, 7);
        assert_eq!(ret.total_amount.minor(), 2000);

        db.transactions().delete(&ret.id).await.unwrap();
        assert_eq!(quantity(&db, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_update_keeps_blank_fields() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 5, 1000, 600).await;

        let mut input = request(TransactionType::Sale, &p.id, 1, None);
        input.customer_name = Some("Vali".into());
        let t = db.transactions().create(&input).await.unwrap();

        let updated = db
            .transactions()
            .update(
                &t.id,
                &TransactionPatch {
                    customer_name: Some("  ".into()),
                    notes: Some("chegirma".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.customer_name.as_deref(), Some("Vali"));
        assert_eq!(updated.notes.as_deref(), Some("chegirma"));
        assert_eq!(updated.total_amount, t.total_amount);

        let missing = db
            .transactions()
            .update("missing", &TransactionPatch::default())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_list_today_stats_and_report() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        db.transactions()
            .create(&request(TransactionType::Sale, &p.id, 3, None))
            .await
            .unwrap();
        db.transactions()
            .create(&request(TransactionType::Purchase, &p.id, 5, Some(600)))
            .await
            .unwrap();
        db.transactions()
            .create(&request(TransactionType::Return, &p.id, 1, None))
            .await
            .unwrap();

        let all = db.transactions().list(&TransactionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let purchases = db
            .transactions()
            .list(&TransactionFilter {
                kind: Some(TransactionType::Purchase),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].items[0].quantity, 5);

        assert_eq!(db.transactions().today().await.unwrap().len(), 3);

        let stats = db.transactions().stats(&DateRange::default()).await.unwrap();
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.sale_count, 1);
        assert_eq!(stats.purchase_count, 1);
        assert_eq!(stats.return_count, 1);
        assert_eq!(stats.total_sales.minor(), 3000);
        assert_eq!(stats.total_purchases.minor(), 3000);
        // sale 1200 + purchase 0 + return 400
        assert_eq!(stats.total_profit.minor(), 1600);

        let report = db
            .transactions()
            .sales_report(TimeBucket::Year, &DateRange::default())
            .await
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].transaction_count, 1);
        assert_eq!(report[0].total_sales.minor(), 3000);
        assert_eq!(report[0].total_profit.minor(), 1200);
    }
}

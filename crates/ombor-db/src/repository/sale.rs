//! # Sale Repository
//!
//! Database operations for point-of-sale checkouts.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one SQL transaction)                                       │
//! │     └── touch debtor (credit) → apply_line × N → INSERT sale + items   │
//! │         → debtor += total, `sale` ledger entry (credit)                │
//! │                                                                         │
//! │  2. EDIT                                                               │
//! │     └── notes only; items, totals and payment are facts                │
//! │                                                                         │
//! │  3. DELETE (one SQL transaction)                                       │
//! │     └── lock → reverse_line × N → debtor −= total, `refund` entry      │
//! │         → DELETE sale (items cascade)                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Local, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use ombor_core::ledger::{CommercialRecord, RecordKind, RecordTotals};
use ombor_core::report::{
    daily_series, DateRange, DebtorCreditStat, DebtorSales, SaleOverview, SaleStats, TodaySales,
};
use ombor_core::validation::validate_new_sale;
use ombor_core::{
    CoreError, LedgerEntry, Money, NewSale, Page, PageRequest, PaymentMethod, Sale, SaleFilter,
    SaleItem, SalePatch, SaleStatus,
};

use crate::error::{DbError, DbResult};
use crate::protocol::{apply_request, lock_record, post_debtor_delta, reverse_record};
use crate::repository::debtor;
use crate::repository::{begin, commit, generate_id};

/// Days covered by the daily series in [`SaleRepository::stats`].
const DAILY_STATS_DAYS: i64 = 7;

/// Number of debtors in the credit ranking.
const TOP_DEBTORS: i64 = 10;

/// Sale numbers are `SALE-<millis>-<n>` with n < 1000 and may collide.
const SALE_NUMBER_ATTEMPTS: u32 = 5;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Lists sales, newest first, one page at a time.
    pub async fn list(&self, filter: &SaleFilter, page: PageRequest) -> DbResult<Page<Sale>> {
        let debtor_id = filter
            .debtor_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
              AND (?3 IS NULL OR payment_method = ?3)
              AND (?4 IS NULL OR debtor_id = ?4)
            "#,
        )
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.payment_method)
        .bind(debtor_id)
        .fetch_one(&mut *conn)
        .await?;

        let mut sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
              AND (?3 IS NULL OR payment_method = ?3)
              AND (?4 IS NULL OR debtor_id = ?4)
            ORDER BY created_at DESC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.payment_method)
        .bind(debtor_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        attach_items(&mut conn, &mut sales).await?;

        Ok(Page {
            items: sales,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    /// Sales since local midnight, with totals per payment method.
    pub async fn today(&self) -> DbResult<TodaySales> {
        let range = DateRange::day_of(Local::now());
        let mut conn = self.pool.acquire().await?;
        let sales = in_range(&mut conn, &range).await?;
        Ok(TodaySales::from_sales(sales))
    }

    /// Every sale charged to a debtor, newest first.
    pub async fn by_debtor(&self, debtor_id: &str) -> DbResult<DebtorSales> {
        let mut conn = self.pool.acquire().await?;
        let debtor = debtor::load(&mut conn, debtor_id).await?;

        let mut sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE debtor_id = ?1 ORDER BY created_at DESC",
        )
        .bind(debtor_id)
        .fetch_all(&mut *conn)
        .await?;
        attach_items(&mut conn, &mut sales).await?;

        debug!(debtor_id = %debtor_id, count = sales.len(), "Loaded debtor sales");
        Ok(DebtorSales::new(debtor, sales))
    }

    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Records a sale and moves stock (and debt, for credit) atomically.
    ///
    /// ## Errors
    /// * `Validation` - no lines, bad quantity, credit without a debtor
    /// * `DebtorNotFound` - credit debtor does not exist
    /// * `ProductNotFound` / `InsufficientStock` - nothing is changed
    pub async fn create(&self, input: &NewSale) -> DbResult<Sale> {
        validate_new_sale(input)?;

        let now = Utc::now();
        let id = generate_id();

        let mut tx = begin(&self.pool).await?;

        let lines = apply_request(&mut tx, input, now).await?;
        let totals = RecordTotals::compute(&lines.iter().map(|l| l.priced()).collect::<Vec<_>>())?;

        let items: Vec<SaleItem> = lines
            .into_iter()
            .map(|line| SaleItem {
                total: line.total(),
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                price: line.price,
            })
            .collect();

        let mut sale = Sale {
            id,
            sale_number: next_number(now),
            items,
            total_amount: totals.total_amount,
            payment_method: input.payment_method,
            debtor_id: credit_debtor(input),
            notes: input.notes.as_deref().unwrap_or_default().trim().to_string(),
            status: SaleStatus::Completed,
            created_at: now,
        };

        let mut attempt = 1;
        loop {
            match insert_header(&mut tx, &sale).await {
                Ok(()) => break,
                Err(DbError::UniqueViolation { .. }) if attempt < SALE_NUMBER_ATTEMPTS => {
                    debug!(sale_number = %sale.sale_number, "Sale number taken, retrying");
                    sale.sale_number = next_number(now);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
        insert_items(&mut tx, &sale).await?;

        if let Some(charge) = sale.credit_charge() {
            let entry = LedgerEntry::sale(charge.amount, &sale.id, &sale.reference(), now);
            if post_debtor_delta(&mut tx, &charge.debtor_id, &entry).await?.is_none() {
                return Err(CoreError::DebtorNotFound(charge.debtor_id).into());
            }
        }

        commit(tx).await?;

        info!(
            id = %sale.id,
            sale_number = %sale.sale_number,
            total = %sale.total_amount,
            payment = sale.payment_method.as_str(),
            "Sale created"
        );
        Ok(sale)
    }

    /// Changes the notes of a sale. Nothing else is editable.
    pub async fn update(&self, id: &str, patch: &SalePatch) -> DbResult<Sale> {
        let result = sqlx::query("UPDATE sales SET notes = COALESCE(?1, notes) WHERE id = ?2")
            .bind(patch.notes.as_deref().map(str::trim))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecordKind::Sale.not_found(id).into());
        }
        self.get(id).await
    }

    /// Deletes a sale after reversing its stock and credit effects.
    ///
    /// A second delete of the same id is `RecordNotFound` and changes nothing.
    pub async fn delete(&self, id: &str) -> DbResult<Sale> {
        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        lock_record(&mut tx, RecordKind::Sale, id).await?;
        let sale = load(&mut tx, id).await?;
        let reversal = reverse_record(&mut tx, &sale, now).await?;

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        commit(tx).await?;

        info!(
            id = %id,
            sale_number = %sale.sale_number,
            lines_reversed = reversal.lines_reversed,
            "Sale deleted"
        );
        Ok(sale)
    }

    /// Overview for a date range, the last seven days by day, and the top
    /// debtors by credit.
    pub async fn stats(&self, range: &DateRange) -> DbResult<SaleStats> {
        let mut conn = self.pool.acquire().await?;

        let overview = sqlx::query_as::<_, SaleOverview>(
            r#"
            SELECT
                COALESCE(SUM(total_amount), 0) AS total_sales,
                COUNT(*) AS count,
                COALESCE(CAST(AVG(total_amount) AS INTEGER), 0) AS avg_sale,
                COALESCE(SUM(CASE WHEN payment_method = 'cash' THEN total_amount ELSE 0 END), 0) AS cash_sales,
                COALESCE(SUM(CASE WHEN payment_method = 'card' THEN total_amount ELSE 0 END), 0) AS card_sales,
                COALESCE(SUM(CASE WHEN payment_method = 'credit' THEN total_amount ELSE 0 END), 0) AS credit_sales,
                COALESCE(SUM(CASE WHEN payment_method = 'transfer' THEN total_amount ELSE 0 END), 0) AS transfer_sales
            FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&mut *conn)
        .await?;

        let week = DateRange::last_days(Utc::now(), DAILY_STATS_DAYS);
        let samples: Vec<(DateTime<Utc>, Money)> = sqlx::query_as(
            "SELECT created_at, total_amount FROM sales WHERE created_at >= ?1",
        )
        .bind(week.start)
        .fetch_all(&mut *conn)
        .await?;

        let debtor_stats = sqlx::query_as::<_, DebtorCreditStat>(
            r#"
            SELECT
                s.debtor_id AS debtor_id,
                d.name AS debtor_name,
                d.phone AS debtor_phone,
                SUM(s.total_amount) AS total_credit,
                COUNT(*) AS sale_count
            FROM sales s
            LEFT JOIN debtors d ON d.id = s.debtor_id
            WHERE s.payment_method = 'credit' AND s.debtor_id IS NOT NULL
            GROUP BY s.debtor_id
            ORDER BY total_credit DESC
            LIMIT ?1
            "#,
        )
        .bind(TOP_DEBTORS)
        .fetch_all(&mut *conn)
        .await?;

        Ok(SaleStats {
            overview,
            daily_stats: daily_series(samples),
            debtor_stats,
        })
    }
}

/// Debtor id stored on the sale; only credit sales carry one.
fn credit_debtor(input: &NewSale) -> Option<String> {
    match input.payment_method {
        PaymentMethod::Credit => input
            .debtor_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from),
        _ => None,
    }
}

fn next_number(at: DateTime<Utc>) -> String {
    Sale::number_for(at, (Uuid::new_v4().as_u128() % 1000) as u32)
}

async fn insert_header(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, sale_number, total_amount, payment_method, debtor_id, notes, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.sale_number)
    .bind(sale.total_amount)
    .bind(sale.payment_method)
    .bind(&sale.debtor_id)
    .bind(&sale.notes)
    .bind(sale.status)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_items(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    for item in &sale.items {
        sqlx::query(
            r#"
            INSERT INTO sale_items (sale_id, product_id, product_name, quantity, price, total)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .execute(&mut *conn)
        .await?;
    }

    debug!(id = %sale.id, items = sale.items.len(), "Sale inserted");
    Ok(())
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    let mut sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RecordKind::Sale.not_found(id))?;

    sale.items = items_of(conn, id).await?;
    Ok(sale)
}

async fn items_of(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT product_id, product_name, quantity, price, total
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY seq
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn attach_items(conn: &mut SqliteConnection, sales: &mut [Sale]) -> DbResult<()> {
    for sale in sales.iter_mut() {
        sale.items = items_of(conn, &sale.id).await?;
    }
    Ok(())
}

async fn in_range(conn: &mut SqliteConnection, range: &DateRange) -> DbResult<Vec<Sale>> {
    let mut sales = sqlx::query_as::<_, Sale>(
        r#"
        SELECT * FROM sales
        WHERE (?1 IS NULL OR created_at >= ?1)
          AND (?2 IS NULL OR created_at <= ?2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;
    attach_items(conn, &mut sales).await?;
    Ok(sales)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{category, db, debtor, product, quantity};
    use crate::{Database, DbConfig};
    use ombor_core::ledger::ledger_balance;
    use ombor_core::{
        DebtChange, DebtDirection, DebtorStatus, LedgerEntryType, LineInput, NewProduct,
        ValidationError, MAX_LINE_QUANTITY, MAX_MONEY,
    };

    fn line(product: &str, quantity: i64, price: Option<i64>) -> LineInput {
        LineInput {
            product: product.to_string(),
            quantity,
            price: price.map(Money::from_minor),
            product_name: None,
        }
    }

    fn cash(items: Vec<LineInput>) -> NewSale {
        NewSale {
            items,
            payment_method: PaymentMethod::Cash,
            debtor_id: None,
            notes: None,
        }
    }

    fn credit(items: Vec<LineInput>, debtor_id: &str) -> NewSale {
        NewSale {
            items,
            payment_method: PaymentMethod::Credit,
            debtor_id: Some(debtor_id.to_string()),
            notes: None,
        }
    }

    async fn sale_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sale_decrements_stock_and_computes_total() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        let sale = db.sales().create(&cash(vec![line(&p.id, 3, None)])).await.unwrap();

        assert_eq!(quantity(&db, &p.id).await, 7);
        assert_eq!(sale.total_amount.minor(), 3000);
        assert_eq!(sale.items[0].product_name, "Cola");
        assert_eq!(sale.items[0].price.minor(), 1000);
        assert!(sale.sale_number.starts_with("SALE-"));
        assert!(sale.debtor_id.is_none());

        let stored = db.sales().get(&sale.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.total_amount, sale.total_amount);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_no_item() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let a = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let b = product(&db, &cat.id, "Fanta", 2, 900, 500).await;

        let err = db
            .sales()
            .create(&cash(vec![line(&a.id, 4, None), line(&b.id, 5, None)]))
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock {
                product,
                available,
                requested,
            }) => {
                assert_eq!(product, "Fanta");
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(quantity(&db, &a.id).await, 10);
        assert_eq!(quantity(&db, &b.id).await, 2);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_missing_product_changes_nothing() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let a = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        let err = db
            .sales()
            .create(&cash(vec![line(&a.id, 1, None), line("ghost", 1, None)]))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
        assert_eq!(quantity(&db, &a.id).await, 10);
    }

    #[tokio::test]
    async fn test_credit_sale_charges_debtor() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        let sale = db
            .sales()
            .create(&credit(vec![line(&p.id, 5, None)], &d.id))
            .await
            .unwrap();
        assert_eq!(sale.total_amount.minor(), 5000);

        let d = db.debtors().get(&d.id).await.unwrap();
        assert_eq!(d.debt_amount.minor(), 5000);
        assert_eq!(d.status, DebtorStatus::Active);
        assert_eq!(d.transactions.len(), 1);
        assert_eq!(d.transactions[0].amount.minor(), 5000);
        assert_eq!(d.transactions[0].kind, LedgerEntryType::Sale);
        assert_eq!(d.transactions[0].sale_id.as_deref(), Some(sale.id.as_str()));
    }

    #[tokio::test]
    async fn test_delete_credit_sale_round_trip() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        let sale = db
            .sales()
            .create(&credit(vec![line(&p.id, 5, None)], &d.id))
            .await
            .unwrap();
        db.sales().delete(&sale.id).await.unwrap();

        assert_eq!(quantity(&db, &p.id).await, 10);
        let d = db.debtors().get(&d.id).await.unwrap();
        assert!(d.debt_amount.is_zero());
        assert_eq!(d.status, DebtorStatus::Paid);
        assert_eq!(d.transactions.len(), 2);
        assert_eq!(d.transactions[1].kind, LedgerEntryType::Refund);
        assert_eq!(ledger_balance(&d.transactions), d.debt_amount);

        // Second delete: not found, no further movement
        let err = db.sales().delete(&sale.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::RecordNotFound { .. })));
        assert_eq!(quantity(&db, &p.id).await, 10);
        let d = db.debtors().get(&d.id).await.unwrap();
        assert!(d.debt_amount.is_zero());
        assert_eq!(d.transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_refund_is_not_clamped() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        let sale = db
            .sales()
            .create(&credit(vec![line(&p.id, 5, None)], &d.id))
            .await
            .unwrap();

        // Settled by hand before the sale is deleted
        db.debtors()
            .adjust_debt(
                &d.id,
                &DebtChange {
                    amount: Money::from_minor(5000),
                    direction: DebtDirection::Subtract,
                    notes: None,
                },
            )
            .await
            .unwrap();

        db.sales().delete(&sale.id).await.unwrap();

        let d = db.debtors().get(&d.id).await.unwrap();
        assert_eq!(d.debt_amount.minor(), -5000);
        assert_eq!(d.status, DebtorStatus::Paid);
        assert_eq!(ledger_balance(&d.transactions), d.debt_amount);

        // A manual subtract floors a negative balance at zero
        let d = db
            .debtors()
            .adjust_debt(
                &d.id,
                &DebtChange {
                    amount: Money::from_minor(100),
                    direction: DebtDirection::Subtract,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(d.debt_amount, Money::zero());
        let d = db.debtors().get(&d.id).await.unwrap();
        assert_eq!(d.transactions.last().unwrap().amount.minor(), 5000);
        assert_eq!(ledger_balance(&d.transactions), Money::zero());
    }

    #[tokio::test]
    async fn test_totals_that_overflow_are_rejected_without_changes() {
        let db = db().await;
        let cat = category(&db, "Gold").await;

        let err = db
            .products()
            .create(&NewProduct {
                name: "Ingot".into(),
                category: cat.id.clone(),
                price: Some(Money::from_minor(i64::MAX / 2 + 1)),
                cost: Some(Money::zero()),
                quantity: Some(2),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let mut ids = Vec::new();
        for i in 0..10 {
            let p = product(&db, &cat.id, &format!("Bar {i}"), MAX_LINE_QUANTITY, MAX_MONEY, 0).await;
            ids.push(p.id);
        }
        let items = ids.iter().map(|id| line(id, MAX_LINE_QUANTITY, None)).collect();

        let err = db.sales().create(&cash(items)).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { field, .. })) => {
                assert_eq!(field, "totalAmount");
            }
            other => panic!("unexpected error: {other}"),
        }

        for id in &ids {
            assert_eq!(quantity(&db, id).await, MAX_LINE_QUANTITY);
        }
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ombor.db")).max_connections(8))
            .await
            .unwrap();
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        let tasks: Vec<_> = (0..25)
            .map(|_| {
                let db = db.clone();
                let product_id = p.id.clone();
                tokio::spawn(async move {
                    db.sales()
                        .create(&cash(vec![line(&product_id, 1, None)]))
                        .await
                })
            })
            .collect();

        let (mut sold, mut rejected) = (0, 0);
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => sold += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(sold, 10);
        assert_eq!(rejected, 15);
        assert_eq!(quantity(&db, &p.id).await, 0);
        assert_eq!(sale_count(&db).await, 10);
        db.close().await;
    }

    #[tokio::test]
    async fn test_credit_sale_for_missing_debtor_changes_nothing() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;

        let err = db
            .sales()
            .create(&credit(vec![line(&p.id, 1, None)], "ghost"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::DebtorNotFound(_))));
        assert_eq!(quantity(&db, &p.id).await, 10);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_credit_without_debtor_is_rejected() {
        let db = db().await;
        let mut request = cash(vec![line("p", 1, None)]);
        request.payment_method = PaymentMethod::Credit;

        let err = db.sales().create(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: debtorId is required");
    }

    #[tokio::test]
    async fn test_delete_skips_deleted_product() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let a = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let b = product(&db, &cat.id, "Fanta", 10, 900, 500).await;

        let sale = db
            .sales()
            .create(&cash(vec![line(&a.id, 2, None), line(&b.id, 3, Some(800))]))
            .await
            .unwrap();
        assert_eq!(sale.total_amount.minor(), 2 * 1000 + 3 * 800);

        db.products().delete(&b.id).await.unwrap();
        db.sales().delete(&sale.id).await.unwrap();

        assert_eq!(quantity(&db, &a.id).await, 10);
        assert_eq!(sale_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_update_changes_notes_only() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 10, 1000, 600).await;
        let sale = db.sales().create(&cash(vec![line(&p.id, 1, None)])).await.unwrap();

        let updated = db
            .sales()
            .update(
                &sale.id,
                &SalePatch {
                    notes: Some("qaytadi".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes, "qaytadi");
        assert_eq!(updated.total_amount, sale.total_amount);

        assert!(db
            .sales()
            .update("missing", &SalePatch::default())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_list_today_by_debtor_and_stats() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let p = product(&db, &cat.id, "Cola", 100, 1000, 600).await;
        let d = debtor(&db, "Ali", "+998901112233", 0).await;

        db.sales().create(&cash(vec![line(&p.id, 1, None)])).await.unwrap();
        db.sales().create(&cash(vec![line(&p.id, 2, None)])).await.unwrap();
        db.sales()
            .create(&credit(vec![line(&p.id, 4, None)], &d.id))
            .await
            .unwrap();

        let page = db
            .sales()
            .list(&SaleFilter::default(), PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pages(), 2);

        let credit_only = db
            .sales()
            .list(
                &SaleFilter {
                    payment_method: Some(PaymentMethod::Credit),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(credit_only.total, 1);

        let today = db.sales().today().await.unwrap();
        assert_eq!(today.sales.len(), 3);
        assert_eq!(today.total_sales.minor(), 7000);
        assert_eq!(today.payment_stats.cash.minor(), 3000);
        assert_eq!(today.payment_stats.credit.minor(), 4000);

        let of_debtor = db.sales().by_debtor(&d.id).await.unwrap();
        assert_eq!(of_debtor.count, 1);
        assert_eq!(of_debtor.total_amount.minor(), 4000);
        assert!(db.sales().by_debtor("ghost").await.unwrap_err().is_not_found());

        let stats = db.sales().stats(&DateRange::default()).await.unwrap();
        assert_eq!(stats.overview.count, 3);
        assert_eq!(stats.overview.total_sales.minor(), 7000);
        assert_eq!(stats.overview.credit_sales.minor(), 4000);
        assert_eq!(stats.daily_stats.iter().map(|d| d.count).sum::<i64>(), 3);
        assert_eq!(stats.debtor_stats.len(), 1);
        assert_eq!(stats.debtor_stats[0].debtor_name.as_deref(), Some("Ali"));
        assert_eq!(stats.debtor_stats[0].total_credit.minor(), 4000);
    }
}

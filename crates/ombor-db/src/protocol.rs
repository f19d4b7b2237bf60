//! # Inventory / Debt Protocol
//!
//! The storage half of the consistency protocol. Every function here runs
//! on a connection that is already inside an open SQL transaction; the
//! repositories own `begin` / `commit`.
//!
//! ## Create and Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One SQL Transaction per Request                     │
//! │                                                                         │
//! │  create                               delete                           │
//! │  ──────                               ──────                           │
//! │  BEGIN                                BEGIN                            │
//! │   │ touch_debtor (credit only) ◄─┐     │ lock_record ◄── first write   │
//! │   │ apply_line × N             ◄─┴─ first write takes the write lock   │
//! │   │   UPDATE ... WHERE quantity >= q  │ load record + items            │
//! │   │ INSERT record + items             │ reverse_line × N               │
//! │   │ post_debtor_delta (credit)        │ post_debtor_delta (refund)     │
//! │  COMMIT                               │ DELETE record                  │
//! │                                       COMMIT                           │
//! │                                                                         │
//! │  Any error drops the transaction: nothing above is visible.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why the First Statement Writes
//! SQLite's `BEGIN` is deferred. A transaction that reads first holds a
//! snapshot and may fail to upgrade once another writer commits. Opening
//! with a write takes the database write lock up front, so the stock check
//! inside `apply_line` and the balance read inside `adjust_debt` see the
//! latest committed state and nobody can change it until we commit.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use ombor_core::ledger::{CommercialRecord, PricedLine, RecordKind, RecordRequest, StockMovement};
use ombor_core::{CoreError, DebtChange, DebtorStatus, LedgerEntry, Money};

use crate::error::DbResult;

// =============================================================================
// Row Locks
// =============================================================================

/// No-op update used to take the write lock on a row.
///
/// Returns `false` when the row does not exist.
pub(crate) async fn lock_row(
    conn: &mut SqliteConnection,
    table: LockTable,
    id: &str,
) -> DbResult<bool> {
    let result = sqlx::query(table.lock_sql())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockTable {
    Categories,
    Products,
    Debtors,
    Sales,
    Transactions,
}

impl LockTable {
    fn lock_sql(&self) -> &'static str {
        match self {
            LockTable::Categories => "UPDATE categories SET id = id WHERE id = ?1",
            LockTable::Products => "UPDATE products SET id = id WHERE id = ?1",
            LockTable::Debtors => "UPDATE debtors SET id = id WHERE id = ?1",
            LockTable::Sales => "UPDATE sales SET id = id WHERE id = ?1",
            LockTable::Transactions => "UPDATE transactions SET id = id WHERE id = ?1",
        }
    }
}

impl From<RecordKind> for LockTable {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Sale => LockTable::Sales,
            RecordKind::Transaction => LockTable::Transactions,
        }
    }
}

/// Locks a stored sale or transaction before it is read and reversed.
///
/// A record that is already gone yields `RecordNotFound`, which is what
/// makes a repeated delete harmless.
pub async fn lock_record(conn: &mut SqliteConnection, kind: RecordKind, id: &str) -> DbResult<()> {
    if !lock_row(conn, kind.into(), id).await? {
        return Err(kind.not_found(id).into());
    }
    Ok(())
}

/// Bumps `updated_at` on a debtor, failing with `DebtorNotFound`.
pub async fn touch_debtor(
    conn: &mut SqliteConnection,
    debtor_id: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE debtors SET updated_at = ?1 WHERE id = ?2")
        .bind(at)
        .bind(debtor_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::DebtorNotFound(debtor_id.to_string()).into());
    }
    Ok(())
}

// =============================================================================
// Stock
// =============================================================================

/// Product fields read back after its quantity moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedLine {
    pub name: String,
    pub price: Money,
    pub cost: Money,
}

/// Applies one line's stock delta with a single conditional update.
///
/// For a sale the update only matches while `quantity >= requested`, so
/// the check and the decrement cannot be split by another writer.
///
/// ## Errors
/// - `ProductNotFound` when the product does not exist
/// - `InsufficientStock` when a sale asks for more than is on hand
pub async fn apply_line(
    conn: &mut SqliteConnection,
    movement: StockMovement,
    product_id: &str,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<AppliedLine> {
    let row: Option<(String, Money, Money)> = sqlx::query_as(
        r#"
        UPDATE products
        SET quantity = quantity + ?1, updated_at = ?2
        WHERE id = ?3 AND (?4 = 0 OR quantity >= ?5)
        RETURNING name, price, cost
        "#,
    )
    .bind(movement.delta(quantity))
    .bind(at)
    .bind(product_id)
    .bind(movement.checks_stock())
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((name, price, cost)) = row {
        debug!(product_id = %product_id, delta = movement.delta(quantity), "Stock applied");
        return Ok(AppliedLine { name, price, cost });
    }

    let current: Option<(String, i64)> =
        sqlx::query_as("SELECT name, quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    Err(match current {
        None => CoreError::ProductNotFound(product_id.to_string()),
        Some((product, available)) => CoreError::InsufficientStock {
            product,
            available,
            requested: quantity,
        },
    }
    .into())
}

/// Undoes one line's stock delta. No lower bound.
///
/// Returns `false` when the product no longer exists; that line is skipped.
pub async fn reverse_line(
    conn: &mut SqliteConnection,
    movement: StockMovement,
    product_id: &str,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET quantity = quantity + ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(movement.reversal_delta(quantity))
    .bind(at)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(product_id = %product_id, "Product gone, skipping stock reversal");
        return Ok(false);
    }
    Ok(true)
}

// =============================================================================
// Debtor Ledger
// =============================================================================

/// Appends one entry to a debtor's ledger.
pub async fn insert_entry(
    conn: &mut SqliteConnection,
    debtor_id: &str,
    entry: &LedgerEntry,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO debtor_entries (id, debtor_id, amount, kind, notes, date, sale_id, created_by)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(debtor_id)
    .bind(entry.amount)
    .bind(entry.kind)
    .bind(&entry.notes)
    .bind(entry.date)
    .bind(&entry.sale_id)
    .bind(&entry.created_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn set_status(
    conn: &mut SqliteConnection,
    debtor_id: &str,
    balance: Money,
) -> DbResult<DebtorStatus> {
    let status = DebtorStatus::from_balance(balance);
    sqlx::query("UPDATE debtors SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(debtor_id)
        .execute(&mut *conn)
        .await?;
    Ok(status)
}

/// Moves a balance by `entry.amount` without clamping and appends the entry.
///
/// Returns the new balance, or `None` when the debtor does not exist (no
/// entry is written then).
pub async fn post_debtor_delta(
    conn: &mut SqliteConnection,
    debtor_id: &str,
    entry: &LedgerEntry,
) -> DbResult<Option<Money>> {
    let balance: Option<Money> = sqlx::query_scalar(
        r#"
        UPDATE debtors
        SET debt_amount = debt_amount + ?1,
            last_transaction_date = ?2,
            updated_at = ?2
        WHERE id = ?3
        RETURNING debt_amount
        "#,
    )
    .bind(entry.amount)
    .bind(entry.date)
    .bind(debtor_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(balance) = balance else {
        return Ok(None);
    };

    set_status(conn, debtor_id, balance).await?;
    insert_entry(conn, debtor_id, entry).await?;

    debug!(debtor_id = %debtor_id, delta = %entry.amount, balance = %balance, "Debtor balance posted");
    Ok(Some(balance))
}

/// Manual debt change: `add` raises the balance, `subtract` lowers it with
/// a floor at zero, even from a negative balance. The entry records the
/// delta actually applied.
pub async fn adjust_debt(
    conn: &mut SqliteConnection,
    debtor_id: &str,
    change: &DebtChange,
    at: DateTime<Utc>,
) -> DbResult<LedgerEntry> {
    touch_debtor(conn, debtor_id, at).await?;

    let balance: Money = sqlx::query_scalar("SELECT debt_amount FROM debtors WHERE id = ?1")
        .bind(debtor_id)
        .fetch_one(&mut *conn)
        .await?;

    let (new_balance, applied) = change.apply(balance)?;
    let entry = LedgerEntry::new(change.entry_type(), applied, change.entry_notes(), None, at);

    sqlx::query(
        r#"
        UPDATE debtors
        SET debt_amount = ?1, last_transaction_date = ?2, updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(new_balance)
    .bind(at)
    .bind(debtor_id)
    .execute(&mut *conn)
    .await?;

    set_status(conn, debtor_id, new_balance).await?;
    insert_entry(conn, debtor_id, &entry).await?;

    debug!(
        debtor_id = %debtor_id,
        requested = %change.amount,
        applied = %applied,
        balance = %new_balance,
        "Debt adjusted"
    );
    Ok(entry)
}

// =============================================================================
// Record Protocol
// =============================================================================

/// A request line after its product was resolved and its stock moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price: Money,
    pub cost: Money,
}

impl ResolvedLine {
    pub fn priced(&self) -> PricedLine {
        PricedLine {
            quantity: self.quantity,
            price: self.price,
            cost: self.cost,
        }
    }

    pub fn total(&self) -> Money {
        self.priced().total()
    }
}

/// Creation steps shared by sales and transactions, up to (not including)
/// persisting the record.
///
/// A credit debtor is touched before any stock moves so that a missing
/// debtor fails the request before anything else is written.
pub async fn apply_request<R: RecordRequest>(
    conn: &mut SqliteConnection,
    request: &R,
    at: DateTime<Utc>,
) -> DbResult<Vec<ResolvedLine>> {
    if let Some(debtor_id) = request.credit_debtor() {
        touch_debtor(conn, debtor_id, at).await?;
    }

    let movement = request.movement();
    let mut resolved = Vec::with_capacity(request.lines().len());

    for line in request.lines() {
        let applied = apply_line(conn, movement, &line.product, line.quantity, at).await?;

        let product_name = line
            .product_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .unwrap_or(applied.name);

        resolved.push(ResolvedLine {
            product_id: line.product.clone(),
            product_name,
            quantity: line.quantity,
            price: line.price.unwrap_or(applied.price),
            cost: applied.cost,
        });
    }

    debug!(
        kind = request.kind().label(),
        lines = resolved.len(),
        "Record lines applied"
    );
    Ok(resolved)
}

/// What a reversal actually touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reversal {
    pub lines_reversed: usize,
    pub lines_skipped: usize,
    /// New balance of the refunded debtor, if any.
    pub debtor_balance: Option<Money>,
}

/// Reverses every stock line of a record and refunds its credit charge.
///
/// The caller must already hold the record's lock (see [`lock_record`])
/// and deletes the record afterwards in the same transaction.
pub async fn reverse_record<R: CommercialRecord>(
    conn: &mut SqliteConnection,
    record: &R,
    at: DateTime<Utc>,
) -> DbResult<Reversal> {
    let movement = record.movement();
    let mut reversal = Reversal::default();

    for line in record.stock_lines() {
        if reverse_line(conn, movement, &line.product_id, line.quantity, at).await? {
            reversal.lines_reversed += 1;
        } else {
            reversal.lines_skipped += 1;
        }
    }

    if let Some(charge) = record.credit_charge() {
        let entry = LedgerEntry::refund(charge.amount, record.id(), &record.reference(), at);
        reversal.debtor_balance = post_debtor_delta(conn, &charge.debtor_id, &entry).await?;

        if reversal.debtor_balance.is_none() {
            warn!(
                record = %record.reference(),
                debtor_id = %charge.debtor_id,
                "Debtor no longer exists, credit refund skipped"
            );
        }
    }

    if reversal.lines_skipped > 0 {
        warn!(
            record = %record.reference(),
            skipped = reversal.lines_skipped,
            "Some products no longer exist, their stock was not restored"
        );
    }

    Ok(reversal)
}

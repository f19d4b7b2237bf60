//! # Repository Module
//!
//! Database repository implementations for Ombor.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and the Protocol                        │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │  state.db.sales().create(&new_sale)                            │
//! │       ▼                                                                 │
//! │  SaleRepository ─────────┐                                             │
//! │  TransactionRepository ──┤ begin()                                     │
//! │  DebtorRepository ───────┤   protocol::apply_request / reverse_record  │
//! │                          │   protocol::adjust_debt                     │
//! │                          └ commit()                                    │
//! │  ProductRepository ─────── category counter moves in the same tx       │
//! │  CategoryRepository ────── reconcile_product_counts()                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`](category::CategoryRepository) - Categories and counter reconciliation
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD, low stock, stats
//! - [`DebtorRepository`](debtor::DebtorRepository) - Debtors, ledger, manual debt changes
//! - [`SaleRepository`](sale::SaleRepository) - Point-of-sale checkouts
//! - [`TransactionRepository`](transaction::TransactionRepository) - Sale / purchase / return events

use uuid::Uuid;

use crate::error::{DbError, DbResult};

pub mod category;
pub mod debtor;
pub mod product;
pub mod sale;
pub mod transaction;

/// Generates a new entity id (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Turns a search term into a `LIKE` pattern matching it anywhere.
///
/// `%`, `_` and `\` are escaped; queries use `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Opens a write transaction.
pub(crate) async fn begin(
    pool: &sqlx::SqlitePool,
) -> DbResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
    pool.begin()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))
}

/// Commits a write transaction.
pub(crate) async fn commit(tx: sqlx::Transaction<'static, sqlx::Sqlite>) -> DbResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cola"), "%cola%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_generate_id_is_uuid() {
        let id = generate_id();
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());
    }
}

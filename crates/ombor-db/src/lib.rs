//! # ombor-db: Database Layer for Ombor
//!
//! SQLite persistence for the Ombor inventory and point-of-sale backend,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ombor Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ombor-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CategoryRepo  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo   │    │ 001_initial_ │  │   │
//! │  │   │ WAL, FKs on   │    │ DebtorRepo    │    │   schema.sql │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   └───────────────┘    │ TransactionRepo│   └──────────────┘  │   │
//! │  │                        └───────┬───────┘                       │   │
//! │  │                                ▼                               │   │
//! │  │                  protocol.rs (stock + debt moves)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (OMBOR_DB_PATH) or in-memory for tests                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`protocol`] - Inventory/debt consistency steps run inside SQL transactions
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ombor_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("data/ombor.db")).await?;
//!
//! let low = db.products().low_stock().await?;
//! let sale = db.sales().create(&new_sale).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod protocol;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::{CategoryRepository, CountCorrection};
pub use repository::debtor::DebtorRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::transaction::TransactionRepository;

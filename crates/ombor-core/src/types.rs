//! # Domain Types
//!
//! Core domain types used throughout Ombor.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                  Debtor ledger            Records              │
//! │  ┌───────────────┐        ┌───────────────┐        ┌───────────────┐    │
//! │  │   Category    │        │    Debtor     │        │     Sale      │    │
//! │  │ productCount  │        │  debtAmount   │◄───────│  debtorId?    │    │
//! │  └───────▲───────┘        │  status       │ credit │  paymentMethod│    │
//! │          │                │  transactions─┼──┐     │  items[]      │    │
//! │  ┌───────┴───────┐        └───────────────┘  │     └───────────────┘    │
//! │  │    Product    │        ┌───────────────┐  │     ┌───────────────┐    │
//! │  │  quantity     │        │  LedgerEntry  │◄─┘     │  Transaction  │    │
//! │  │  price, cost  │        │ amount (±)    │        │  type         │    │
//! │  └───────────────┘        │ type, saleId? │        │  items[]      │    │
//! │                           └───────────────┘        │  profit       │    │
//! │                                                    └───────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities serialize with camelCase keys. The `sqlx` feature adds `FromRow`
//! derives; nested collections (`items`, `transactions`) are loaded
//! separately and skipped by the row mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::report::DateRange;
use crate::{DEFAULT_PAGE_SIZE, LOW_STOCK_THRESHOLD};

// =============================================================================
// Category
// =============================================================================

/// A product category with a denormalized product counter.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Hex colour used by the frontend badge.
    pub color: String,
    pub icon: String,
    /// Number of live products referencing this category.
    pub product_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCategory {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on sale lines.
    pub name: String,

    /// Barcode (EAN-13, UPC-A, internal code). Unique when present.
    pub barcode: Option<String>,

    pub category_id: String,

    /// Joined from `categories` on read.
    pub category_name: Option<String>,

    /// Selling price per unit.
    pub price: Money,

    /// Purchase cost per unit, used for transaction profit.
    pub cost: Money,

    /// Units in stock. Only sales, purchases, returns and their reversals
    /// move this value.
    pub quantity: i64,

    /// Unit of measure ("dona", "kg", "litr", ...).
    pub unit: String,

    pub description: String,

    /// Reorder level shown by the frontend.
    pub min_stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock value at selling price.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.price.times(self.quantity)
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity < LOW_STOCK_THRESHOLD
    }

    #[inline]
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }
}

/// Request body for creating a product.
///
/// Numeric fields are optional at the serde level so that a missing field
/// is reported as `"price is required"` instead of a deserializer error.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    #[serde(default)]
    pub name: String,
    pub barcode: Option<String>,
    /// Category id.
    #[serde(default, alias = "categoryId")]
    pub category: String,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub min_stock: Option<i64>,
}

/// Request body for editing a product.
///
/// `quantity` is intentionally absent: stock moves only through records.
/// An empty `barcode` clears it.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub barcode: Option<String>,
    #[serde(alias = "categoryId")]
    pub category: Option<String>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub min_stock: Option<i64>,
}

/// Stock filter for the product list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum StockStatus {
    #[default]
    All,
    /// quantity > 0
    Active,
    /// quantity < LOW_STOCK_THRESHOLD
    LowStock,
    /// quantity <= 0
    OutOfStock,
}

impl StockStatus {
    pub fn matches(&self, quantity: i64) -> bool {
        match self {
            StockStatus::All => true,
            StockStatus::Active => quantity > 0,
            StockStatus::LowStock => quantity < LOW_STOCK_THRESHOLD,
            StockStatus::OutOfStock => quantity <= 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<String>,
    /// Matches name or barcode, case-insensitive substring.
    pub search: Option<String>,
    pub status: StockStatus,
}

// =============================================================================
// Debtor
// =============================================================================

/// Derived from the balance on every save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DebtorStatus {
    Active,
    Paid,
}

impl DebtorStatus {
    /// `Paid` iff the balance is zero or below.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::{DebtorStatus, Money};
    ///
    /// assert_eq!(DebtorStatus::from_balance(Money::zero()), DebtorStatus::Paid);
    /// assert_eq!(DebtorStatus::from_balance(Money::from_minor(1)), DebtorStatus::Active);
    /// ```
    pub fn from_balance(balance: Money) -> Self {
        if balance.minor() <= 0 {
            DebtorStatus::Paid
        } else {
            DebtorStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtorStatus::Active => "active",
            DebtorStatus::Paid => "paid",
        }
    }
}

/// Kind of balance change recorded in a debtor's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LedgerEntryType {
    /// Credit sale charged to the debtor.
    Sale,
    /// Manual balance change, either direction.
    Payment,
    /// Opening balance or a direct balance edit.
    Adjustment,
    /// Reversal of a deleted credit sale.
    Refund,
}

/// One append-only entry in a debtor's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    /// Signed: positive raises the debt, negative lowers it.
    pub amount: Money,
    #[serde(rename = "type")]
    pub kind: LedgerEntryType,
    pub notes: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub sale_id: Option<String>,
    pub created_by: String,
}

/// A customer buying on credit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Debtor {
    pub id: String,
    pub name: String,
    /// Unique across debtors.
    pub phone: String,
    pub debt_amount: Money,
    /// Informational credit limit; not enforced.
    pub max_debt_amount: Money,
    pub notes: String,
    pub status: DebtorStatus,
    #[ts(as = "String")]
    pub last_transaction_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Ledger, oldest first. Empty in list responses.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub transactions: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewDebtor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    /// Opening balance, recorded as an `adjustment` entry when non-zero.
    pub debt_amount: Option<Money>,
    pub max_debt_amount: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    /// A direct balance edit; the difference is logged as an `adjustment`.
    pub debt_amount: Option<Money>,
    pub max_debt_amount: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DebtDirection {
    Add,
    Subtract,
}

/// Body of `PATCH /api/debtors/{id}/debt`.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtChange {
    pub amount: Money,
    #[serde(rename = "type")]
    pub direction: DebtDirection,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DebtorFilter {
    pub status: Option<DebtorStatus>,
    /// Matches name, phone or notes.
    pub search: Option<String>,
}

// =============================================================================
// Line Input (shared by sales and transactions)
// =============================================================================

/// One requested line of a sale or transaction.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineInput {
    /// Product id.
    #[serde(alias = "productId")]
    pub product: String,
    pub quantity: i64,
    /// Unit price charged. Falls back to the product's price when absent.
    pub price: Option<Money>,
    /// Display name override for sale lines.
    pub product_name: Option<String>,
}

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    #[default]
    Cash,
    /// Charged to a debtor's balance.
    Credit,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Credit,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SaleStatus {
    Pending,
    /// Every created sale is completed; deletion removes it outright.
    #[default]
    Completed,
    Cancelled,
}

/// A line of a sale. The product name is frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price: Money,
    /// price × quantity
    pub total: Money,
}

/// A point-of-sale checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-readable number, `SALE-<millis>-<n>`.
    pub sale_number: String,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<SaleItem>,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub debtor_id: Option<String>,
    pub notes: String,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Builds a sale number from a timestamp and a random suffix below 1000.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::TimeZone;
    /// use ombor_core::Sale;
    ///
    /// let at = chrono::Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    /// assert_eq!(Sale::number_for(at, 42), "SALE-1700000000000-42");
    /// ```
    pub fn number_for(at: DateTime<Utc>, suffix: u32) -> String {
        format!("SALE-{}-{}", at.timestamp_millis(), suffix % 1000)
    }

    /// True when this sale charges a debtor.
    pub fn is_credit(&self) -> bool {
        self.payment_method == PaymentMethod::Credit && self.debtor_id.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSale {
    #[serde(default)]
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(alias = "debtor")]
    pub debtor_id: Option<String>,
    pub notes: Option<String>,
}

/// Only the notes of a sale can change after creation.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalePatch {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub range: DateRange,
    pub payment_method: Option<PaymentMethod>,
    pub debtor_id: Option<String>,
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TransactionType {
    Sale,
    Purchase,
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Purchase => "purchase",
            TransactionType::Return => "return",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionItem {
    pub product_id: String,
    pub quantity: i64,
    pub price: Money,
    pub total: Money,
}

/// A generic stock event: sale, purchase or customer return.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<TransactionItem>,
    pub total_amount: Money,
    pub total_cost: Money,
    /// total_amount − total_cost
    pub profit: Money,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub items: Vec<LineInput>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Non-financial fields of a transaction. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionPatch {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub range: DateRange,
    pub kind: Option<TransactionType>,
}

// =============================================================================
// Pagination
// =============================================================================

/// Highest page number honoured; larger requests get this (empty) page.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamps page to 1..=MAX_PAGE and limit to 1..=500.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 500),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    /// ceil(total / limit)
    pub fn pages(&self) -> i64 {
        if self.limit <= 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debtor_status_from_balance() {
        assert_eq!(DebtorStatus::from_balance(Money::from_minor(5000)), DebtorStatus::Active);
        assert_eq!(DebtorStatus::from_balance(Money::zero()), DebtorStatus::Paid);
        assert_eq!(DebtorStatus::from_balance(Money::from_minor(-10)), DebtorStatus::Paid);
    }

    #[test]
    fn test_stock_status_matches() {
        assert!(StockStatus::All.matches(-3));
        assert!(StockStatus::Active.matches(1));
        assert!(!StockStatus::Active.matches(0));
        assert!(StockStatus::LowStock.matches(9));
        assert!(!StockStatus::LowStock.matches(10));
        assert!(StockStatus::OutOfStock.matches(0));
        assert!(!StockStatus::OutOfStock.matches(1));
    }

    #[test]
    fn test_stock_status_wire_names() {
        let s: StockStatus = serde_json::from_str("\"low-stock\"").unwrap();
        assert_eq!(s, StockStatus::LowStock);
        let s: StockStatus = serde_json::from_str("\"out-of-stock\"").unwrap();
        assert_eq!(s, StockStatus::OutOfStock);
    }

    #[test]
    fn test_new_sale_defaults_to_cash() {
        let sale: NewSale = serde_json::from_str(
            r#"{"items":[{"product":"p1","quantity":2,"price":500}]}"#,
        )
        .unwrap();
        assert_eq!(sale.payment_method, PaymentMethod::Cash);
        assert_eq!(sale.items[0].price, Some(Money::from_minor(500)));
        assert!(sale.debtor_id.is_none());
    }

    #[test]
    fn test_line_input_accepts_product_id_alias() {
        let line: LineInput =
            serde_json::from_str(r#"{"productId":"p1","quantity":1}"#).unwrap();
        assert_eq!(line.product, "p1");
        assert!(line.price.is_none());
    }

    #[test]
    fn test_debt_change_wire_shape() {
        let change: DebtChange =
            serde_json::from_str(r#"{"amount":3000,"type":"subtract"}"#).unwrap();
        assert_eq!(change.direction, DebtDirection::Subtract);
        assert_eq!(change.amount.minor(), 3000);
    }

    #[test]
    fn test_transaction_serializes_type_key() {
        let now = Utc::now();
        let tx = Transaction {
            id: "t1".into(),
            kind: TransactionType::Return,
            items: vec![],
            total_amount: Money::from_minor(100),
            total_cost: Money::from_minor(60),
            profit: Money::from_minor(40),
            customer_name: None,
            customer_phone: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "return");
        assert_eq!(json["totalAmount"], 100);
    }

    #[test]
    fn test_page_request_and_pages() {
        let req = PageRequest::new(Some(3), Some(20));
        assert_eq!(req.offset(), 40);

        let req = PageRequest::new(Some(0), None);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, DEFAULT_PAGE_SIZE);

        let page: Page<()> = Page {
            items: vec![],
            total: 101,
            page: 1,
            limit: 50,
        };
        assert_eq!(page.pages(), 3);
    }

    #[test]
    fn test_page_request_caps_huge_page() {
        let req = PageRequest::new(Some(i64::MAX), Some(i64::MAX));
        assert_eq!(req.page, MAX_PAGE);
        assert_eq!(req.limit, 500);
        assert_eq!(req.offset(), (MAX_PAGE - 1) * 500);
    }
}

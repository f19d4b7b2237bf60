//! # Ledger Rules
//!
//! The pure half of the inventory / debt consistency protocol. `ombor-db`
//! runs these rules inside one SQL transaction per request; nothing here
//! touches storage.
//!
//! ## One Protocol, Two Record Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NewSale ─────────┐                       ┌──────── Sale               │
//! │   NewTransaction ──┤ RecordRequest         │ CommercialRecord           │
//! │                    ▼                       ▼  └─ Transaction            │
//! │              ┌───────────┐           ┌───────────┐                      │
//! │   create ──► │ movement  │           │ movement  │ ◄── delete           │
//! │              │ lines     │           │ lines     │                      │
//! │              │ debtor?   │           │ charge?   │                      │
//! │              └─────┬─────┘           └─────┬─────┘                      │
//! │                    │ delta(qty)            │ reversal_delta(qty)        │
//! │                    ▼                       ▼                            │
//! │             products.quantity       products.quantity                   │
//! │             debtors.debt_amount +   debtors.debt_amount −               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Debt Clamping
//! Only a manual `subtract` ([`DebtChange::apply`]) is floored at zero. Credit
//! sale charges and their refunds move the balance by the exact record total,
//! so deleting a sale always restores the balance it found.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;
use crate::types::{
    DebtChange, DebtDirection, LedgerEntry, LedgerEntryType, LineInput, NewSale, NewTransaction,
    PaymentMethod, Sale, Transaction, TransactionType,
};

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction a record moves stock in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    /// Goods leave the shop. Checked against available stock.
    Sale,
    /// Goods arrive from a supplier.
    Purchase,
    /// A customer brings goods back.
    Return,
}

impl StockMovement {
    /// Quantity change applied when the record is created.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::ledger::StockMovement;
    ///
    /// assert_eq!(StockMovement::Sale.delta(3), -3);
    /// assert_eq!(StockMovement::Purchase.delta(3), 3);
    /// ```
    #[inline]
    pub fn delta(&self, quantity: i64) -> i64 {
        match self {
            StockMovement::Sale => -quantity,
            StockMovement::Purchase | StockMovement::Return => quantity,
        }
    }

    /// Quantity change applied when the record is deleted.
    #[inline]
    pub fn reversal_delta(&self, quantity: i64) -> i64 {
        -self.delta(quantity)
    }

    /// Whether creation must refuse to take stock below zero.
    ///
    /// Reversals never check: undoing a purchase may drive stock negative.
    #[inline]
    pub fn checks_stock(&self) -> bool {
        matches!(self, StockMovement::Sale)
    }
}

impl From<TransactionType> for StockMovement {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Sale => StockMovement::Sale,
            TransactionType::Purchase => StockMovement::Purchase,
            TransactionType::Return => StockMovement::Return,
        }
    }
}

// =============================================================================
// Record Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Sale,
    Transaction,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Sale => "Sale",
            RecordKind::Transaction => "Transaction",
        }
    }

    pub fn not_found(&self, id: &str) -> CoreError {
        CoreError::RecordNotFound {
            kind: self.label(),
            id: id.to_string(),
        }
    }
}

/// One stock-moving line of a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A debtor charge carried by a credit sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditCharge {
    pub debtor_id: String,
    pub amount: Money,
}

/// A stored commercial event that can be reversed.
pub trait CommercialRecord {
    fn kind(&self) -> RecordKind;

    fn id(&self) -> &str;

    fn movement(&self) -> StockMovement;

    fn stock_lines(&self) -> Vec<StockLine>;

    /// The debtor charge to undo on deletion, if any.
    fn credit_charge(&self) -> Option<CreditCharge>;

    /// Human label used in ledger notes and logs.
    fn reference(&self) -> String;
}

impl CommercialRecord for Sale {
    fn kind(&self) -> RecordKind {
        RecordKind::Sale
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn movement(&self) -> StockMovement {
        StockMovement::Sale
    }

    fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }

    fn credit_charge(&self) -> Option<CreditCharge> {
        match (&self.payment_method, &self.debtor_id) {
            (PaymentMethod::Credit, Some(debtor_id)) => Some(CreditCharge {
                debtor_id: debtor_id.clone(),
                amount: self.total_amount,
            }),
            _ => None,
        }
    }

    fn reference(&self) -> String {
        format!("Sale {}", self.sale_number)
    }
}

impl CommercialRecord for Transaction {
    fn kind(&self) -> RecordKind {
        RecordKind::Transaction
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn movement(&self) -> StockMovement {
        self.kind.into()
    }

    fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }

    fn credit_charge(&self) -> Option<CreditCharge> {
        None
    }

    fn reference(&self) -> String {
        format!("{} transaction {}", self.kind.as_str(), self.id)
    }
}

/// A request to create a commercial event.
pub trait RecordRequest {
    fn kind(&self) -> RecordKind;

    fn movement(&self) -> StockMovement;

    fn lines(&self) -> &[LineInput];

    /// Debtor to charge once the record exists.
    fn credit_debtor(&self) -> Option<&str>;
}

impl RecordRequest for NewSale {
    fn kind(&self) -> RecordKind {
        RecordKind::Sale
    }

    fn movement(&self) -> StockMovement {
        StockMovement::Sale
    }

    fn lines(&self) -> &[LineInput] {
        &self.items
    }

    fn credit_debtor(&self) -> Option<&str> {
        match self.payment_method {
            PaymentMethod::Credit => self.debtor_id.as_deref(),
            _ => None,
        }
    }
}

impl RecordRequest for NewTransaction {
    fn kind(&self) -> RecordKind {
        RecordKind::Transaction
    }

    fn movement(&self) -> StockMovement {
        self.kind.into()
    }

    fn lines(&self) -> &[LineInput] {
        &self.items
    }

    fn credit_debtor(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// Totals
// =============================================================================

/// A line after its product has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity: i64,
    /// Unit price charged.
    pub price: Money,
    /// Product cost per unit at the time of the record.
    pub cost: Money,
}

impl PricedLine {
    #[inline]
    pub fn total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

/// Financial totals of a record, always computed server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordTotals {
    pub total_amount: Money,
    pub total_cost: Money,
    pub profit: Money,
}

impl RecordTotals {
    /// `Σ qty×price`, `Σ qty×cost` and their difference.
    ///
    /// Fails with `OutOfRange` when a total does not fit in `i64`.
    pub fn compute(lines: &[PricedLine]) -> Result<Self, ValidationError> {
        let mut total_amount = Money::zero();
        let mut total_cost = Money::zero();
        for line in lines {
            total_amount = line
                .price
                .checked_times(line.quantity)
                .and_then(|t| total_amount.checked_add(t))
                .ok_or_else(|| out_of_range("totalAmount"))?;
            total_cost = line
                .cost
                .checked_times(line.quantity)
                .and_then(|t| total_cost.checked_add(t))
                .ok_or_else(|| out_of_range("totalCost"))?;
        }
        Ok(RecordTotals {
            total_amount,
            total_cost,
            profit: total_amount - total_cost,
        })
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

// =============================================================================
// Debt
// =============================================================================

impl DebtChange {
    /// Applies a manual debt change to `balance`.
    ///
    /// Returns `(new_balance, applied_delta)`. `add` raises the balance by
    /// `|amount|`. `subtract` sets it to `max(balance - |amount|, 0)`, so a
    /// negative balance left by a refund is brought back to zero. The
    /// returned delta is what actually moved.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::{DebtChange, DebtDirection, Money};
    ///
    /// let pay = DebtChange {
    ///     amount: Money::from_minor(7000),
    ///     direction: DebtDirection::Subtract,
    ///     notes: None,
    /// };
    /// let (balance, applied) = pay.apply(Money::from_minor(5000)).unwrap();
    /// assert_eq!(balance, Money::zero());
    /// assert_eq!(applied.minor(), -5000);
    /// ```
    pub fn apply(&self, balance: Money) -> Result<(Money, Money), ValidationError> {
        let amount = self
            .amount
            .minor()
            .checked_abs()
            .map(Money::from_minor)
            .ok_or_else(|| out_of_range("amount"))?;
        let new_balance = match self.direction {
            DebtDirection::Add => balance
                .checked_add(amount)
                .ok_or_else(|| out_of_range("debtAmount"))?,
            DebtDirection::Subtract => balance
                .minor()
                .checked_sub(amount.minor())
                .map_or(Money::zero(), Money::from_minor)
                .floor_zero(),
        };
        Ok((new_balance, new_balance - balance))
    }

    /// Ledger entry kind recorded for this change.
    pub fn entry_type(&self) -> LedgerEntryType {
        match self.direction {
            DebtDirection::Add => LedgerEntryType::Adjustment,
            DebtDirection::Subtract => LedgerEntryType::Payment,
        }
    }

    /// Notes for the ledger entry, with a default when none were given.
    pub fn entry_notes(&self) -> String {
        match self.notes.as_deref().map(str::trim) {
            Some(notes) if !notes.is_empty() => notes.to_string(),
            _ => match self.direction {
                DebtDirection::Add => "Debt added".to_string(),
                DebtDirection::Subtract => "Payment received".to_string(),
            },
        }
    }
}

/// Signed sum of a ledger.
pub fn ledger_balance(entries: &[LedgerEntry]) -> Money {
    entries.iter().map(|e| e.amount).sum()
}

impl LedgerEntry {
    pub fn new(
        kind: LedgerEntryType,
        amount: Money,
        notes: impl Into<String>,
        sale_id: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        LedgerEntry {
            id: Uuid::new_v4().to_string(),
            amount,
            kind,
            notes: notes.into(),
            date: at,
            sale_id,
            created_by: "system".to_string(),
        }
    }

    /// Charge for a credit sale.
    pub fn sale(amount: Money, sale_id: &str, reference: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            LedgerEntryType::Sale,
            amount,
            reference,
            Some(sale_id.to_string()),
            at,
        )
    }

    /// Reversal of a deleted credit sale. `amount` is the sale total; the
    /// entry records it negated.
    pub fn refund(amount: Money, sale_id: &str, reference: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            LedgerEntryType::Refund,
            -amount,
            format!("{reference} deleted"),
            Some(sale_id.to_string()),
            at,
        )
    }

    pub fn payment(delta: Money, notes: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(LedgerEntryType::Payment, delta, notes, None, at)
    }

    pub fn adjustment(delta: Money, notes: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(LedgerEntryType::Adjustment, delta, notes, None, at)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

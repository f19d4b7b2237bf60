//! # Validation Module
//!
//! Input validation for Ombor requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum extractors)                                       │
//! │  └── JSON shape, field types                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── required fields, lengths, ranges                                  │
//! │  └── record line limits, credit sale needs a debtor                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE barcode / phone / category name                            │
//! │  └── conditional stock updates                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ombor_core::validation::{validate_barcode, validate_quantity};
//!
//! assert!(validate_barcode("4780000000011").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{
    DebtChange, DebtorPatch, LineInput, NewCategory, NewDebtor, NewProduct, NewSale,
    NewTransaction, PaymentMethod, ProductPatch,
};
use crate::{MAX_LINE_QUANTITY, MAX_MONEY, MAX_RECORD_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_PHONE_LEN: usize = 32;
const MAX_BARCODE_LEN: usize = 64;
const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, category, debtor).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Required, at most 32 characters
/// - Digits, spaces, `+`, `-`, `(`, `)` only
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if phone.len() > MAX_PHONE_LEN {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: MAX_PHONE_LEN,
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, +, -, ( and )".to_string(),
        });
    }

    Ok(())
}

/// Validates a barcode.
///
/// ## Example
/// ```rust
/// use ombor_core::validation::validate_barcode;
///
/// assert!(validate_barcode("COLA-1.5").is_ok());
/// assert!(validate_barcode("has space").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.len() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }

    if !barcode
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, digits, '-', '_' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query, or `None` when it is empty.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok((!query.is_empty()).then(|| query.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level given at product creation (zero allowed).
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a price, cost or balance: `0..=MAX_MONEY`.
pub fn validate_money(field: &str, amount: Money) -> ValidationResult<()> {
    if !(0..=MAX_MONEY).contains(&amount.minor()) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_MONEY,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use ombor_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

pub fn validate_new_category(input: &NewCategory) -> ValidationResult<()> {
    validate_name("name", &input.name)
}

/// Checks every field a new product needs.
pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    if input.category.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }
    validate_money("price", required(input.price, "price")?)?;
    validate_money("cost", required(input.cost, "cost")?)?;
    validate_stock_level("quantity", required(input.quantity, "quantity")?)?;
    if let Some(barcode) = &input.barcode {
        validate_barcode(barcode)?;
    }
    if let Some(min_stock) = input.min_stock {
        validate_stock_level("minStock", min_stock)?;
    }
    Ok(())
}

pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name("name", name)?;
    }
    if let Some(barcode) = &patch.barcode {
        validate_barcode(barcode)?;
    }
    if let Some(price) = patch.price {
        validate_money("price", price)?;
    }
    if let Some(cost) = patch.cost {
        validate_money("cost", cost)?;
    }
    if let Some(min_stock) = patch.min_stock {
        validate_stock_level("minStock", min_stock)?;
    }
    Ok(())
}

pub fn validate_new_debtor(input: &NewDebtor) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    validate_phone(&input.phone)?;
    if let Some(debt) = input.debt_amount {
        validate_money("debtAmount", debt)?;
    }
    if let Some(max) = input.max_debt_amount {
        validate_money("maxDebtAmount", max)?;
    }
    Ok(())
}

pub fn validate_debtor_patch(patch: &DebtorPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name("name", name)?;
    }
    if let Some(phone) = &patch.phone {
        validate_phone(phone)?;
    }
    if let Some(debt) = patch.debt_amount {
        validate_money("debtAmount", debt)?;
    }
    if let Some(max) = patch.max_debt_amount {
        validate_money("maxDebtAmount", max)?;
    }
    Ok(())
}

pub fn validate_debt_change(change: &DebtChange) -> ValidationResult<()> {
    if change.amount.is_zero() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    if !(-MAX_MONEY..=MAX_MONEY).contains(&change.amount.minor()) {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: MAX_MONEY,
        });
    }
    Ok(())
}

/// Validates the lines of a sale or transaction.
///
/// ## Rules
/// - 1..=MAX_RECORD_LINES lines
/// - every line names a product and has a valid quantity
/// - explicit prices are within `0..=MAX_MONEY`
pub fn validate_lines(lines: &[LineInput]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines.len() > MAX_RECORD_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_RECORD_LINES as i64,
        });
    }

    for line in lines {
        if line.product.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "items.product".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        if let Some(price) = line.price {
            validate_money("items.price", price)?;
        }
    }

    Ok(())
}

/// A credit sale must name the debtor it is charged to.
pub fn validate_new_sale(input: &NewSale) -> ValidationResult<()> {
    validate_lines(&input.items)?;
    if input.payment_method == PaymentMethod::Credit
        && input.debtor_id.as_deref().map_or(true, |d| d.trim().is_empty())
    {
        return Err(ValidationError::Required {
            field: "debtorId".to_string(),
        });
    }
    Ok(())
}

pub fn validate_new_transaction(input: &NewTransaction) -> ValidationResult<()> {
    validate_lines(&input.items)
}

fn required<T>(value: Option<T>, field: &str) -> ValidationResult<T> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

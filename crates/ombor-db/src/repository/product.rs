//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Filtered listing (category, search, stock status)
//! - Barcode lookup for the scanner
//! - CRUD with the category counter kept in the same transaction
//! - Low-stock list and catalog statistics
//!
//! ## Stock Is Not Editable Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/products      quantity = opening stock                      │
//! │  PUT  /api/products/{id} name, barcode, price, cost, ... (no quantity) │
//! │                                                                         │
//! │  Every later stock change goes through a sale / purchase / return      │
//! │  (protocol::apply_line) or its deletion (protocol::reverse_line).      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use ombor_core::report::ProductStats;
use ombor_core::validation::{validate_new_product, validate_product_patch};
use ombor_core::{
    CoreError, NewProduct, Product, ProductFilter, ProductPatch, StockStatus, DEFAULT_MIN_STOCK,
    DEFAULT_UNIT, LOW_STOCK_THRESHOLD,
};

use crate::error::{DbError, DbResult};
use crate::protocol::{lock_row, LockTable};
use crate::repository::category::shift_product_count;
use crate::repository::{begin, commit, generate_id, like_pattern};

/// Product columns plus the joined category name.
const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.barcode, p.category_id, c.name AS category_name,
           p.price, p.cost, p.quantity, p.unit, p.description, p.min_stock,
           p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let low = repo.list(&ProductFilter {
///     status: StockStatus::LowStock,
///     ..Default::default()
/// }).await?;
///
/// let scanned = repo.get_by_barcode("4780000000011").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products, newest first.
    ///
    /// ## Filters
    /// * `category_id` - exact category
    /// * `search` - case-insensitive substring of name or barcode
    /// * `status` - `active`, `low-stock`, `out-of-stock` or `all`
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        debug!(
            category = ?filter.category_id,
            search = ?search,
            status = ?filter.status,
            "Listing products"
        );

        let (min_qty, max_qty) = stock_bounds(filter.status);
        let sql = format!(
            r#"{PRODUCT_SELECT}
            WHERE (?1 IS NULL OR p.category_id = ?1)
              AND (?2 IS NULL OR p.name LIKE ?2 ESCAPE '\' OR p.barcode LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR p.quantity >= ?3)
              AND (?4 IS NULL OR p.quantity <= ?4)
            ORDER BY p.created_at DESC
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&filter.category_id)
            .bind(search)
            .bind(min_qty)
            .bind(max_qty)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Looks a product up by its exact barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Product> {
        let barcode = barcode.trim();
        let sql = format!("{PRODUCT_SELECT} WHERE p.barcode = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product with barcode", barcode))
    }

    /// Creates a product and bumps its category counter.
    ///
    /// ## Errors
    /// * `Validation` - missing name, price, cost or quantity
    /// * `CategoryNotFound` - the category does not exist
    /// * `Validation(Duplicate)` - the barcode is taken
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;

        let id = generate_id();
        let now = Utc::now();
        let category_id = input.category.trim();
        let barcode = non_blank(input.barcode.as_deref());

        debug!(name = %input.name.trim(), category = %category_id, "Creating product");

        let mut tx = begin(&self.pool).await?;

        // Counter first: it is the write that takes the lock, and it proves
        // the category exists.
        if !shift_product_count(&mut tx, category_id, 1).await? {
            return Err(CoreError::CategoryNotFound(category_id.to_string()).into());
        }

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, category_id, price, cost, quantity,
                unit, description, min_stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(barcode)
        .bind(category_id)
        .bind(input.price.unwrap_or_default())
        .bind(input.cost.unwrap_or_default())
        .bind(input.quantity.unwrap_or_default())
        .bind(non_blank(input.unit.as_deref()).unwrap_or(DEFAULT_UNIT))
        .bind(input.description.as_deref().unwrap_or_default().trim())
        .bind(input.min_stock.unwrap_or(DEFAULT_MIN_STOCK))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("barcode", barcode.unwrap_or_default()))?;

        commit(tx).await?;

        info!(id = %id, name = %input.name.trim(), "Product created");
        self.get(&id).await
    }

    /// Updates descriptive and pricing fields. Absent fields are kept, an
    /// empty barcode clears it.
    ///
    /// A category change moves one unit from the old counter to the new one.
    pub async fn update(&self, id: &str, patch: &ProductPatch) -> DbResult<Product> {
        validate_product_patch(patch)?;

        let mut tx = begin(&self.pool).await?;

        if !lock_row(&mut tx, LockTable::Products, id).await? {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        let current_category: String =
            sqlx::query_scalar("SELECT category_id FROM products WHERE id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let new_category = patch
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != current_category);

        if let Some(new_category) = new_category {
            if !shift_product_count(&mut tx, new_category, 1).await? {
                return Err(CoreError::CategoryNotFound(new_category.to_string()).into());
            }
            shift_product_count(&mut tx, &current_category, -1).await?;
            debug!(id = %id, from = %current_category, to = %new_category, "Product moved category");
        }

        let barcode = patch.barcode.as_deref().map(str::trim);

        sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?1, name),
                barcode = CASE WHEN ?2 IS NULL THEN barcode WHEN ?2 = '' THEN NULL ELSE ?2 END,
                category_id = COALESCE(?3, category_id),
                price = COALESCE(?4, price),
                cost = COALESCE(?5, cost),
                unit = COALESCE(?6, unit),
                description = COALESCE(?7, description),
                min_stock = COALESCE(?8, min_stock),
                updated_at = ?9
            WHERE id = ?10
            "#,
        )
        .bind(patch.name.as_deref().map(str::trim))
        .bind(barcode)
        .bind(new_category)
        .bind(patch.price)
        .bind(patch.cost)
        .bind(non_blank(patch.unit.as_deref()))
        .bind(patch.description.as_deref().map(str::trim))
        .bind(patch.min_stock)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("barcode", barcode.unwrap_or_default()))?;

        commit(tx).await?;

        debug!(id = %id, "Product updated");
        self.get(id).await
    }

    /// Deletes a product and decrements its category counter.
    ///
    /// Past sales and transactions keep their lines; reversing them later
    /// skips this product.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin(&self.pool).await?;

        let category_id: Option<String> =
            sqlx::query_scalar("DELETE FROM products WHERE id = ?1 RETURNING category_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(category_id) = category_id else {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        };

        shift_product_count(&mut tx, &category_id, -1).await?;
        commit(tx).await?;

        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// Products below the low-stock threshold, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.quantity < ?1 ORDER BY p.quantity ASC, p.name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(LOW_STOCK_THRESHOLD)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Counts and stock value across the catalog.
    pub async fn stats(&self) -> DbResult<ProductStats> {
        let stats = sqlx::query_as::<_, ProductStats>(
            r#"
            SELECT
                COUNT(*) AS total_products,
                COALESCE(SUM(CASE WHEN quantity < ?1 THEN 1 ELSE 0 END), 0) AS low_stock_products,
                COALESCE(SUM(CASE WHEN quantity <= 0 THEN 1 ELSE 0 END), 0) AS out_of_stock_products,
                COALESCE(SUM(quantity * price), 0) AS total_value
            FROM products
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Counts products (for diagnostics and the seed tool).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Inclusive quantity bounds for a stock filter.
fn stock_bounds(status: StockStatus) -> (Option<i64>, Option<i64>) {
    match status {
        StockStatus::All => (None, None),
        StockStatus::Active => (Some(1), None),
        StockStatus::LowStock => (None, Some(LOW_STOCK_THRESHOLD - 1)),
        StockStatus::OutOfStock => (None, Some(0)),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{category, db, product};
    use ombor_core::{Money, ValidationError};

    #[tokio::test]
    async fn test_create_bumps_category_count() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;

        let p = product(&db, &cat.id, "Cola 1L", 10, 1000, 600).await;
        assert_eq!(p.category_name.as_deref(), Some("Drinks"));
        assert_eq!(p.unit, DEFAULT_UNIT);
        assert_eq!(p.min_stock, DEFAULT_MIN_STOCK);
        assert_eq!(db.categories().get(&cat.id).await.unwrap().product_count, 1);
    }

    #[tokio::test]
    async fn test_create_with_missing_category_changes_nothing() {
        let db = db().await;
        let err = db
            .products()
            .create(&NewProduct {
                name: "Ghost".into(),
                category: "missing".into(),
                price: Some(Money::from_minor(1)),
                cost: Some(Money::from_minor(1)),
                quantity: Some(1),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::CategoryNotFound(_))));
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_price_is_required() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let err = db
            .products()
            .create(&NewProduct {
                name: "Cola".into(),
                category: cat.id.clone(),
                cost: Some(Money::from_minor(1)),
                quantity: Some(1),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: price is required");
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rolls_back_counter() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let input = NewProduct {
            name: "Cola".into(),
            barcode: Some("4780000000011".into()),
            category: cat.id.clone(),
            price: Some(Money::from_minor(1000)),
            cost: Some(Money::from_minor(600)),
            quantity: Some(5),
            ..Default::default()
        };
        db.products().create(&input).await.unwrap();

        let err = db.products().create(&input).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
        assert_eq!(db.categories().get(&cat.id).await.unwrap().product_count, 1);
    }

    #[tokio::test]
    async fn test_barcode_lookup_and_clear() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;
        let created = db
            .products()
            .create(&NewProduct {
                name: "Cola".into(),
                barcode: Some("111".into()),
                category: cat.id.clone(),
                price: Some(Money::from_minor(1000)),
                cost: Some(Money::from_minor(600)),
                quantity: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(db.products().get_by_barcode("111").await.unwrap().id, created.id);

        db.products()
            .update(
                &created.id,
                &ProductPatch {
                    barcode: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(db.products().get_by_barcode("111").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_category_change_moves_counter() {
        let db = db().await;
        let drinks = category(&db, "Drinks").await;
        let snacks = category(&db, "Snacks").await;
        let p = product(&db, &drinks.id, "Cola", 5, 1000, 600).await;

        let moved = db
            .products()
            .update(
                &p.id,
                &ProductPatch {
                    category: Some(snacks.id.clone()),
                    price: Some(Money::from_minor(1200)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(moved.category_id, snacks.id);
        assert_eq!(moved.price.minor(), 1200);
        assert_eq!(moved.quantity, 5);
        assert_eq!(db.categories().get(&drinks.id).await.unwrap().product_count, 0);
        assert_eq!(db.categories().get(&snacks.id).await.unwrap().product_count, 1);

        let err = db
            .products()
            .update(
                &p.id,
                &ProductPatch {
                    category: Some("missing".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(db.categories().get(&snacks.id).await.unwrap().product_count, 1);
    }

    #[tokio::test]
    async fn test_category_counts_match_after_create_delete_sequence() {
        let db = db().await;
        let a = category(&db, "A").await;
        let b = category(&db, "B").await;

        let mut ids = Vec::new();
        for i in 0..4 {
            let cat = if i % 2 == 0 { &a.id } else { &b.id };
            ids.push(product(&db, cat, &format!("P{i}"), 1, 100, 50).await.id);
        }
        db.products().delete(&ids[0]).await.unwrap();
        db.products().delete(&ids[3]).await.unwrap();
        assert!(db.products().delete(&ids[3]).await.unwrap_err().is_not_found());

        for cat in db.categories().list().await.unwrap() {
            let live: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
                    .bind(&cat.id)
                    .fetch_one(db.pool())
                    .await
                    .unwrap();
            assert_eq!(cat.product_count, live, "category {}", cat.name);
        }
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = db().await;
        let drinks = category(&db, "Drinks").await;
        let snacks = category(&db, "Snacks").await;
        product(&db, &drinks.id, "Cola", 50, 1000, 600).await;
        product(&db, &drinks.id, "Fanta", 3, 1000, 600).await;
        product(&db, &snacks.id, "Chips", 0, 800, 500).await;

        let repo = db.products();

        let all = repo.list(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let low = repo
            .list(&ProductFilter {
                status: StockStatus::LowStock,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 2);

        let out = repo
            .list(&ProductFilter {
                status: StockStatus::OutOfStock,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Chips");

        let found = repo
            .list(&ProductFilter {
                category_id: Some(drinks.id.clone()),
                search: Some("fan".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Fanta");

        let low_list = repo.low_stock().await.unwrap();
        assert_eq!(low_list[0].name, "Chips");
    }

    #[tokio::test]
    async fn test_stats() {
        let db = db().await;
        let cat = category(&db, "Drinks").await;

        let empty = db.products().stats().await.unwrap();
        assert_eq!(empty, ProductStats::default());

        product(&db, &cat.id, "Cola", 20, 1000, 600).await;
        product(&db, &cat.id, "Fanta", 3, 500, 300).await;
        product(&db, &cat.id, "Sprite", 0, 700, 400).await;

        let stats = db.products().stats().await.unwrap();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.low_stock_products, 2);
        assert_eq!(stats.out_of_stock_products, 1);
        assert_eq!(stats.total_value.minor(), 20 * 1000 + 3 * 500);
    }
}

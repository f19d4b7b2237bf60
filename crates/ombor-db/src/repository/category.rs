//! # Category Repository
//!
//! Categories and their denormalized `product_count`.
//!
//! ## Counter Maintenance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product create   ──► product_count + 1  ┐                             │
//! │  product delete   ──► product_count − 1  ├─ same SQL transaction as    │
//! │  category change  ──► old − 1, new + 1   ┘  the product write          │
//! │                                                                         │
//! │  reconcile_product_counts()                                            │
//! │  └── recomputes every counter from live products (startup, on demand)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use ombor_core::validation::{validate_name, validate_new_category};
use ombor_core::{Category, CategoryPatch, CoreError, NewCategory};

use crate::error::{DbError, DbResult};
use crate::protocol::{lock_row, LockTable};
use crate::repository::{begin, commit, generate_id};

const DEFAULT_COLOR: &str = "#3B82F6";
const DEFAULT_ICON: &str = "box";

/// A counter rewritten by [`CategoryRepository::reconcile_product_counts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CountCorrection {
    pub id: String,
    pub name: String,
    /// Live product count now stored.
    pub product_count: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// All categories, alphabetical.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    pub async fn get(&self, id: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::CategoryNotFound(id.to_string()).into())
    }

    /// Creates a category. Names are unique, ignoring case.
    pub async fn create(&self, input: &NewCategory) -> DbResult<Category> {
        validate_new_category(input)?;

        let name = input.name.trim();
        let now = Utc::now();
        let id = generate_id();

        debug!(name = %name, "Creating category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, color, icon, product_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(input.description.as_deref().unwrap_or_default().trim())
        .bind(non_blank(input.color.as_deref()).unwrap_or(DEFAULT_COLOR))
        .bind(non_blank(input.icon.as_deref()).unwrap_or(DEFAULT_ICON))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("name", name))?;

        self.get(&id).await
    }

    /// Changes name, description, color or icon. Absent fields are kept.
    pub async fn update(&self, id: &str, patch: &CategoryPatch) -> DbResult<Category> {
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }

        let name = patch.name.as_deref().map(str::trim);

        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                color = COALESCE(?3, color),
                icon = COALESCE(?4, icon),
                updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(name)
        .bind(patch.description.as_deref().map(str::trim))
        .bind(non_blank(patch.color.as_deref()))
        .bind(non_blank(patch.icon.as_deref()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).or_duplicate("name", name.unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::CategoryNotFound(id.to_string()).into());
        }

        self.get(id).await
    }

    /// Deletes a category that no product references.
    ///
    /// ## Errors
    /// - `CategoryNotFound`
    /// - `CategoryInUse` while live products still point at it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin(&self.pool).await?;

        if !lock_row(&mut tx, LockTable::Categories, id).await? {
            return Err(CoreError::CategoryNotFound(id.to_string()).into());
        }

        let (name, products): (String, i64) = sqlx::query_as(
            r#"
            SELECT c.name, (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id)
            FROM categories c
            WHERE c.id = ?1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if products > 0 {
            return Err(CoreError::CategoryInUse { name, products }.into());
        }

        sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        commit(tx).await?;

        info!(id = %id, name = %name, "Category deleted");
        Ok(())
    }

    /// Recomputes every `product_count` from the live products.
    ///
    /// Returns only the categories whose stored counter had drifted.
    pub async fn reconcile_product_counts(&self) -> DbResult<Vec<CountCorrection>> {
        // One statement, atomic on its own
        let corrections = sqlx::query_as::<_, CountCorrection>(
            r#"
            UPDATE categories
            SET product_count = (SELECT COUNT(*) FROM products p WHERE p.category_id = categories.id),
                updated_at = ?1
            WHERE product_count != (SELECT COUNT(*) FROM products p WHERE p.category_id = categories.id)
            RETURNING id, name, product_count
            "#,
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        for fix in &corrections {
            warn!(
                category = %fix.name,
                product_count = fix.product_count,
                "Category product counter drifted, corrected"
            );
        }
        if corrections.is_empty() {
            debug!("Category product counters consistent");
        }

        Ok(corrections)
    }
}

/// Moves a category counter inside an open transaction.
///
/// Returns `false` when the category does not exist. Decrements stop at 0.
pub(crate) async fn shift_product_count(
    conn: &mut SqliteConnection,
    category_id: &str,
    delta: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE categories
        SET product_count = MAX(product_count + ?1, 0), updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(category_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
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
    use ombor_core::ValidationError;

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let db = db().await;
        let created = category(&db, "  Ichimliklar ").await;

        assert_eq!(created.name, "Ichimliklar");
        assert_eq!(created.color, DEFAULT_COLOR);
        assert_eq!(created.icon, DEFAULT_ICON);
        assert_eq!(created.product_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected_ignoring_case() {
        let db = db().await;
        category(&db, "Drinks").await;

        let err = db
            .categories()
            .create(&NewCategory {
                name: "drinks".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields() {
        let db = db().await;
        let created = category(&db, "Drinks").await;

        let updated = db
            .categories()
            .update(
                &created.id,
                &CategoryPatch {
                    color: Some("#FF0000".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Drinks");
        assert_eq!(updated.color, "#FF0000");

        let missing = db
            .categories()
            .update("nope", &CategoryPatch::default())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_rejected_while_in_use() {
        let db = db().await;
        let cat = category(&db, "Snacks").await;
        let p = product(&db, &cat.id, "Chips", 5, 800, 500).await;

        let err = db.categories().delete(&cat.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CategoryInUse { products: 1, .. })
        ));

        db.products().delete(&p.id).await.unwrap();
        db.categories().delete(&cat.id).await.unwrap();

        let again = db.categories().delete(&cat.id).await.unwrap_err();
        assert!(again.is_not_found());
    }

    #[tokio::test]
    async fn test_reconcile_fixes_drift() {
        let db = db().await;
        let cat = category(&db, "Snacks").await;
        product(&db, &cat.id, "Chips", 5, 800, 500).await;
        product(&db, &cat.id, "Nuts", 5, 900, 600).await;

        sqlx::query("UPDATE categories SET product_count = 7 WHERE id = ?1")
            .bind(&cat.id)
            .execute(db.pool())
            .await
            .unwrap();

        let fixed = db.categories().reconcile_product_counts().await.unwrap();
        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].product_count, 2);
        assert_eq!(db.categories().get(&cat.id).await.unwrap().product_count, 2);

        let none = db.categories().reconcile_product_counts().await.unwrap();
        assert!(none.is_empty());
    }
}

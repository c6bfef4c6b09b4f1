use crate::adapter::database_error::DatabaseError;
use crate::domain::context::RequestContext;
use crate::domain::model::{
    Money, NewProduct, OrderId, Product, ProductId, StockItem, StockShortage,
};
use crate::domain::port::{ProductRepository, RepositoryError, ReservationOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, QueryBuilder, Row};

const PRODUCT_COLUMNS: &str = "id, name, price, stock_quantity, created_at, updated_at";

/// MySQL商品リポジトリ
/// 在庫予約は stock_reservations に注文単位で記録する
pub struct MySqlProductRepository {
    pool: Pool<MySql>,
}

impl MySqlProductRepository {
    /// 新しいMySQL商品リポジトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn build_product(row: &MySqlRow) -> Result<Product, RepositoryError> {
        let id = ProductId::from_string(row.get::<&str, _>("id"))
            .map_err(|e| RepositoryError::FetchFailed(format!("invalid product id: {}", e)))?;
        let price = Money::new(row.get::<Decimal, _>("price"))
            .map_err(|e| RepositoryError::FetchFailed(format!("invalid price: {}", e)))?;
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        Ok(Product::reconstruct(
            id,
            row.get("name"),
            price,
            row.get::<u32, _>("stock_quantity"),
            created_at,
            updated_at,
        ))
    }
}

#[async_trait]
impl ProductRepository for MySqlProductRepository {
    async fn create(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        let product_id = ProductId::generate();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock_quantity, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id.as_str())
        .bind(product.name())
        .bind(product.price().amount())
        .bind(product.stock_quantity())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("insert product", e))?;

        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            product_id = %product_id,
            "product persisted"
        );
        Ok(product.into_product(product_id, now))
    }

    async fn find_by_id(
        &self,
        _ctx: &RequestContext,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM products WHERE id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("find product", e))?;

        row.as_ref().map(Self::build_product).transpose()
    }

    async fn find_many_by_ids(
        &self,
        _ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE id IN (",
            PRODUCT_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for product_id in product_ids {
            separated.push_bind(product_id.as_str());
        }
        separated.push_unseparated(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("find products", e))?;

        rows.iter().map(Self::build_product).collect()
    }

    async fn update_stock_quantity(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
        change: i64,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("begin transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM products WHERE id = ? FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(product_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("lock product", e))?;

        let mut product = match row {
            Some(row) => Self::build_product(&row)?,
            None => return Err(RepositoryError::NotFound(format!("product {}", product_id))),
        };
        product.adjust_stock(change, Utc::now()).map_err(|e| {
            RepositoryError::ConstraintViolation(format!("product {}: {}", product_id, e))
        })?;

        sqlx::query("UPDATE products SET stock_quantity = ?, updated_at = ? WHERE id = ?")
            .bind(product.stock_quantity())
            .bind(product.updated_at())
            .bind(product_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("update stock quantity", e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("commit stock quantity", e))?;

        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            product_id = %product_id,
            change,
            "stock quantity persisted"
        );
        Ok(product)
    }

    async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("begin transaction", e))?;

        // 注文単位でべき等
        let existing = sqlx::query("SELECT 1 FROM stock_reservations WHERE order_id = ? LIMIT 1")
            .bind(order_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("find reservation", e))?;
        if existing.is_some() {
            tracing::debug!(
                correlation_id = ctx.correlation_id(),
                order_id = %order_id,
                "reservation already held"
            );
            return Ok(ReservationOutcome::Reserved);
        }

        let mut shortages = Vec::new();
        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - ?, updated_at = ?
                WHERE id = ? AND stock_quantity >= ?
                "#,
            )
            .bind(item.quantity)
            .bind(Utc::now())
            .bind(item.product_id.as_str())
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("decrement stock", e))?;

            if result.rows_affected() == 0 {
                let available = sqlx::query("SELECT stock_quantity FROM products WHERE id = ?")
                    .bind(item.product_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx("read stock", e))?
                    .map(|row| row.get::<u32, _>("stock_quantity"));
                shortages.push(StockShortage {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        if !shortages.is_empty() {
            // 並行した同じ注文の予約が先に確定していれば、その減算が不足の原因
            let held = sqlx::query(
                "SELECT 1 FROM stock_reservations WHERE order_id = ? LIMIT 1 FOR UPDATE",
            )
            .bind(order_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("recheck reservation", e))?;
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::from_sqlx("rollback reservation", e))?;
            return Ok(settle_shortages(shortages, held.is_some()));
        }

        for item in items {
            let inserted = sqlx::query(
                "INSERT INTO stock_reservations (order_id, product_id, quantity) VALUES (?, ?, ?)",
            )
            .bind(order_id.as_str())
            .bind(item.product_id.as_str())
            .bind(item.quantity)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                // 同じ注文の予約が並行して確定した
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    tx.rollback()
                        .await
                        .map_err(|e| DatabaseError::from_sqlx("rollback reservation", e))?;
                    return Ok(ReservationOutcome::Reserved);
                }
                Err(e) => return Err(DatabaseError::from_sqlx("insert reservation", e).into()),
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("commit reservation", e))?;
        Ok(ReservationOutcome::Reserved)
    }

    async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("begin transaction", e))?;

        let rows = sqlx::query(
            "SELECT product_id, quantity FROM stock_reservations WHERE order_id = ? FOR UPDATE",
        )
        .bind(order_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("find reservation", e))?;

        if rows.is_empty() {
            return Ok(false);
        }

        for row in &rows {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity + ?, updated_at = ? WHERE id = ?",
            )
            .bind(row.get::<u32, _>("quantity"))
            .bind(Utc::now())
            .bind(row.get::<&str, _>("product_id"))
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("restore stock", e))?;
        }

        sqlx::query("DELETE FROM stock_reservations WHERE order_id = ?")
            .bind(order_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("delete reservation", e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("commit release", e))?;

        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            order_id = %order_id,
            items = rows.len(),
            "reservation released"
        );
        Ok(true)
    }
}

/// 減算できなかった商品がある予約の結果を決める
/// 同じ注文の予約が既に存在するなら、不足ではなく予約済みとして扱う
fn settle_shortages(shortages: Vec<StockShortage>, held_by_order: bool) -> ReservationOutcome {
    if held_by_order {
        ReservationOutcome::Reserved
    } else {
        ReservationOutcome::Insufficient(shortages)
    }
}

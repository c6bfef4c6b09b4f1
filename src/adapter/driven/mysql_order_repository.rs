use crate::adapter::database_error::DatabaseError;
use crate::domain::context::RequestContext;
use crate::domain::error::DomainError;
use crate::domain::model::{
    Money, NewOrder, Order, OrderId, OrderItem, OrderStatus, ProductId, UserId,
};
use crate::domain::port::{OrderRepository, RepositoryError, StatusChange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};

/// MySQL注文リポジトリ
/// 注文ヘッダーを orders に、明細を order_items に保存する
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn fetch_failed(what: &str) -> impl Fn(DomainError) -> RepositoryError + '_ {
        move |e| RepositoryError::FetchFailed(format!("failed to restore {}: {}", what, e))
    }

    fn build_item(row: &MySqlRow) -> Result<OrderItem, RepositoryError> {
        let product_id = ProductId::from_string(row.get::<&str, _>("product_id"))
            .map_err(Self::fetch_failed("product id"))?;
        let unit_price = Money::new(row.get::<Decimal, _>("unit_price"))
            .map_err(Self::fetch_failed("unit price"))?;
        OrderItem::reconstruct(product_id, row.get::<u32, _>("quantity"), unit_price)
            .map_err(Self::fetch_failed("order item"))
    }

    /// ヘッダー行と明細行から注文集約を再構築する
    fn build_order(header: &MySqlRow, item_rows: &[MySqlRow]) -> Result<Order, RepositoryError> {
        let order_id = OrderId::from_string(header.get::<&str, _>("id"))
            .map_err(Self::fetch_failed("order id"))?;
        let user_id = UserId::from_string(header.get::<&str, _>("user_id"))
            .map_err(Self::fetch_failed("user id"))?;
        let total_price = Money::new(header.get::<Decimal, _>("total_price"))
            .map_err(Self::fetch_failed("total price"))?;
        let status = OrderStatus::from_string(header.get::<&str, _>("status"))
            .map_err(Self::fetch_failed("order status"))?;
        let status_reason: Option<String> = header.get("status_reason");
        let created_at: DateTime<Utc> = header.get("created_at");
        let updated_at: DateTime<Utc> = header.get("updated_at");

        let items = item_rows
            .iter()
            .map(Self::build_item)
            .collect::<Result<Vec<_>, _>>()?;

        Order::reconstruct(
            order_id,
            user_id,
            items,
            total_price,
            status,
            status_reason,
            created_at,
            updated_at,
        )
        .map_err(Self::fetch_failed("order"))
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn create(&self, ctx: &RequestContext, order: NewOrder) -> Result<Order, RepositoryError> {
        let order_id = OrderId::generate();
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_price, status, status_reason, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(order_id.as_str())
        .bind(order.user_id().as_str())
        .bind(order.total_price().amount())
        .bind(order.status().as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("insert order", e))?;

        for (line_no, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, quantity, unit_price)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(order_id.as_str())
            .bind(line_no as u32)
            .bind(item.product_id().as_str())
            .bind(item.quantity())
            .bind(item.unit_price().amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("insert order item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("commit order", e))?;

        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            order_id = %order_id,
            "order persisted"
        );
        Ok(order.into_order(order_id, now))
    }

    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let header = sqlx::query(
            r#"
            SELECT id, user_id, total_price, status, status_reason, created_at, updated_at
            FROM orders
            WHERE id = ?
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("find order", e))?;

        let Some(header) = header else {
            tracing::debug!(
                correlation_id = ctx.correlation_id(),
                order_id = %order_id,
                "order not found"
            );
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ?
            ORDER BY line_no
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("find order items", e))?;

        Self::build_order(&header, &item_rows).map(Some)
    }

    async fn update_status(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, status_reason = COALESCE(?, status_reason), updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(change.new.as_str())
        .bind(change.reason.as_deref())
        .bind(Utc::now())
        .bind(order_id.as_str())
        .bind(change.expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("update order status", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // 0件の場合、注文が存在しないのか状態が変わっていたのかを区別する
        let exists = sqlx::query("SELECT 1 FROM orders WHERE id = ?")
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("check order exists", e))?
            .is_some();
        if !exists {
            return Err(RepositoryError::NotFound(format!("order {}", order_id)));
        }

        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            order_id = %order_id,
            expected = %change.expected,
            "status compare-and-swap lost"
        );
        Ok(false)
    }
}

//! インメモリ実装
//!
//! テストとローカル動作確認用。MySQL実装と同じ契約（CAS更新、全件か無しかの予約、
//! 注文単位でべき等な予約）をMutexの中で満たす。

use crate::application::service::InventoryApplicationService;
use crate::application::ApplicationError;
use crate::domain::context::RequestContext;
use crate::domain::error::DomainError;
use crate::domain::model::{
    Money, NewOrder, NewProduct, Order, OrderId, Product, ProductId, StockItem, StockShortage,
};
use crate::domain::port::{
    GatewayError, InventoryGateway, OrderRepository, ProductRepository, RepositoryError,
    ReservationOutcome, StatusChange,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // 保持中にpanicしたスレッドがあってもデータ自体は壊れていない
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// インメモリ注文リポジトリ
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存されている注文数
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, _ctx: &RequestContext, order: NewOrder) -> Result<Order, RepositoryError> {
        let order = order.into_order(OrderId::generate(), Utc::now());
        lock(&self.orders).insert(order.id().clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(
        &self,
        _ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.orders).get(order_id).cloned())
    }

    async fn update_status(
        &self,
        _ctx: &RequestContext,
        order_id: &OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError> {
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))?;
        if order.status() != change.expected {
            return Ok(false);
        }
        order.record_status(change.new, change.reason.clone(), Utc::now());
        Ok(true)
    }
}

#[derive(Default)]
struct ProductState {
    products: HashMap<ProductId, Product>,
    reservations: HashMap<OrderId, Vec<StockItem>>,
}

/// インメモリ商品リポジトリ
#[derive(Default)]
pub struct InMemoryProductRepository {
    state: Mutex<ProductState>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDを指定して商品を登録する（テストデータ用）
    pub fn seed(
        &self,
        product_id: &str,
        name: &str,
        price: Money,
        stock_quantity: u32,
    ) -> Result<Product, DomainError> {
        let product_id = ProductId::from_string(product_id)?;
        let product = NewProduct::new(name.to_string(), price, stock_quantity)?
            .into_product(product_id.clone(), Utc::now());
        lock(&self.state)
            .products
            .insert(product_id, product.clone());
        Ok(product)
    }

    /// 現在の在庫数
    pub fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        lock(&self.state)
            .products
            .get(product_id)
            .map(Product::stock_quantity)
    }

    /// 予約を保持している注文数
    pub fn reservation_count(&self) -> usize {
        lock(&self.state).reservations.len()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(
        &self,
        _ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        let product = product.into_product(ProductId::generate(), Utc::now());
        lock(&self.state)
            .products
            .insert(product.id().clone(), product.clone());
        Ok(product)
    }

    async fn find_by_id(
        &self,
        _ctx: &RequestContext,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.state).products.get(product_id).cloned())
    }

    async fn find_many_by_ids(
        &self,
        _ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = lock(&self.state);
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn update_stock_quantity(
        &self,
        _ctx: &RequestContext,
        product_id: &ProductId,
        change: i64,
    ) -> Result<Product, RepositoryError> {
        let mut state = lock(&self.state);
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", product_id)))?;
        product.adjust_stock(change, Utc::now()).map_err(|e| {
            RepositoryError::ConstraintViolation(format!("product {}: {}", product_id, e))
        })?;
        Ok(product.clone())
    }

    async fn reserve_stock(
        &self,
        _ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, RepositoryError> {
        let mut state = lock(&self.state);
        if state.reservations.contains_key(order_id) {
            return Ok(ReservationOutcome::Reserved);
        }

        let shortages: Vec<StockShortage> = items
            .iter()
            .filter_map(|item| {
                let available = state.products.get(&item.product_id).map(Product::stock_quantity);
                match available {
                    Some(stock) if stock >= item.quantity => None,
                    available => Some(StockShortage {
                        product_id: item.product_id.clone(),
                        requested: item.quantity,
                        available,
                    }),
                }
            })
            .collect();
        if !shortages.is_empty() {
            return Ok(ReservationOutcome::Insufficient(shortages));
        }

        let now = Utc::now();
        for item in items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product
                    .reserve(item.quantity, now)
                    .map_err(|e| RepositoryError::ConstraintViolation(e.to_string()))?;
            }
        }
        state.reservations.insert(order_id.clone(), items.to_vec());
        Ok(ReservationOutcome::Reserved)
    }

    async fn release_stock(
        &self,
        _ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, RepositoryError> {
        let mut state = lock(&self.state);
        let Some(items) = state.reservations.remove(order_id) else {
            return Ok(false);
        };
        let now = Utc::now();
        for item in items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.release(item.quantity, now);
            }
        }
        Ok(true)
    }
}

/// 同一プロセス内の在庫アプリケーションサービスを呼び出すゲートウェイ
/// gRPCを介さずにワークフロー全体を動かすために使う
pub struct InProcessInventoryGateway {
    inventory: Arc<InventoryApplicationService>,
}

impl InProcessInventoryGateway {
    pub fn new(inventory: Arc<InventoryApplicationService>) -> Self {
        Self { inventory }
    }

    fn check_deadline(ctx: &RequestContext) -> Result<(), GatewayError> {
        if ctx.is_expired() {
            return Err(GatewayError::DeadlineExceeded);
        }
        Ok(())
    }
}

fn to_gateway_error(err: ApplicationError) -> GatewayError {
    match err {
        ApplicationError::InvalidInput(msg) | ApplicationError::NotFound(msg) => {
            GatewayError::Rejected(msg)
        }
        other => GatewayError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl InventoryGateway for InProcessInventoryGateway {
    async fn resolve_prices(
        &self,
        ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Money>, GatewayError> {
        Self::check_deadline(ctx)?;
        let products = self
            .inventory
            .get_products_by_ids(ctx, product_ids)
            .await
            .map_err(to_gateway_error)?;
        Ok(products
            .into_iter()
            .map(|product| (product.id().clone(), product.price()))
            .collect())
    }

    async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, GatewayError> {
        Self::check_deadline(ctx)?;
        self.inventory
            .reserve_stock(ctx, order_id, items)
            .await
            .map_err(to_gateway_error)
    }

    async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, GatewayError> {
        Self::check_deadline(ctx)?;
        self.inventory
            .release_stock(ctx, order_id)
            .await
            .map_err(to_gateway_error)
    }
}

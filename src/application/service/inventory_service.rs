use crate::application::ApplicationError;
use crate::domain::context::RequestContext;
use crate::domain::model::{Money, NewProduct, OrderId, Product, ProductId, StockItem};
use crate::domain::port::{ProductRepository, ReservationOutcome};
use crate::domain::service::merge_stock_items;
use std::sync::Arc;

/// 在庫アプリケーションサービス
/// 商品の登録・価格照会・在庫の予約と解放を提供する
pub struct InventoryApplicationService {
    product_repository: Arc<dyn ProductRepository>,
}

impl InventoryApplicationService {
    /// 新しい在庫アプリケーションサービスを作成
    ///
    /// # Arguments
    /// * `product_repository` - 商品リポジトリ
    pub fn new(product_repository: Arc<dyn ProductRepository>) -> Self {
        Self { product_repository }
    }

    /// 商品を登録する
    ///
    /// # Arguments
    /// * `name` - 商品名（空不可）
    /// * `price` - 価格（0より大きい）
    /// * `stock_quantity` - 初期在庫数（0より大きい）
    ///
    /// # Returns
    /// * `Ok(Product)` - 登録された商品
    /// * `Err(ApplicationError::InvalidInput)` - 入力値の誤り
    #[tracing::instrument(
        skip(self, ctx, name),
        fields(correlation_id = %ctx.correlation_id())
    )]
    pub async fn add_product(
        &self,
        ctx: &RequestContext,
        name: String,
        price: Money,
        stock_quantity: u32,
    ) -> Result<Product, ApplicationError> {
        if price.is_zero() {
            return Err(ApplicationError::InvalidInput(
                "price must be greater than zero".to_string(),
            ));
        }
        if stock_quantity == 0 {
            return Err(ApplicationError::InvalidInput(
                "stock quantity must be greater than zero".to_string(),
            ));
        }
        let product = NewProduct::new(name, price, stock_quantity)?;

        let product = self
            .product_repository
            .create(ctx, product)
            .await
            .map_err(ApplicationError::storage("create product"))?;
        tracing::info!(product_id = %product.id(), "product registered");
        Ok(product)
    }

    /// 商品IDで商品を取得
    ///
    /// # Returns
    /// * `Ok(Product)` - 商品が見つかった
    /// * `Err(ApplicationError::NotFound)` - 商品が存在しない
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn get_product(
        &self,
        ctx: &RequestContext,
        product_id: &str,
    ) -> Result<Product, ApplicationError> {
        let product_id = ProductId::from_string(product_id)?;
        self.product_repository
            .find_by_id(ctx, &product_id)
            .await
            .map_err(ApplicationError::storage("get product"))?
            .ok_or_else(|| ApplicationError::NotFound(format!("product {}", product_id)))
    }

    /// 複数の商品をまとめて取得
    /// 存在しないIDは結果から除かれる
    pub async fn get_products_by_ids(
        &self,
        ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<Vec<Product>, ApplicationError> {
        let mut ids = product_ids.to_vec();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.product_repository
            .find_many_by_ids(ctx, &ids)
            .await
            .map_err(ApplicationError::storage("get products"))
    }

    /// 在庫数を増減する
    ///
    /// # Returns
    /// * `Ok(Product)` - 更新後の商品
    /// * `Err(ApplicationError::NotFound)` - 商品が存在しない（他の在庫は変わらない）
    /// * `Err(ApplicationError::InvalidInput)` - 在庫数が負になる
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn update_stock_quantity(
        &self,
        ctx: &RequestContext,
        product_id: &str,
        change: i64,
    ) -> Result<Product, ApplicationError> {
        let product_id = ProductId::from_string(product_id)?;
        let product = self
            .product_repository
            .update_stock_quantity(ctx, &product_id, change)
            .await
            .map_err(ApplicationError::storage("update stock quantity"))?;
        tracing::info!(
            product_id = %product_id,
            stock_quantity = product.stock_quantity(),
            "stock quantity updated"
        );
        Ok(product)
    }

    /// 注文の在庫を予約する
    /// 同じ商品の明細はまとめてから予約する
    #[tracing::instrument(
        skip(self, ctx, order_id, items),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, ApplicationError> {
        if items.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "reservation must contain at least one item".to_string(),
            ));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(ApplicationError::InvalidInput(
                "reservation quantity must be greater than zero".to_string(),
            ));
        }

        let items = merge_stock_items(items)?;
        let outcome = self
            .product_repository
            .reserve_stock(ctx, order_id, &items)
            .await
            .map_err(ApplicationError::storage("reserve stock"))?;

        match &outcome {
            ReservationOutcome::Reserved => tracing::info!("stock reserved"),
            ReservationOutcome::Insufficient(shortages) => {
                tracing::info!(shortages = shortages.len(), "stock unavailable")
            }
        }
        Ok(outcome)
    }

    /// 注文の在庫予約を解放する
    ///
    /// # Returns
    /// * `Ok(true)` - 解放した
    /// * `Ok(false)` - 予約が存在しなかった
    #[tracing::instrument(
        skip(self, ctx, order_id),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, ApplicationError> {
        let released = self
            .product_repository
            .release_stock(ctx, order_id)
            .await
            .map_err(ApplicationError::storage("release stock"))?;
        if released {
            tracing::info!("stock released");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::in_memory::InMemoryProductRepository;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn setup() -> (Arc<InMemoryProductRepository>, InventoryApplicationService) {
        let repository = Arc::new(InMemoryProductRepository::new());
        let service = InventoryApplicationService::new(repository.clone());
        (repository, service)
    }

    fn item(product_id: &ProductId, quantity: u32) -> StockItem {
        StockItem {
            product_id: product_id.clone(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_add_product_and_get_price() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();

        let product = service
            .add_product(&ctx, "Keyboard".to_string(), money("49.90"), 10)
            .await
            .unwrap();
        let found = service
            .get_product(&ctx, product.id().as_str())
            .await
            .unwrap();

        assert_eq!(found.price(), money("49.90"));
        assert_eq!(found.stock_quantity(), 10);
    }

    #[tokio::test]
    async fn test_add_product_rejects_zero_values() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();

        let zero_price = service
            .add_product(&ctx, "Mouse".to_string(), Money::zero(), 1)
            .await;
        assert!(matches!(zero_price, Err(ApplicationError::InvalidInput(_))));

        let zero_stock = service
            .add_product(&ctx, "Mouse".to_string(), money("9.99"), 0)
            .await;
        assert!(matches!(zero_stock, Err(ApplicationError::InvalidInput(_))));

        let blank_name = service
            .add_product(&ctx, "  ".to_string(), money("9.99"), 1)
            .await;
        assert!(matches!(blank_name, Err(ApplicationError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_product_is_not_found() {
        let (_, service) = setup();
        let result = service
            .get_product(&RequestContext::generate(), "missing")
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_stock_on_unknown_product_leaves_others_unchanged() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();
        let product = service
            .add_product(&ctx, "Cable".to_string(), money("3.00"), 5)
            .await
            .unwrap();

        let result = service.update_stock_quantity(&ctx, "missing", 3).await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));

        let unchanged = service
            .get_product(&ctx, product.id().as_str())
            .await
            .unwrap();
        assert_eq!(unchanged.stock_quantity(), 5);
    }

    #[tokio::test]
    async fn test_update_stock_cannot_go_negative() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();
        let product = service
            .add_product(&ctx, "Cable".to_string(), money("3.00"), 5)
            .await
            .unwrap();

        let result = service
            .update_stock_quantity(&ctx, product.id().as_str(), -6)
            .await;
        assert!(matches!(result, Err(ApplicationError::InvalidInput(_))));

        let updated = service
            .update_stock_quantity(&ctx, product.id().as_str(), -5)
            .await
            .unwrap();
        assert_eq!(updated.stock_quantity(), 0);
    }

    #[tokio::test]
    async fn test_reserve_and_release_stock() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();
        let product = service
            .add_product(&ctx, "Monitor".to_string(), money("199.00"), 3)
            .await
            .unwrap();
        let order_id = OrderId::generate();

        // 同じ商品の明細はまとめて予約される
        let outcome = service
            .reserve_stock(
                &ctx,
                &order_id,
                &[item(product.id(), 1), item(product.id(), 2)],
            )
            .await
            .unwrap();
        assert_eq!(outcome, ReservationOutcome::Reserved);
        let reserved = service.get_product(&ctx, product.id().as_str()).await.unwrap();
        assert_eq!(reserved.stock_quantity(), 0);

        assert!(service.release_stock(&ctx, &order_id).await.unwrap());
        assert!(!service.release_stock(&ctx, &order_id).await.unwrap());
        let released = service.get_product(&ctx, product.id().as_str()).await.unwrap();
        assert_eq!(released.stock_quantity(), 3);
    }

    #[tokio::test]
    async fn test_reserve_stock_rejects_overflowing_quantities() {
        let (repository, service) = setup();
        let ctx = RequestContext::generate();
        repository
            .seed("P1", "Screw", money("0.10"), u32::MAX)
            .unwrap();
        let product_id = ProductId::from_string("P1").unwrap();

        let result = service
            .reserve_stock(
                &ctx,
                &OrderId::generate(),
                &[item(&product_id, 4_000_000_000), item(&product_id, 4_000_000_000)],
            )
            .await;

        assert!(matches!(result, Err(ApplicationError::InvalidInput(_))), "{:?}", result);
        assert_eq!(repository.stock_of(&product_id), Some(u32::MAX));
        assert_eq!(repository.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_stock_is_all_or_nothing() {
        let (_, service) = setup();
        let ctx = RequestContext::generate();
        let plenty = service
            .add_product(&ctx, "Pen".to_string(), money("1.00"), 100)
            .await
            .unwrap();
        let scarce = service
            .add_product(&ctx, "Notebook".to_string(), money("2.50"), 1)
            .await
            .unwrap();

        let outcome = service
            .reserve_stock(
                &ctx,
                &OrderId::generate(),
                &[item(plenty.id(), 10), item(scarce.id(), 2)],
            )
            .await
            .unwrap();

        match outcome {
            ReservationOutcome::Insufficient(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(&shortages[0].product_id, scarce.id());
                assert_eq!(shortages[0].requested, 2);
                assert_eq!(shortages[0].available, Some(1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let untouched = service.get_product(&ctx, plenty.id().as_str()).await.unwrap();
        assert_eq!(untouched.stock_quantity(), 100);
    }

    #[tokio::test]
    async fn test_reserve_stock_rejects_empty_items() {
        let (_, service) = setup();
        let result = service
            .reserve_stock(&RequestContext::generate(), &OrderId::generate(), &[])
            .await;
        assert!(matches!(result, Err(ApplicationError::InvalidInput(_))));
    }
}

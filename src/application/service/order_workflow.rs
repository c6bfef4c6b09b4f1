use crate::application::ApplicationError;
use crate::domain::context::RequestContext;
use crate::domain::event::{OrderEvent, TransitionOutcome};
use crate::domain::model::{
    NewOrder, Order, OrderId, OrderItemRequest, OrderStatus, ProductId, StockItem, StockShortage,
    Transition, UserId,
};
use crate::domain::port::{
    InventoryGateway, OrderRepository, RepositoryError, ReservationOutcome, StatusChange,
};
use crate::domain::service::{distinct_product_ids, merge_stock_items};
use std::sync::Arc;

/// CAS更新で競合に負けたときに読み直す上限
/// 状態機械は単調なので状態数を超えて競合し続けることはない
const MAX_TRANSITION_ATTEMPTS: usize = 4;

/// 注文作成リクエストの1行（未検証）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: u32,
}

/// イベント適用後の注文と適用結果
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTransition {
    pub order: Order,
    pub outcome: TransitionOutcome,
}

/// 注文ワークフローサービス
///
/// 注文作成時の価格解決と、非同期イベントによる注文ステータスの遷移を担う。
/// ステータスの書き込みはすべてリポジトリのcompare-and-swapを通すため、
/// 同じ注文に対するイベントが並行して届いても遷移は1回だけ適用される。
pub struct OrderWorkflowService {
    order_repository: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryGateway>,
}

impl OrderWorkflowService {
    /// 新しい注文ワークフローサービスを作成
    ///
    /// # Arguments
    /// * `order_repository` - 注文リポジトリ
    /// * `inventory` - 在庫サービスへのゲートウェイ
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryGateway>,
    ) -> Self {
        Self {
            order_repository,
            inventory,
        }
    }

    /// 新しい注文を作成
    ///
    /// 全商品の価格を在庫サービスから解決し、合計金額を確定して
    /// PENDINGとして保存する。1つでも価格が見つからなければ何も保存しない。
    ///
    /// # Returns
    /// * `Ok(Order)` - 保存された注文
    /// * `Err(ApplicationError::InvalidInput)` - 入力値の誤り
    /// * `Err(ApplicationError::PriceNotFound)` - 価格を解決できない商品がある
    /// * `Err(ApplicationError::Upstream)` - 在庫サービス呼び出しの失敗
    /// * `Err(ApplicationError::Storage)` - 保存失敗
    #[tracing::instrument(
        skip(self, ctx, items),
        fields(correlation_id = %ctx.correlation_id(), items = items.len())
    )]
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        items: Vec<OrderLineInput>,
    ) -> Result<Order, ApplicationError> {
        let user_id = UserId::from_string(user_id)?;
        if items.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "order must contain at least one item".to_string(),
            ));
        }
        let requests = items
            .into_iter()
            .map(|line| {
                let product_id = ProductId::from_string(&line.product_id)?;
                OrderItemRequest::new(product_id, line.quantity)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let stock_items: Vec<_> = requests
            .iter()
            .map(|request| StockItem {
                product_id: request.product_id().clone(),
                quantity: request.quantity(),
            })
            .collect();
        merge_stock_items(&stock_items)?;

        let product_ids = distinct_product_ids(&requests);
        let prices = self
            .inventory
            .resolve_prices(ctx, &product_ids)
            .await
            .map_err(ApplicationError::upstream("resolve prices"))?;

        let new_order = NewOrder::price(user_id, requests, &prices).map_err(|e| {
            tracing::warn!(error = %e, "order rejected during price resolution");
            ApplicationError::from(e)
        })?;

        let order = self
            .order_repository
            .create(ctx, new_order)
            .await
            .map_err(ApplicationError::storage("create order"))?;
        tracing::info!(
            order_id = %order.id(),
            total_price = %order.total_price(),
            "order created"
        );
        Ok(order)
    }

    /// 注文IDで注文を取得
    ///
    /// # Returns
    /// * `Ok(Order)` - 最新の永続化状態
    /// * `Err(ApplicationError::NotFound)` - 注文が存在しない
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn get_order_by_id(
        &self,
        ctx: &RequestContext,
        order_id: &str,
    ) -> Result<Order, ApplicationError> {
        let order_id = OrderId::from_string(order_id)?;
        self.load(ctx, &order_id).await
    }

    /// 在庫予約完了イベントを処理
    ///
    /// PENDING → STOCK_RESERVED。キャンセル済みの注文に遅れて届いた場合は
    /// 予約済みの在庫を解放する。
    #[tracing::instrument(
        skip(self, ctx, order_id),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn handle_stock_reserved(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<OrderTransition, ApplicationError> {
        let transition = self
            .apply_event(ctx, order_id, &OrderEvent::StockReserved)
            .await?;

        if transition.outcome
            == (TransitionOutcome::Superseded {
                status: OrderStatus::Cancelled,
            })
        {
            tracing::warn!("stock reserved for a cancelled order, releasing it");
            self.release_reservation(ctx, order_id).await?;
        }
        Ok(transition)
    }

    /// 在庫不足イベントを処理
    ///
    /// PENDING → CANCELLED。不足明細をキャンセル理由として記録する。
    #[tracing::instrument(
        skip(self, ctx, order_id, unavailable),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn handle_stock_unavailable(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        unavailable: Vec<StockShortage>,
    ) -> Result<OrderTransition, ApplicationError> {
        self.apply_event(ctx, order_id, &OrderEvent::StockUnavailable { unavailable })
            .await
    }

    /// 支払い成功イベントを処理
    ///
    /// STOCK_RESERVED → PAID。在庫予約前の注文には適用できない。
    #[tracing::instrument(
        skip(self, ctx, order_id),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn handle_payment_succeeded(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<OrderTransition, ApplicationError> {
        self.apply_event(ctx, order_id, &OrderEvent::PaymentSucceeded)
            .await
    }

    /// 支払い失敗イベントを処理
    ///
    /// PENDING | STOCK_RESERVED → CANCELLED の後、補償処理として在庫を解放する。
    /// 既にキャンセル済みでも解放は再試行する（前回の補償が失敗していた場合）。
    #[tracing::instrument(
        skip(self, ctx, order_id, reason),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn handle_payment_failed(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<OrderTransition, ApplicationError> {
        let event = OrderEvent::PaymentFailed {
            reason: reason.to_string(),
        };
        let transition = self.apply_event(ctx, order_id, &event).await?;

        if transition.order.status() == OrderStatus::Cancelled {
            self.release_reservation(ctx, order_id).await?;
        }
        Ok(transition)
    }

    /// PENDINGの注文の在庫を予約し、結果を対応するイベントとして適用する
    ///
    /// PENDING以外の注文は変更せずに現在の状態を返す。
    #[tracing::instrument(
        skip(self, ctx, order_id),
        fields(correlation_id = %ctx.correlation_id(), order_id = %order_id)
    )]
    pub async fn reserve_stock_for_order(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<OrderTransition, ApplicationError> {
        let order = self.load(ctx, order_id).await?;
        let status = order.status();
        if status != OrderStatus::Pending {
            let outcome = if status == OrderStatus::Cancelled {
                TransitionOutcome::Superseded { status }
            } else {
                TransitionOutcome::AlreadyApplied { status }
            };
            return Ok(OrderTransition { order, outcome });
        }

        let items: Vec<_> = order.items().iter().map(|item| item.stock_item()).collect();
        let items = merge_stock_items(&items)?;
        let reservation = self
            .inventory
            .reserve_stock(ctx, order_id, &items)
            .await
            .map_err(ApplicationError::upstream("reserve stock"))?;

        match reservation {
            ReservationOutcome::Reserved => self.handle_stock_reserved(ctx, order_id).await,
            ReservationOutcome::Insufficient(unavailable) => {
                self.handle_stock_unavailable(ctx, order_id, unavailable)
                    .await
            }
        }
    }

    async fn load(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Order, ApplicationError> {
        self.order_repository
            .find_by_id(ctx, order_id)
            .await
            .map_err(ApplicationError::storage("get order"))?
            .ok_or_else(|| ApplicationError::NotFound(format!("order {}", order_id)))
    }

    /// イベントを状態機械に通し、必要ならCAS更新する
    /// 競合に負けた場合は読み直して計画し直す
    async fn apply_event(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        event: &OrderEvent,
    ) -> Result<OrderTransition, ApplicationError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let order = self.load(ctx, order_id).await?;
            let current = order.status();

            let transition = order.plan(event).map_err(|e| {
                tracing::warn!(status = %current, event = %event.kind(), "transition rejected");
                ApplicationError::from_domain_for_order(order_id, e)
            })?;

            let next = match transition {
                Transition::MoveTo(next) => next,
                Transition::AlreadyApplied => {
                    tracing::debug!(status = %current, event = %event.kind(), "event already applied");
                    return Ok(OrderTransition {
                        order,
                        outcome: TransitionOutcome::AlreadyApplied { status: current },
                    });
                }
                Transition::Superseded => {
                    tracing::info!(status = %current, event = %event.kind(), "event superseded by terminal state");
                    return Ok(OrderTransition {
                        order,
                        outcome: TransitionOutcome::Superseded { status: current },
                    });
                }
            };

            let change = StatusChange {
                expected: current,
                new: next,
                reason: event.cancellation_reason(),
            };
            let swapped = self
                .order_repository
                .update_status(ctx, order_id, &change)
                .await
                .map_err(ApplicationError::storage("update order status"))?;
            if !swapped {
                tracing::debug!(attempt, expected = %current, "status changed concurrently, retrying");
                continue;
            }

            tracing::info!(from = %current, to = %next, "order status changed");
            let order = self.load(ctx, order_id).await?;
            return Ok(OrderTransition {
                order,
                outcome: TransitionOutcome::Applied {
                    from: current,
                    to: next,
                },
            });
        }

        tracing::error!("order status did not settle after repeated conflicts");
        Err(ApplicationError::Storage {
            operation: "update order status",
            source: RepositoryError::OperationFailed(format!(
                "order {} kept changing during {} attempts",
                order_id, MAX_TRANSITION_ATTEMPTS
            )),
        })
    }

    async fn release_reservation(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<(), ApplicationError> {
        let released = self
            .inventory
            .release_stock(ctx, order_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to release reserved stock");
                ApplicationError::upstream("release stock")(e)
            })?;
        tracing::debug!(released, "stock release requested");
        Ok(())
    }
}

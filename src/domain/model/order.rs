use crate::domain::error::DomainError;
use crate::domain::event::{OrderEvent, OrderEventKind};
use crate::domain::model::{
    Money, OrderId, OrderItem, OrderItemRequest, OrderStatus, ProductId, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// 永続化前の注文
/// 全明細の価格が解決済みで、ステータスは常にPENDINGとして保存される
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    user_id: UserId,
    items: Vec<OrderItem>,
    total_price: Money,
}

impl NewOrder {
    /// 解決済み価格表から注文を組み立てる
    ///
    /// 1つでも価格が見つからない商品があれば `PriceNotFound` で失敗し、
    /// 部分的な注文は作らない
    pub fn price(
        user_id: UserId,
        requests: Vec<OrderItemRequest>,
        prices: &HashMap<ProductId, Money>,
    ) -> Result<Self, DomainError> {
        if requests.is_empty() {
            return Err(DomainError::EmptyOrder);
        }

        let missing: BTreeSet<ProductId> = requests
            .iter()
            .filter(|request| !prices.contains_key(request.product_id()))
            .map(|request| request.product_id().clone())
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::PriceNotFound(missing.into_iter().collect()));
        }

        let items: Vec<OrderItem> = requests
            .into_iter()
            .map(|request| {
                let unit_price = prices[request.product_id()];
                request.priced(unit_price)
            })
            .collect();

        let total_price = items
            .iter()
            .map(OrderItem::subtotal)
            .fold(Money::zero(), |acc, subtotal| acc.add(&subtotal));

        Ok(Self {
            user_id,
            items,
            total_price,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Pending
    }

    /// リポジトリが採番したIDと時刻で永続化済みの注文にする
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            items: self.items,
            total_price: self.total_price,
            status: OrderStatus::Pending,
            status_reason: None,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Order集約
/// 合計金額は作成時に確定し、以後はステータスのみ変化する
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    total_price: Money,
    status: OrderStatus,
    status_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 状態機械が決めた次の一手
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 指定のステータスへ遷移する
    MoveTo(OrderStatus),
    /// 既に遷移済み
    AlreadyApplied,
    /// 終端状態に先を越された
    Superseded,
}

/// 現在のステータスとイベントの種類から遷移を決める
///
/// 重複配信と順序逆転はエラーにせず no-op として扱う。
/// 前提条件を満たさない遷移（在庫予約前の支払い成功など）だけを拒否する。
pub fn plan_transition(
    current: OrderStatus,
    event: OrderEventKind,
) -> Result<Transition, DomainError> {
    use OrderEventKind as E;
    use OrderStatus as S;

    let transition = match (event, current) {
        (E::StockReserved, S::Pending) => Transition::MoveTo(S::StockReserved),
        (E::StockReserved, S::StockReserved | S::Paid) => Transition::AlreadyApplied,
        (E::StockReserved, S::Cancelled) => Transition::Superseded,

        (E::StockUnavailable, S::Pending) => Transition::MoveTo(S::Cancelled),
        (E::StockUnavailable, S::Cancelled) => Transition::AlreadyApplied,
        (E::StockUnavailable, S::Paid) => Transition::Superseded,

        (E::PaymentSucceeded, S::StockReserved) => Transition::MoveTo(S::Paid),
        (E::PaymentSucceeded, S::Paid) => Transition::AlreadyApplied,
        (E::PaymentSucceeded, S::Cancelled) => Transition::Superseded,

        (E::PaymentFailed, S::Pending | S::StockReserved) => Transition::MoveTo(S::Cancelled),
        (E::PaymentFailed, S::Cancelled) => Transition::AlreadyApplied,
        (E::PaymentFailed, S::Paid) => Transition::Superseded,

        // 在庫予約済みの注文に在庫不足、在庫予約前の支払い成功
        (E::StockUnavailable, S::StockReserved) | (E::PaymentSucceeded, S::Pending) => {
            return Err(DomainError::InvalidTransition {
                from: current,
                event,
            })
        }
    };

    Ok(transition)
}

impl Order {
    /// データベースから取得したデータで注文を再構築
    /// リポジトリでの使用を想定
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: OrderId,
        user_id: UserId,
        items: Vec<OrderItem>,
        total_price: Money,
        status: OrderStatus,
        status_reason: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        Ok(Self {
            id,
            user_id,
            items,
            total_price,
            status,
            status_reason,
            created_at,
            updated_at,
        })
    }

    /// 注文IDを取得
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// 注文明細のリストを取得
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// 作成時に確定した合計金額
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    /// 注文ステータスを取得
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// キャンセル理由など、直近の遷移の補足
    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// このイベントに対する遷移を決める
    pub fn plan(&self, event: &OrderEvent) -> Result<Transition, DomainError> {
        plan_transition(self.status, event.kind())
    }

    /// ステータスを書き換える（リポジトリ実装専用）
    pub(crate) fn record_status(
        &mut self,
        status: OrderStatus,
        reason: Option<String>,
        updated_at: DateTime<Utc>,
    ) {
        self.status = status;
        if reason.is_some() {
            self.status_reason = reason;
        }
        self.updated_at = updated_at;
    }
}

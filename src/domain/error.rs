use crate::domain::model::{OrderStatus, ProductId};
use crate::domain::event::OrderEventKind;

/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 無効な数量（0以下）
    #[error("Invalid quantity: quantity must be greater than zero")]
    InvalidQuantity,
    /// 無効な金額
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// 同一商品の合計数量がu32に収まらない
    #[error("Total quantity for product {0} is too large")]
    QuantityOverflow(ProductId),
    /// 注文明細が空
    #[error("Order must contain at least one item")]
    EmptyOrder,
    /// 価格を解決できない商品がある
    #[error("Price not found for products: {}", join_ids(.0))]
    PriceNotFound(Vec<ProductId>),
    /// 現在の状態では適用できないイベント
    #[error("Cannot apply {event} to an order in state {from}")]
    InvalidTransition {
        from: OrderStatus,
        event: OrderEventKind,
    },
    /// 在庫不足
    #[error("Insufficient stock")]
    InsufficientStock,
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

use crate::application::service::OrderTransition;
use crate::domain::event::TransitionOutcome;
use crate::domain::model::{Money, Order, OrderItem, OrderStatus, Product};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 注文明細用のレスポンスDTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// 注文用のレスポンスDTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub user_id: String,
    pub items: Vec<OrderItemResponse>,
    pub total_price: Money,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// イベント適用結果のレスポンスDTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransitionResponse {
    pub order: OrderResponse,
    pub outcome: TransitionOutcome,
}

/// 商品用のレスポンスDTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 価格照会用のレスポンスDTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceResponse {
    pub product_id: String,
    pub price: Money,
}

impl OrderItemResponse {
    fn from_item(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id().to_string(),
            quantity: item.quantity(),
            unit_price: item.unit_price(),
            subtotal: item.subtotal(),
        }
    }
}

impl OrderResponse {
    /// ドメインオブジェクトからOrderResponseを作成
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            items: order.items().iter().map(OrderItemResponse::from_item).collect(),
            total_price: order.total_price(),
            status: order.status(),
            status_reason: order.status_reason().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

impl From<OrderTransition> for OrderTransitionResponse {
    fn from(transition: OrderTransition) -> Self {
        Self {
            order: OrderResponse::from_order(&transition.order),
            outcome: transition.outcome,
        }
    }
}

impl ProductResponse {
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id().to_string(),
            name: product.name().to_string(),
            price: product.price(),
            stock_quantity: product.stock_quantity(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
        }
    }
}

impl ProductPriceResponse {
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id().to_string(),
            price: product.price(),
        }
    }
}

use crate::application::service::OrderLineInput;
use crate::domain::model::{Money, ProductId, StockShortage};
use serde::{Deserialize, Serialize};

/// 注文明細のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequestDto {
    pub product_id: String,
    pub quantity: u32,
}

/// 注文作成用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequestDto>,
}

impl CreateOrderRequest {
    /// 未検証の注文明細に変換（検証はサービス側で行う）
    pub fn into_lines(self) -> (String, Vec<OrderLineInput>) {
        let lines = self
            .items
            .into_iter()
            .map(|item| OrderLineInput {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        (self.user_id, lines)
    }
}

/// 在庫不足明細のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItemDto {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub available: Option<u32>,
}

/// 在庫不足イベント用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUnavailableRequest {
    #[serde(default)]
    pub items: Vec<UnavailableItemDto>,
}

impl StockUnavailableRequest {
    pub fn into_shortages(self) -> Result<Vec<StockShortage>, String> {
        self.items
            .into_iter()
            .map(|item| {
                let product_id =
                    ProductId::from_string(&item.product_id).map_err(|e| e.to_string())?;
                Ok(StockShortage {
                    product_id,
                    requested: item.quantity,
                    available: item.available,
                })
            })
            .collect()
    }
}

/// 支払い失敗イベント用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailedRequest {
    pub reason: String,
}

/// 商品登録用のリクエストDTO
/// 価格は10進数（文字列または数値）で受け付ける
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Money,
    pub stock_quantity: u32,
}

/// 在庫数変更用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    pub change: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_uses_camel_case() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{"userId":"user-1","items":[{"productId":"P1","quantity":2}]}"#,
        )
        .unwrap();

        let (user_id, lines) = request.into_lines();
        assert_eq!(user_id, "user-1");
        assert_eq!(lines[0].product_id, "P1");
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let result = serde_json::from_str::<CreateOrderRequest>(
            r#"{"userId":"user-1","items":[{"productId":"P1","quantity":-1}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_product_request_rejects_negative_price() {
        let ok: CreateProductRequest =
            serde_json::from_str(r#"{"name":"Pen","price":"1.50","stockQuantity":3}"#).unwrap();
        assert_eq!(ok.price, "1.50".parse::<Money>().unwrap());

        let negative = serde_json::from_str::<CreateProductRequest>(
            r#"{"name":"Pen","price":"-1.50","stockQuantity":3}"#,
        );
        assert!(negative.is_err());
    }

    #[test]
    fn test_stock_unavailable_request_to_shortages() {
        let request: StockUnavailableRequest =
            serde_json::from_str(r#"{"items":[{"productId":"P1","quantity":2}]}"#).unwrap();
        let shortages = request.into_shortages().unwrap();
        assert_eq!(shortages[0].requested, 2);
        assert_eq!(shortages[0].available, None);
    }
}

//! 在庫サービスのgRPCメッセージ定義
//!
//! `.proto` ファイルは持たず、prostのderiveで標準のprotobufワイヤ形式を定義する。
//! サービスのクライアント・サーバーは `build.rs` で生成したコードを取り込む。
//! 価格は丸め誤差を避けるため10進数の文字列で送る。

use crate::domain::model::{OrderId, ProductId, StockItem, StockShortage};

#[derive(Clone, prost::Message)]
pub struct GetProductInfoRequest {
    #[prost(string, repeated, tag = "1")]
    pub product_ids: Vec<String>,
}

#[derive(Clone, prost::Message)]
pub struct ProductInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    /// 10進数の文字列（例: "49.90"）
    #[prost(string, tag = "3")]
    pub price: String,
}

#[derive(Clone, prost::Message)]
pub struct GetProductInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub products: Vec<ProductInfo>,
}

#[derive(Clone, prost::Message)]
pub struct StockLine {
    #[prost(string, tag = "1")]
    pub product_id: String,
    #[prost(uint32, tag = "2")]
    pub quantity: u32,
}

#[derive(Clone, prost::Message)]
pub struct StockShortageLine {
    #[prost(string, tag = "1")]
    pub product_id: String,
    #[prost(uint32, tag = "2")]
    pub requested: u32,
    #[prost(uint32, optional, tag = "3")]
    pub available: Option<u32>,
}

#[derive(Clone, prost::Message)]
pub struct ReserveStockRequest {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<StockLine>,
}

#[derive(Clone, prost::Message)]
pub struct ReserveStockResponse {
    #[prost(bool, tag = "1")]
    pub reserved: bool,
    #[prost(message, repeated, tag = "2")]
    pub unavailable: Vec<StockShortageLine>,
}

#[derive(Clone, prost::Message)]
pub struct ReleaseStockRequest {
    #[prost(string, tag = "1")]
    pub order_id: String,
}

#[derive(Clone, prost::Message)]
pub struct ReleaseStockResponse {
    #[prost(bool, tag = "1")]
    pub released: bool,
}

include!(concat!(
    env!("OUT_DIR"),
    "/ecommerce.inventory.InventoryService.rs"
));

pub use inventory_service_client::InventoryServiceClient;
pub use inventory_service_server::{InventoryService, InventoryServiceServer};

/// 相関IDを運ぶメタデータキー
pub const REQUEST_ID_METADATA: &str = "x-request-id";

impl From<&StockItem> for StockLine {
    fn from(item: &StockItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
        }
    }
}

impl From<&StockShortage> for StockShortageLine {
    fn from(shortage: &StockShortage) -> Self {
        Self {
            product_id: shortage.product_id.to_string(),
            requested: shortage.requested,
            available: shortage.available,
        }
    }
}

impl StockLine {
    pub fn to_domain(&self) -> Result<StockItem, String> {
        let product_id = ProductId::from_string(&self.product_id).map_err(|e| e.to_string())?;
        Ok(StockItem {
            product_id,
            quantity: self.quantity,
        })
    }
}

impl StockShortageLine {
    pub fn to_domain(&self) -> Result<StockShortage, String> {
        let product_id = ProductId::from_string(&self.product_id).map_err(|e| e.to_string())?;
        Ok(StockShortage {
            product_id,
            requested: self.requested,
            available: self.available,
        })
    }
}

impl ReserveStockRequest {
    pub fn new(order_id: &OrderId, items: &[StockItem]) -> Self {
        Self {
            order_id: order_id.to_string(),
            items: items.iter().map(StockLine::from).collect(),
        }
    }
}

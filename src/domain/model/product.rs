use crate::domain::error::DomainError;
use crate::domain::model::{Money, ProductId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// 商品価格の小数桁数（DECIMAL(12, 2)）
const PRICE_SCALE: u32 = 2;

/// 商品価格の上限
fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, PRICE_SCALE)
}

/// 登録前の商品
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    name: String,
    price: Money,
    stock_quantity: u32,
}

impl NewProduct {
    /// 新しい商品を作成
    ///
    /// # Arguments
    /// * `name` - 商品名（空不可）
    /// * `price` - 価格（小数2桁まで、9,999,999,999.99以下）
    /// * `stock_quantity` - 初期在庫数
    pub fn new(name: String, price: Money, stock_quantity: u32) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidValue(
                "product name must not be empty".to_string(),
            ));
        }
        if price.amount().normalize().scale() > PRICE_SCALE {
            return Err(DomainError::InvalidPrice(format!(
                "{} has more than {} decimal places",
                price, PRICE_SCALE
            )));
        }
        if price.amount() > max_price() {
            return Err(DomainError::InvalidPrice(format!(
                "{} exceeds {}",
                price,
                max_price()
            )));
        }
        Ok(Self {
            name,
            price,
            stock_quantity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    /// リポジトリが採番したIDと時刻で商品にする
    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            stock_quantity: self.stock_quantity,
            created_at,
            updated_at: created_at,
        }
    }
}

/// 商品集約
/// 価格と在庫数を管理する
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    stock_quantity: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// データベースから取得したデータで商品を再構築
    pub fn reconstruct(
        id: ProductId,
        name: String,
        price: Money,
        stock_quantity: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            price,
            stock_quantity,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &ProductId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    /// 在庫数を取得
    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 在庫を予約する
    ///
    /// # Returns
    /// * `Ok(())` - 予約成功
    /// * `Err(DomainError::InsufficientStock)` - 在庫不足（在庫数は変わらない）
    pub fn reserve(&mut self, quantity: u32, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.has_available_stock(quantity) {
            return Err(DomainError::InsufficientStock);
        }
        self.stock_quantity -= quantity;
        self.updated_at = at;
        Ok(())
    }

    /// 在庫を解放する（予約の取り消し）
    pub fn release(&mut self, quantity: u32, at: DateTime<Utc>) {
        self.stock_quantity = self.stock_quantity.saturating_add(quantity);
        self.updated_at = at;
    }

    /// 在庫数を増減する
    /// 結果が負になる変更は拒否する
    pub fn adjust_stock(&mut self, change: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        let adjusted = i64::from(self.stock_quantity) + change;
        if adjusted < 0 {
            return Err(DomainError::InsufficientStock);
        }
        self.stock_quantity = u32::try_from(adjusted).map_err(|_| {
            DomainError::InvalidValue(format!("stock quantity out of range: {}", adjusted))
        })?;
        self.updated_at = at;
        Ok(())
    }

    /// 指定された数量の在庫が利用可能かチェック
    pub fn has_available_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}

// ドメインサービス
// 集約をまたぐ価格解決・在庫予約の補助ロジック

use crate::domain::error::DomainError;
use crate::domain::model::{OrderItemRequest, ProductId, StockItem};
use std::collections::BTreeMap;

/// 価格解決に渡す商品IDの集合
/// 重複を除き、最初に現れた順序を保つ
pub fn distinct_product_ids(items: &[OrderItemRequest]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = Vec::with_capacity(items.len());
    for item in items {
        if !ids.contains(item.product_id()) {
            ids.push(item.product_id().clone());
        }
    }
    ids
}

/// 同じ商品の明細を1行にまとめる
/// 在庫予約は商品単位で行うため
///
/// # Returns
/// * `Err(DomainError::QuantityOverflow)` - 合計数量がu32を超える商品がある
pub fn merge_stock_items(items: &[StockItem]) -> Result<Vec<StockItem>, DomainError> {
    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in items {
        let quantity = merged.entry(item.product_id.clone()).or_insert(0);
        *quantity = quantity
            .checked_add(item.quantity)
            .ok_or_else(|| DomainError::QuantityOverflow(item.product_id.clone()))?;
    }
    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| StockItem {
            product_id,
            quantity,
        })
        .collect())
}

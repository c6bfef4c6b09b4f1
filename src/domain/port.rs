// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::context::RequestContext;
use crate::domain::model::{
    Money, NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductId, StockItem,
    StockShortage,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得・復元に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 対象の行が存在しない（更新件数0）
    #[error("Not found: {0}")]
    NotFound(String),
    /// 制約違反（在庫が負になる更新など）
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// 在庫サービス呼び出しのエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// 在庫サービスに到達できない
    #[error("Inventory service unavailable: {0}")]
    Unavailable(String),
    /// リクエスト期限切れ
    #[error("Inventory call exceeded its deadline")]
    DeadlineExceeded,
    /// 在庫サービスがリクエストを拒否した
    #[error("Inventory service rejected the call: {0}")]
    Rejected(String),
    /// 応答を解釈できない
    #[error("Invalid response from inventory service: {0}")]
    InvalidResponse(String),
}

/// ステータス更新要求（compare-and-swap）
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// 更新前に期待するステータス
    pub expected: OrderStatus,
    /// 新しいステータス
    pub new: OrderStatus,
    /// キャンセル理由など（`None` の場合は既存の値を保持）
    pub reason: Option<String>,
}

/// 在庫予約の結果
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    /// 全明細を予約できた（または既に予約済み）
    Reserved,
    /// 在庫不足の明細があり、何も予約しなかった
    Insufficient(Vec<StockShortage>),
}

/// 注文リポジトリトレイト
/// 注文集約の永続化を抽象化する
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 新しい注文を保存する
    /// 注文IDと作成・更新日時はリポジトリが採番する
    ///
    /// # Returns
    /// * `Ok(Order)` - 永続化された注文
    /// * `Err(RepositoryError)` - 制約違反または接続失敗
    async fn create(&self, ctx: &RequestContext, order: NewOrder) -> Result<Order, RepositoryError>;

    /// 注文IDで注文を検索する
    ///
    /// # Returns
    /// * `Ok(Some(Order))` - 注文が見つかった
    /// * `Ok(None)` - 注文が見つからなかった
    /// * `Err(RepositoryError)` - 検索失敗
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// ステータスを更新する
    /// 現在のステータスが `change.expected` と一致する場合のみ書き換える
    ///
    /// # Returns
    /// * `Ok(true)` - 更新した
    /// * `Ok(false)` - 現在のステータスが期待と異なるため更新しなかった
    /// * `Err(RepositoryError::NotFound)` - 注文が存在しない
    async fn update_status(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        change: &StatusChange,
    ) -> Result<bool, RepositoryError>;
}

/// 商品リポジトリトレイト
/// 在庫サービス側の商品と在庫予約の永続化を抽象化する
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 新しい商品を保存する（IDと日時はリポジトリが採番）
    async fn create(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, RepositoryError>;

    /// 商品IDで商品を検索する
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    /// 複数の商品IDで検索する
    /// 存在しないIDは結果に含まれない（エラーにはならない）
    async fn find_many_by_ids(
        &self,
        ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError>;

    /// 在庫数を増減する
    ///
    /// # Returns
    /// * `Ok(Product)` - 更新後の商品
    /// * `Err(RepositoryError::NotFound)` - 商品が存在しない
    /// * `Err(RepositoryError::ConstraintViolation)` - 在庫数が負になる
    async fn update_stock_quantity(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
        change: i64,
    ) -> Result<Product, RepositoryError>;

    /// 注文の在庫をまとめて予約する
    /// 全明細を予約するか、何も予約しないかのどちらか
    async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, RepositoryError>;

    /// 注文の予約を取り消して在庫を戻す
    ///
    /// # Returns
    /// * `Ok(true)` - 予約を解放した
    /// * `Ok(false)` - 予約が存在しなかった
    async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, RepositoryError>;
}

/// 在庫照会ポート
/// 注文サービスから見た在庫サービス
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// 商品IDの集合に対する現在価格を取得する
    /// 存在しない商品はマップに含まれない（呼び出し側で欠落を検出する）
    async fn resolve_prices(
        &self,
        ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Money>, GatewayError>;

    /// 注文の在庫を予約する（全明細か、何もしないか）
    async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, GatewayError>;

    /// 注文の在庫予約を解放する（補償処理）
    async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, GatewayError>;
}

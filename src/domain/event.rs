use crate::domain::model::{OrderStatus, StockShortage};
use serde::Serialize;
use std::fmt;

/// 注文ワークフローに届く非同期イベント
/// 在庫予約の結果と支払いの結果
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    /// 在庫が予約された
    StockReserved,
    /// 在庫が不足していた
    StockUnavailable { unavailable: Vec<StockShortage> },
    /// 支払いが成功した
    PaymentSucceeded,
    /// 支払いが失敗した
    PaymentFailed { reason: String },
}

impl OrderEvent {
    pub fn kind(&self) -> OrderEventKind {
        match self {
            OrderEvent::StockReserved => OrderEventKind::StockReserved,
            OrderEvent::StockUnavailable { .. } => OrderEventKind::StockUnavailable,
            OrderEvent::PaymentSucceeded => OrderEventKind::PaymentSucceeded,
            OrderEvent::PaymentFailed { .. } => OrderEventKind::PaymentFailed,
        }
    }

    /// キャンセル理由（キャンセルに至るイベントのみ）
    pub fn cancellation_reason(&self) -> Option<String> {
        match self {
            OrderEvent::StockUnavailable { unavailable } => {
                let items = unavailable
                    .iter()
                    .map(|shortage| shortage.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!("stock unavailable: {}", items))
            }
            OrderEvent::PaymentFailed { reason } => Some(format!("payment failed: {}", reason)),
            OrderEvent::StockReserved | OrderEvent::PaymentSucceeded => None,
        }
    }
}

/// イベントの種類（ログとエラー報告用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    StockReserved,
    StockUnavailable,
    PaymentSucceeded,
    PaymentFailed,
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderEventKind::StockReserved => "StockReserved",
            OrderEventKind::StockUnavailable => "StockUnavailable",
            OrderEventKind::PaymentSucceeded => "PaymentSucceeded",
            OrderEventKind::PaymentFailed => "PaymentFailed",
        };
        f.write_str(s)
    }
}

/// イベント適用の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionOutcome {
    /// ステータスが遷移した
    Applied { from: OrderStatus, to: OrderStatus },
    /// 既に遷移済み（重複配信）
    AlreadyApplied { status: OrderStatus },
    /// 終端状態に先を越された（順序逆転）
    Superseded { status: OrderStatus },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

use crate::domain::error::DomainError;
use crate::domain::event::OrderEventKind;
use crate::domain::model::{OrderId, OrderStatus, ProductId};
use crate::domain::port::{GatewayError, RepositoryError};

/// アプリケーション層のエラー型
/// 種類だけを境界アダプターに伝え、HTTPステータスなどへの変換はアダプターが行う
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// 入力値の誤り（クライアントで修正可能）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 価格を解決できない商品がある（部分的な注文は作らない）
    #[error("Price not found for products: {}", join_ids(.0))]
    PriceNotFound(Vec<ProductId>),
    /// 在庫サービス呼び出しの失敗
    #[error("{operation}: {source}")]
    Upstream {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },
    /// 永続化の失敗
    #[error("{operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },
    /// 現在の状態では適用できないイベント
    #[error("Order {order_id} in state {current} cannot accept {event}")]
    InvalidTransition {
        order_id: OrderId,
        current: OrderStatus,
        event: OrderEventKind,
    },
}

impl ApplicationError {
    /// リポジトリエラーを操作名付きで変換する
    /// `RepositoryError::NotFound` は `NotFound` として区別する
    pub fn storage(operation: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |source| match source {
            RepositoryError::NotFound(msg) => ApplicationError::NotFound(msg),
            RepositoryError::ConstraintViolation(msg) => ApplicationError::InvalidInput(msg),
            source => ApplicationError::Storage { operation, source },
        }
    }

    /// ゲートウェイエラーを操作名付きで変換する
    pub fn upstream(operation: &'static str) -> impl FnOnce(GatewayError) -> Self {
        move |source| ApplicationError::Upstream { operation, source }
    }

    /// 状態機械が拒否した遷移を注文IDと結びつける
    pub fn from_domain_for_order(order_id: &OrderId, err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, event } => ApplicationError::InvalidTransition {
                order_id: order_id.clone(),
                current: from,
                event,
            },
            other => ApplicationError::from(other),
        }
    }
}

// From実装でエラー変換を簡潔に
impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::PriceNotFound(ids) => ApplicationError::PriceNotFound(ids),
            DomainError::InsufficientStock => {
                ApplicationError::InvalidInput("insufficient stock".to_string())
            }
            other => ApplicationError::InvalidInput(other.to_string()),
        }
    }
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_is_distinguished() {
        let err = ApplicationError::storage("get order")(RepositoryError::NotFound(
            "order 42".to_string(),
        ));
        assert!(matches!(err, ApplicationError::NotFound(msg) if msg == "order 42"));
    }

    #[test]
    fn test_storage_error_keeps_operation_context() {
        let err = ApplicationError::storage("create order")(RepositoryError::ConnectionFailed(
            "pool closed".to_string(),
        ));
        assert_eq!(err.to_string(), "create order: Connection failed: pool closed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_domain_validation_becomes_invalid_input() {
        let err = ApplicationError::from(DomainError::InvalidQuantity);
        assert!(matches!(err, ApplicationError::InvalidInput(_)));
    }

    #[test]
    fn test_invalid_transition_carries_order_id() {
        let order_id = OrderId::from_string("o-1").unwrap();
        let err = ApplicationError::from_domain_for_order(
            &order_id,
            DomainError::InvalidTransition {
                from: OrderStatus::Pending,
                event: OrderEventKind::PaymentSucceeded,
            },
        );
        match err {
            ApplicationError::InvalidTransition {
                order_id: id,
                current,
                event,
            } => {
                assert_eq!(id, order_id);
                assert_eq!(current, OrderStatus::Pending);
                assert_eq!(event, OrderEventKind::PaymentSucceeded);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

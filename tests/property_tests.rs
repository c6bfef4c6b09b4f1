use ecommerce_order_platform::domain::error::DomainError;
use ecommerce_order_platform::domain::event::OrderEventKind;
use ecommerce_order_platform::domain::model::{
    plan_transition, Money, NewOrder, OrderItemRequest, OrderStatus, ProductId, StockItem,
    Transition, UserId,
};
use ecommerce_order_platform::domain::service::merge_stock_items;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

fn product(index: usize) -> ProductId {
    ProductId::from_string(&format!("P{}", index)).unwrap()
}

fn money_from_cents(cents: i64) -> Money {
    Money::new(Decimal::new(cents, 2)).unwrap()
}

fn event_kind() -> impl Strategy<Value = OrderEventKind> {
    prop_oneof![
        Just(OrderEventKind::StockReserved),
        Just(OrderEventKind::StockUnavailable),
        Just(OrderEventKind::PaymentSucceeded),
        Just(OrderEventKind::PaymentFailed),
    ]
}

fn status() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Pending),
        Just(OrderStatus::StockReserved),
        Just(OrderStatus::Paid),
        Just(OrderStatus::Cancelled),
    ]
}

// 注文金額のプロパティベーステスト
proptest! {
    /// 合計金額は常に 単価 × 数量 の総和と等しい
    #[test]
    fn test_total_price_is_sum_of_line_subtotals(
        lines in prop::collection::vec((0usize..5, 1u32..50), 1..8),
        cents in prop::collection::vec(1i64..1_000_000, 5),
    ) {
        let prices: HashMap<ProductId, Money> = cents
            .iter()
            .enumerate()
            .map(|(i, c)| (product(i), money_from_cents(*c)))
            .collect();
        let requests = lines
            .iter()
            .map(|(i, qty)| OrderItemRequest::new(product(*i), *qty).unwrap())
            .collect();

        let order = NewOrder::price(UserId::from_string("user-1").unwrap(), requests, &prices).unwrap();

        let expected: Decimal = lines
            .iter()
            .map(|(i, qty)| Decimal::new(cents[*i], 2) * Decimal::from(*qty))
            .sum();
        prop_assert_eq!(order.total_price().amount(), expected);
        prop_assert_eq!(order.items().len(), lines.len());
        prop_assert_eq!(order.status(), OrderStatus::Pending);
    }

    /// 価格を解決できない商品が1つでもあれば注文は作られず、
    /// 解決できなかった商品がすべて報告される
    #[test]
    fn test_unresolved_products_reject_whole_order(
        lines in prop::collection::vec((0usize..6, 1u32..10), 1..8),
        priced in prop::collection::btree_set(0usize..6, 0..6),
    ) {
        let prices: HashMap<ProductId, Money> = priced
            .iter()
            .map(|i| (product(*i), money_from_cents(100)))
            .collect();
        let requests = lines
            .iter()
            .map(|(i, qty)| OrderItemRequest::new(product(*i), *qty).unwrap())
            .collect();
        let missing: BTreeSet<ProductId> = lines
            .iter()
            .filter(|(i, _)| !priced.contains(i))
            .map(|(i, _)| product(*i))
            .collect();

        let result = NewOrder::price(UserId::from_string("user-1").unwrap(), requests, &prices);

        if missing.is_empty() {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result.unwrap_err(),
                DomainError::PriceNotFound(missing.into_iter().collect())
            );
        }
    }

    /// 同じ商品の明細をまとめても商品ごとの数量は変わらない
    #[test]
    fn test_merge_stock_items_preserves_quantities(
        lines in prop::collection::vec((0usize..4, 1u32..100), 0..12),
    ) {
        let items: Vec<StockItem> = lines
            .iter()
            .map(|(i, qty)| StockItem { product_id: product(*i), quantity: *qty })
            .collect();

        let merged = merge_stock_items(&items).unwrap();

        let distinct: BTreeSet<usize> = lines.iter().map(|(i, _)| *i).collect();
        prop_assert_eq!(merged.len(), distinct.len());
        for item in &merged {
            let expected: u32 = items
                .iter()
                .filter(|line| line.product_id == item.product_id)
                .map(|line| line.quantity)
                .sum();
            prop_assert_eq!(item.quantity, expected);
        }
    }
}

// 注文ステータスの状態機械のプロパティベーステスト
proptest! {
    /// どのような順序でイベントが届いてもステータスは後戻りせず、
    /// 終端状態に達した後は変わらない
    #[test]
    fn test_status_is_monotonic_under_any_event_order(
        events in prop::collection::vec(event_kind(), 0..20),
    ) {
        let mut current = OrderStatus::Pending;
        for event in events {
            match plan_transition(current, event) {
                Ok(Transition::MoveTo(next)) => {
                    prop_assert!(!current.is_terminal());
                    prop_assert!(next.rank() > current.rank());
                    current = next;
                }
                Ok(Transition::AlreadyApplied) | Ok(Transition::Superseded) => {}
                Err(DomainError::InvalidTransition { from, .. }) => {
                    prop_assert_eq!(from, current);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }

    /// 適用済みのイベントを再配信しても再び遷移しない
    #[test]
    fn test_redelivered_event_is_noop(
        start in status(),
        event in event_kind(),
    ) {
        if let Ok(Transition::MoveTo(next)) = plan_transition(start, event) {
            let replay = plan_transition(next, event).unwrap();
            prop_assert!(matches!(replay, Transition::AlreadyApplied | Transition::Superseded));
        }
    }
}

use ecommerce_order_platform::adapter::driven::{
    GrpcInventoryGateway, InMemoryOrderRepository, InMemoryProductRepository,
};
use ecommerce_order_platform::adapter::driver::InventoryGrpcHandler;
use ecommerce_order_platform::application::service::{
    InventoryApplicationService, OrderLineInput, OrderWorkflowService,
};
use ecommerce_order_platform::domain::context::RequestContext;
use ecommerce_order_platform::domain::model::{Money, OrderId, OrderStatus, ProductId, StockItem};
use ecommerce_order_platform::domain::port::{GatewayError, InventoryGateway, ReservationOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

fn product(id: &str) -> ProductId {
    ProductId::from_string(id).unwrap()
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

fn ctx() -> RequestContext {
    RequestContext::new("grpc-test").with_timeout(Duration::from_secs(5))
}

/// エフェメラルポートで在庫gRPCサーバーを起動し、接続済みのゲートウェイを返す
async fn start_inventory() -> (Arc<InMemoryProductRepository>, GrpcInventoryGateway) {
    let products = Arc::new(InMemoryProductRepository::new());
    products.seed("P1", "Keyboard", money("49.90"), 3).unwrap();
    products.seed("P2", "Mouse", money("19.99"), 10).unwrap();
    let inventory = Arc::new(InventoryApplicationService::new(products.clone()));
    let handler = InventoryGrpcHandler::new(inventory, Duration::from_secs(5));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(handler.into_server())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let gateway = GrpcInventoryGateway::connect_lazy(&format!("http://{}", addr)).unwrap();
    (products, gateway)
}

#[tokio::test]
async fn test_resolve_prices_over_grpc() {
    let (_, gateway) = start_inventory().await;

    let prices = gateway
        .resolve_prices(&ctx(), &[product("P1"), product("P2"), product("P404")])
        .await
        .unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[&product("P1")], money("49.90"));
    assert_eq!(prices[&product("P2")], money("19.99"));
}

#[tokio::test]
async fn test_reserve_and_release_over_grpc() {
    let (products, gateway) = start_inventory().await;
    let order_id = OrderId::from_string("order-1").unwrap();
    let items = vec![
        StockItem {
            product_id: product("P1"),
            quantity: 2,
        },
        StockItem {
            product_id: product("P2"),
            quantity: 5,
        },
    ];

    let outcome = gateway.reserve_stock(&ctx(), &order_id, &items).await.unwrap();
    assert_eq!(outcome, ReservationOutcome::Reserved);
    assert_eq!(products.stock_of(&product("P1")), Some(1));

    // 同じ注文の再送では二重に減らない
    let again = gateway.reserve_stock(&ctx(), &order_id, &items).await.unwrap();
    assert_eq!(again, ReservationOutcome::Reserved);
    assert_eq!(products.stock_of(&product("P1")), Some(1));

    assert!(gateway.release_stock(&ctx(), &order_id).await.unwrap());
    assert!(!gateway.release_stock(&ctx(), &order_id).await.unwrap());
    assert_eq!(products.stock_of(&product("P1")), Some(3));
    assert_eq!(products.stock_of(&product("P2")), Some(10));
}

#[tokio::test]
async fn test_shortage_is_reported_with_available_quantity() {
    let (products, gateway) = start_inventory().await;
    let order_id = OrderId::from_string("order-2").unwrap();

    let outcome = gateway
        .reserve_stock(
            &ctx(),
            &order_id,
            &[
                StockItem {
                    product_id: product("P1"),
                    quantity: 4,
                },
                StockItem {
                    product_id: product("P404"),
                    quantity: 1,
                },
            ],
        )
        .await
        .unwrap();

    match outcome {
        ReservationOutcome::Insufficient(shortages) => {
            assert_eq!(shortages.len(), 2);
            let keyboard = shortages
                .iter()
                .find(|s| s.product_id == product("P1"))
                .unwrap();
            assert_eq!(keyboard.requested, 4);
            assert_eq!(keyboard.available, Some(3));
            let unknown = shortages
                .iter()
                .find(|s| s.product_id == product("P404"))
                .unwrap();
            assert_eq!(unknown.available, None);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(products.stock_of(&product("P1")), Some(3));
}

#[tokio::test]
async fn test_invalid_reservation_is_rejected() {
    let (_, gateway) = start_inventory().await;

    let err = gateway
        .reserve_stock(&ctx(), &OrderId::from_string("order-3").unwrap(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected(_)), "{:?}", err);
}

#[tokio::test]
async fn test_expired_context_is_not_sent() {
    let (_, gateway) = start_inventory().await;
    let expired = RequestContext::new("late").with_timeout(Duration::ZERO);

    let err = gateway
        .resolve_prices(&expired, &[product("P1")])
        .await
        .unwrap_err();

    assert_eq!(err, GatewayError::DeadlineExceeded);
}

#[tokio::test]
async fn test_order_workflow_over_grpc() {
    let (products, gateway) = start_inventory().await;
    let workflow = OrderWorkflowService::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(gateway),
    );

    let order = workflow
        .create_order(
            &ctx(),
            "user-1",
            vec![
                OrderLineInput {
                    product_id: "P1".to_string(),
                    quantity: 1,
                },
                OrderLineInput {
                    product_id: "P2".to_string(),
                    quantity: 2,
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(order.total_price(), money("89.88"));

    let reserved = workflow
        .reserve_stock_for_order(&ctx(), order.id())
        .await
        .unwrap();
    assert_eq!(reserved.order.status(), OrderStatus::StockReserved);
    assert_eq!(products.stock_of(&product("P2")), Some(8));

    let cancelled = workflow
        .handle_payment_failed(&ctx(), order.id(), "insufficient funds")
        .await
        .unwrap();
    assert_eq!(cancelled.order.status(), OrderStatus::Cancelled);
    assert_eq!(products.stock_of(&product("P1")), Some(3));
    assert_eq!(products.stock_of(&product("P2")), Some(10));
}

use axum::http::StatusCode;
use axum_test::TestServer;
use ecommerce_order_platform::adapter::driven::{
    GrpcInventoryGateway, InMemoryOrderRepository, InMemoryProductRepository,
    InProcessInventoryGateway,
};
use ecommerce_order_platform::adapter::driver::{
    create_inventory_router, create_order_router, with_http_layers, InventoryApiState,
    OrderApiState,
};
use ecommerce_order_platform::application::service::{
    InventoryApplicationService, OrderWorkflowService,
};
use ecommerce_order_platform::domain::model::ProductId;
use ecommerce_order_platform::domain::port::InventoryGateway;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Servers {
    products: Arc<InMemoryProductRepository>,
    orders: TestServer,
    inventory: TestServer,
}

fn servers() -> Servers {
    let products = Arc::new(InMemoryProductRepository::new());
    products
        .seed("P1", "Keyboard", "10.00".parse().unwrap(), 5)
        .unwrap();
    products
        .seed("P2", "Mouse", "5.00".parse().unwrap(), 2)
        .unwrap();
    let inventory = Arc::new(InventoryApplicationService::new(products.clone()));

    let orders = order_server(Arc::new(InProcessInventoryGateway::new(inventory.clone())));
    let inventory = TestServer::new(
        create_inventory_router().with_state(InventoryApiState {
            inventory,
            request_timeout: TIMEOUT,
        }),
    )
    .unwrap();

    Servers {
        products,
        orders,
        inventory,
    }
}

fn order_server(gateway: Arc<dyn InventoryGateway>) -> TestServer {
    let workflow = Arc::new(OrderWorkflowService::new(
        Arc::new(InMemoryOrderRepository::new()),
        gateway,
    ));
    let router = create_order_router().with_state(OrderApiState {
        workflow,
        request_timeout: TIMEOUT,
    });
    TestServer::new(with_http_layers(router, TIMEOUT)).unwrap()
}

async fn create_order(server: &TestServer, items: Value) -> Value {
    let response = server
        .post("/orders")
        .json(&json!({ "userId": "user-1", "items": items }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    response.json::<Value>()
}

#[tokio::test]
async fn test_create_order_returns_accepted_with_prices() {
    let servers = servers();

    let order = create_order(
        &servers.orders,
        json!([
            { "productId": "P1", "quantity": 2 },
            { "productId": "P2", "quantity": 1 }
        ]),
    )
    .await;

    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["totalPrice"], "25.00");
    assert_eq!(order["items"][0]["unitPrice"], "10.00");
    assert_eq!(order["items"][0]["subtotal"], "20.00");

    let order_id = order["orderId"].as_str().unwrap();
    let fetched = servers.orders.get(&format!("/orders/{}", order_id)).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["orderId"], order_id);
}

#[tokio::test]
async fn test_malformed_order_body_is_bad_request() {
    let servers = servers();

    let missing_items = servers
        .orders
        .post("/orders")
        .json(&json!({ "userId": "user-1" }))
        .await;
    missing_items.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing_items.json::<Value>()["code"], "INVALID_REQUEST_BODY");

    let negative_quantity = servers
        .orders
        .post("/orders")
        .json(&json!({ "userId": "user-1", "items": [{ "productId": "P1", "quantity": -1 }] }))
        .await;
    negative_quantity.assert_status(StatusCode::BAD_REQUEST);

    let zero_quantity = servers
        .orders
        .post("/orders")
        .json(&json!({ "userId": "user-1", "items": [{ "productId": "P1", "quantity": 0 }] }))
        .await;
    zero_quantity.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(zero_quantity.json::<Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_unknown_product_is_unprocessable() {
    let servers = servers();

    let response = servers
        .orders
        .post("/orders")
        .json(&json!({ "userId": "user-1", "items": [{ "productId": "P404", "quantity": 1 }] }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "PRICE_NOT_FOUND");
    assert!(body["error"].as_str().unwrap().contains("P404"));
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let servers = servers();

    servers
        .orders
        .get("/orders/does-not-exist")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    servers
        .orders
        .post("/orders/does-not-exist/events/stock-reserved")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_endpoints_drive_the_order() {
    let servers = servers();
    let order = create_order(&servers.orders, json!([{ "productId": "P1", "quantity": 2 }])).await;
    let order_id = order["orderId"].as_str().unwrap();

    // 在庫予約前の支払い成功は拒否される
    let early = servers
        .orders
        .post(&format!("/orders/{}/events/payment-succeeded", order_id))
        .await;
    early.assert_status(StatusCode::CONFLICT);
    assert_eq!(early.json::<Value>()["code"], "INVALID_TRANSITION");

    let reserved = servers
        .orders
        .post(&format!("/orders/{}/reserve-stock", order_id))
        .await;
    reserved.assert_status_ok();
    let body = reserved.json::<Value>();
    assert_eq!(body["outcome"]["result"], "APPLIED");
    assert_eq!(body["order"]["status"], "STOCK_RESERVED");
    assert_eq!(
        servers.products.stock_of(&ProductId::from_string("P1").unwrap()),
        Some(3)
    );

    let failed = servers
        .orders
        .post(&format!("/orders/{}/events/payment-failed", order_id))
        .json(&json!({ "reason": "card declined" }))
        .await;
    failed.assert_status_ok();
    let body = failed.json::<Value>();
    assert_eq!(body["order"]["status"], "CANCELLED");
    assert_eq!(body["order"]["statusReason"], "payment failed: card declined");
    assert_eq!(
        servers.products.stock_of(&ProductId::from_string("P1").unwrap()),
        Some(5)
    );
}

#[tokio::test]
async fn test_stock_unavailable_event_cancels_order() {
    let servers = servers();
    let order = create_order(&servers.orders, json!([{ "productId": "P2", "quantity": 1 }])).await;
    let order_id = order["orderId"].as_str().unwrap();

    let response = servers
        .orders
        .post(&format!("/orders/{}/events/stock-unavailable", order_id))
        .json(&json!({ "items": [{ "productId": "P2", "quantity": 1, "available": 0 }] }))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["outcome"]["result"], "APPLIED");
    assert_eq!(body["order"]["status"], "CANCELLED");

    // 重複配信
    let replay = servers
        .orders
        .post(&format!("/orders/{}/events/stock-unavailable", order_id))
        .json(&json!({ "items": [] }))
        .await;
    replay.assert_status_ok();
    assert_eq!(replay.json::<Value>()["outcome"]["result"], "ALREADY_APPLIED");
}

#[tokio::test]
async fn test_unreachable_inventory_is_bad_gateway() {
    let gateway = GrpcInventoryGateway::connect_lazy("http://127.0.0.1:1").unwrap();
    let server = order_server(Arc::new(gateway));

    let response = server
        .post("/orders")
        .json(&json!({ "userId": "user-1", "items": [{ "productId": "P1", "quantity": 1 }] }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let servers = servers();

    let response = servers.orders.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_inventory_product_endpoints() {
    let servers = servers();

    let created = servers
        .inventory
        .post("/products")
        .json(&json!({ "name": "Monitor", "price": "199.99", "stockQuantity": 4 }))
        .await;
    created.assert_status(StatusCode::ACCEPTED);
    let product = created.json::<Value>();
    assert_eq!(product["stockQuantity"], 4);
    let product_id = product["productId"].as_str().unwrap();

    let price = servers
        .inventory
        .get(&format!("/products/{}", product_id))
        .await;
    price.assert_status_ok();
    assert_eq!(
        price.json::<Value>(),
        json!({ "productId": product_id, "price": "199.99" })
    );

    servers
        .inventory
        .get("/products/P404")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation_errors() {
    let servers = servers();

    for body in [
        json!({ "name": "Free", "price": "0", "stockQuantity": 1 }),
        json!({ "name": "Empty", "price": "1.00", "stockQuantity": 0 }),
        json!({ "name": "", "price": "1.00", "stockQuantity": 1 }),
        json!({ "price": "1.00", "stockQuantity": 1 }),
    ] {
        servers
            .inventory
            .post("/products")
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_product_price_outside_column_precision_is_bad_request() {
    let servers = servers();

    for price in ["9.999", "10000000000.00"] {
        let response = servers
            .inventory
            .post("/products")
            .json(&json!({ "name": "Cable", "price": price, "stockQuantity": 1 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_stock_update_endpoint() {
    let servers = servers();

    let updated = servers
        .inventory
        .patch("/products/P1/stock")
        .json(&json!({ "change": -2 }))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["stockQuantity"], 3);

    servers
        .inventory
        .patch("/products/P1/stock")
        .json(&json!({ "change": -10 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    servers
        .inventory
        .patch("/products/P404/stock")
        .json(&json!({ "change": 1 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

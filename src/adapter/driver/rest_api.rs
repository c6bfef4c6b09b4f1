use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::adapter::driver::request_dto::{
    CreateOrderRequest, CreateProductRequest, PaymentFailedRequest, StockUnavailableRequest,
    UpdateStockRequest,
};
use crate::adapter::driver::response_dto::{
    OrderResponse, OrderTransitionResponse, ProductPriceResponse, ProductResponse,
};
use crate::application::service::{InventoryApplicationService, OrderWorkflowService};
use crate::application::ApplicationError;
use crate::domain::context::RequestContext;
use crate::domain::model::OrderId;

/// 相関IDを運ぶHTTPヘッダー
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn response(status: StatusCode, code: &str, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(ApiError {
                error: error.into(),
                code: code.to_string(),
            }),
        )
    }
}

// 注文サービスの状態
#[derive(Clone)]
pub struct OrderApiState {
    pub workflow: Arc<OrderWorkflowService>,
    pub request_timeout: Duration,
}

// 在庫サービスの状態
#[derive(Clone)]
pub struct InventoryApiState {
    pub inventory: Arc<InventoryApplicationService>,
    pub request_timeout: Duration,
}

// 注文サービスのルーターを作成
pub fn create_order_router() -> Router<OrderApiState> {
    Router::new()
        .route("/health", get(order_health_check))
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order_by_id))
        .route("/orders/:order_id/reserve-stock", post(reserve_stock_for_order))
        .route("/orders/:order_id/events/stock-reserved", post(stock_reserved))
        .route("/orders/:order_id/events/stock-unavailable", post(stock_unavailable))
        .route("/orders/:order_id/events/payment-succeeded", post(payment_succeeded))
        .route("/orders/:order_id/events/payment-failed", post(payment_failed))
}

// 在庫サービスのルーターを作成
pub fn create_inventory_router() -> Router<InventoryApiState> {
    Router::new()
        .route("/health", get(inventory_health_check))
        .route("/products", post(create_product))
        .route("/products/:product_id", get(get_product_price))
        .route("/products/:product_id/stock", patch(update_stock_quantity))
}

/// 両サービス共通のHTTPミドルウェアを適用する
///
/// `x-request-id` がなければUUIDを採番し、レスポンスにも返す。
/// ハンドラーは同じヘッダーから相関IDを読むので、ログとレスポンスのIDが一致する。
pub fn with_http_layers(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(request_timeout))
            .layer(CorsLayer::permissive()),
    )
}

/// ヘッダーの相関IDとタイムアウトからリクエストコンテキストを作る
/// ヘッダーがなければ新しい相関IDを生成する
fn request_context(headers: &HeaderMap, timeout: Duration) -> RequestContext {
    let correlation_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    RequestContext::new(correlation_id).with_timeout(timeout)
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ApiError::response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST_BODY",
            rejection.body_text(),
        )
    })
}

fn parse_order_id(order_id: &str) -> ApiResult<OrderId> {
    OrderId::from_string(order_id).map_err(|e| map_application_error(e.into()))
}

// ヘルスチェックエンドポイント
async fn order_health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "order-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn inventory_health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "inventory-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// 注文作成エンドポイント
async fn create_order(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let request = parse_body(payload)?;
    let ctx = request_context(&headers, state.request_timeout);
    let (user_id, lines) = request.into_lines();

    match state.workflow.create_order(&ctx, &user_id, lines).await {
        Ok(order) => Ok((StatusCode::ACCEPTED, Json(OrderResponse::from_order(&order)))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文取得エンドポイント
async fn get_order_by_id(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    let ctx = request_context(&headers, state.request_timeout);

    match state.workflow.get_order_by_id(&ctx, &order_id).await {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// PENDINGの注文の在庫予約を実行
async fn reserve_stock_for_order(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> ApiResult<Json<OrderTransitionResponse>> {
    let order_id = parse_order_id(&order_id)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state.workflow.reserve_stock_for_order(&ctx, &order_id).await {
        Ok(transition) => Ok(Json(transition.into())),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫予約完了イベント
async fn stock_reserved(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> ApiResult<Json<OrderTransitionResponse>> {
    let order_id = parse_order_id(&order_id)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state.workflow.handle_stock_reserved(&ctx, &order_id).await {
        Ok(transition) => Ok(Json(transition.into())),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫不足イベント
async fn stock_unavailable(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    payload: Result<Json<StockUnavailableRequest>, JsonRejection>,
) -> ApiResult<Json<OrderTransitionResponse>> {
    let order_id = parse_order_id(&order_id)?;
    let shortages = parse_body(payload)?
        .into_shortages()
        .map_err(|msg| ApiError::response(StatusCode::BAD_REQUEST, "INVALID_INPUT", msg))?;
    let ctx = request_context(&headers, state.request_timeout);

    match state
        .workflow
        .handle_stock_unavailable(&ctx, &order_id, shortages)
        .await
    {
        Ok(transition) => Ok(Json(transition.into())),
        Err(err) => Err(map_application_error(err)),
    }
}

// 支払い成功イベント
async fn payment_succeeded(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> ApiResult<Json<OrderTransitionResponse>> {
    let order_id = parse_order_id(&order_id)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state.workflow.handle_payment_succeeded(&ctx, &order_id).await {
        Ok(transition) => Ok(Json(transition.into())),
        Err(err) => Err(map_application_error(err)),
    }
}

// 支払い失敗イベント（在庫の解放を伴う）
async fn payment_failed(
    State(state): State<OrderApiState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    payload: Result<Json<PaymentFailedRequest>, JsonRejection>,
) -> ApiResult<Json<OrderTransitionResponse>> {
    let order_id = parse_order_id(&order_id)?;
    let request = parse_body(payload)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state
        .workflow
        .handle_payment_failed(&ctx, &order_id, &request.reason)
        .await
    {
        Ok(transition) => Ok(Json(transition.into())),
        Err(err) => Err(map_application_error(err)),
    }
}

// 商品登録エンドポイント
async fn create_product(
    State(state): State<InventoryApiState>,
    headers: HeaderMap,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProductResponse>)> {
    let request = parse_body(payload)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state
        .inventory
        .add_product(&ctx, request.name, request.price, request.stock_quantity)
        .await
    {
        Ok(product) => Ok((
            StatusCode::ACCEPTED,
            Json(ProductResponse::from_product(&product)),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 商品価格の照会エンドポイント
async fn get_product_price(
    State(state): State<InventoryApiState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ProductPriceResponse>> {
    let ctx = request_context(&headers, state.request_timeout);

    match state.inventory.get_product(&ctx, &product_id).await {
        Ok(product) => Ok(Json(ProductPriceResponse::from_product(&product))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫数の増減エンドポイント
async fn update_stock_quantity(
    State(state): State<InventoryApiState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    payload: Result<Json<UpdateStockRequest>, JsonRejection>,
) -> ApiResult<Json<ProductResponse>> {
    let request = parse_body(payload)?;
    let ctx = request_context(&headers, state.request_timeout);

    match state
        .inventory
        .update_stock_quantity(&ctx, &product_id, request.change)
        .await
    {
        Ok(product) => Ok(Json(ProductResponse::from_product(&product))),
        Err(err) => Err(map_application_error(err)),
    }
}

// アプリケーションエラーをHTTPステータスコードとエラーコードにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    match err {
        ApplicationError::InvalidInput(msg) => {
            ApiError::response(StatusCode::BAD_REQUEST, "INVALID_INPUT", msg)
        }
        ApplicationError::NotFound(msg) => {
            ApiError::response(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
        }
        ApplicationError::PriceNotFound(_) => ApiError::response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "PRICE_NOT_FOUND",
            err.to_string(),
        ),
        ApplicationError::InvalidTransition { .. } => ApiError::response(
            StatusCode::CONFLICT,
            "INVALID_TRANSITION",
            err.to_string(),
        ),
        ApplicationError::Upstream { .. } => {
            tracing::warn!(error = %err, "inventory service call failed");
            ApiError::response(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        ApplicationError::Storage { .. } => {
            tracing::error!(error = %err, "storage failure");
            ApiError::response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                err.to_string(),
            )
        }
    }
}

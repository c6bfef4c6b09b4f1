use crate::adapter::inventory_proto::{
    GetProductInfoRequest, GetProductInfoResponse, InventoryService, InventoryServiceServer,
    ProductInfo, ReleaseStockRequest, ReleaseStockResponse, ReserveStockRequest,
    ReserveStockResponse, StockShortageLine, REQUEST_ID_METADATA,
};
use crate::application::service::InventoryApplicationService;
use crate::application::ApplicationError;
use crate::domain::context::RequestContext;
use crate::domain::model::{OrderId, ProductId};
use crate::domain::port::ReservationOutcome;
use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};

/// 在庫サービスのgRPCハンドラー
/// 生成された `InventoryService` トレイトを在庫アプリケーションサービスに委譲する
pub struct InventoryGrpcHandler {
    inventory: Arc<InventoryApplicationService>,
    request_timeout: Duration,
}

impl InventoryGrpcHandler {
    pub fn new(inventory: Arc<InventoryApplicationService>, request_timeout: Duration) -> Self {
        Self {
            inventory,
            request_timeout,
        }
    }

    /// tonicのサーバーに登録できる形にする
    pub fn into_server(self) -> InventoryServiceServer<Self> {
        InventoryServiceServer::new(self)
    }

    /// メタデータから相関IDを取り出してコンテキストを作る
    fn context<T>(&self, request: &Request<T>) -> RequestContext {
        let correlation_id = request
            .metadata()
            .get(REQUEST_ID_METADATA)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        RequestContext::new(correlation_id).with_timeout(self.request_timeout)
    }
}

fn to_status(err: ApplicationError) -> Status {
    match err {
        ApplicationError::InvalidInput(msg) => Status::invalid_argument(msg),
        ApplicationError::NotFound(msg) => Status::not_found(msg),
        ApplicationError::PriceNotFound(_) => Status::failed_precondition(err.to_string()),
        ApplicationError::InvalidTransition { .. } => Status::failed_precondition(err.to_string()),
        ApplicationError::Upstream { .. } => Status::unavailable(err.to_string()),
        ApplicationError::Storage { .. } => {
            tracing::error!(error = %err, "inventory storage failure");
            Status::internal(err.to_string())
        }
    }
}

fn parse_order_id(order_id: &str) -> Result<OrderId, Status> {
    OrderId::from_string(order_id).map_err(|e| Status::invalid_argument(e.to_string()))
}

#[tonic::async_trait]
impl InventoryService for InventoryGrpcHandler {
    async fn get_product_info(
        &self,
        request: Request<GetProductInfoRequest>,
    ) -> Result<Response<GetProductInfoResponse>, Status> {
        let ctx = self.context(&request);
        let product_ids = request
            .into_inner()
            .product_ids
            .iter()
            .map(|id| ProductId::from_string(id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let products = self
            .inventory
            .get_products_by_ids(&ctx, &product_ids)
            .await
            .map_err(to_status)?;

        Ok(Response::new(GetProductInfoResponse {
            products: products
                .iter()
                .map(|product| ProductInfo {
                    id: product.id().to_string(),
                    name: product.name().to_string(),
                    price: product.price().to_string(),
                })
                .collect(),
        }))
    }

    async fn reserve_stock(
        &self,
        request: Request<ReserveStockRequest>,
    ) -> Result<Response<ReserveStockResponse>, Status> {
        let ctx = self.context(&request);
        let message = request.into_inner();
        let order_id = parse_order_id(&message.order_id)?;
        let items = message
            .items
            .iter()
            .map(|line| line.to_domain())
            .collect::<Result<Vec<_>, _>>()
            .map_err(Status::invalid_argument)?;

        let outcome = self
            .inventory
            .reserve_stock(&ctx, &order_id, &items)
            .await
            .map_err(to_status)?;

        let response = match outcome {
            ReservationOutcome::Reserved => ReserveStockResponse {
                reserved: true,
                unavailable: Vec::new(),
            },
            ReservationOutcome::Insufficient(shortages) => ReserveStockResponse {
                reserved: false,
                unavailable: shortages.iter().map(StockShortageLine::from).collect(),
            },
        };
        Ok(Response::new(response))
    }

    async fn release_stock(
        &self,
        request: Request<ReleaseStockRequest>,
    ) -> Result<Response<ReleaseStockResponse>, Status> {
        let ctx = self.context(&request);
        let order_id = parse_order_id(&request.into_inner().order_id)?;

        let released = self
            .inventory
            .release_stock(&ctx, &order_id)
            .await
            .map_err(to_status)?;
        Ok(Response::new(ReleaseStockResponse { released }))
    }
}

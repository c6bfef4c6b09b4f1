use crate::adapter::inventory_proto::{
    GetProductInfoRequest, InventoryServiceClient, ReleaseStockRequest, ReserveStockRequest,
    REQUEST_ID_METADATA,
};
use crate::domain::context::RequestContext;
use crate::domain::model::{Money, OrderId, ProductId, StockItem};
use crate::domain::port::{GatewayError, InventoryGateway, ReservationOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

/// gRPCで在庫サービスを呼び出すゲートウェイ
///
/// 相関IDは `x-request-id` メタデータで、残り期限はgRPCのタイムアウトとして送る。
#[derive(Clone)]
pub struct GrpcInventoryGateway {
    client: InventoryServiceClient<Channel>,
}

impl GrpcInventoryGateway {
    /// 接続を遅延させたクライアントを作成する
    /// 在庫サービスが未起動でも注文サービスは起動できる
    pub fn connect_lazy(url: &str) -> Result<Self, GatewayError> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|e| GatewayError::Unavailable(format!("invalid endpoint {}: {}", url, e)))?;
        Ok(Self::from_channel(endpoint.connect_lazy()))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: InventoryServiceClient::new(channel),
        }
    }

    fn request<T>(ctx: &RequestContext, message: T) -> Result<Request<T>, GatewayError> {
        if ctx.is_expired() {
            return Err(GatewayError::DeadlineExceeded);
        }
        let mut request = Request::new(message);
        if let Ok(value) = ctx.correlation_id().parse::<MetadataValue<Ascii>>() {
            request.metadata_mut().insert(REQUEST_ID_METADATA, value);
        }
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }
        Ok(request)
    }
}

fn status_to_error(operation: &str, status: Status) -> GatewayError {
    tracing::warn!(
        operation,
        code = ?status.code(),
        message = status.message(),
        "inventory call failed"
    );
    match status.code() {
        Code::DeadlineExceeded | Code::Cancelled => GatewayError::DeadlineExceeded,
        Code::InvalidArgument | Code::NotFound | Code::FailedPrecondition => {
            GatewayError::Rejected(status.message().to_string())
        }
        _ => GatewayError::Unavailable(format!("{}: {}", operation, status.message())),
    }
}

#[async_trait]
impl InventoryGateway for GrpcInventoryGateway {
    async fn resolve_prices(
        &self,
        ctx: &RequestContext,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Money>, GatewayError> {
        let request = Self::request(
            ctx,
            GetProductInfoRequest {
                product_ids: product_ids.iter().map(ProductId::to_string).collect(),
            },
        )?;

        let response = self
            .client
            .clone()
            .get_product_info(request)
            .await
            .map_err(|status| status_to_error("GetProductInfo", status))?
            .into_inner();

        let mut prices = HashMap::with_capacity(response.products.len());
        for product in response.products {
            let product_id = ProductId::from_string(&product.id)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            let price = product.price.parse::<Money>().map_err(|e| {
                GatewayError::InvalidResponse(format!("price of {}: {}", product_id, e))
            })?;
            prices.insert(product_id, price);
        }
        tracing::debug!(
            correlation_id = ctx.correlation_id(),
            requested = product_ids.len(),
            resolved = prices.len(),
            "prices resolved"
        );
        Ok(prices)
    }

    async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome, GatewayError> {
        let request = Self::request(ctx, ReserveStockRequest::new(order_id, items))?;

        let response = self
            .client
            .clone()
            .reserve_stock(request)
            .await
            .map_err(|status| status_to_error("ReserveStock", status))?
            .into_inner();

        if response.reserved {
            return Ok(ReservationOutcome::Reserved);
        }
        if response.unavailable.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "reservation refused without unavailable items".to_string(),
            ));
        }
        let shortages = response
            .unavailable
            .iter()
            .map(|line| line.to_domain())
            .collect::<Result<Vec<_>, _>>()
            .map_err(GatewayError::InvalidResponse)?;
        Ok(ReservationOutcome::Insufficient(shortages))
    }

    async fn release_stock(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<bool, GatewayError> {
        let request = Self::request(
            ctx,
            ReleaseStockRequest {
                order_id: order_id.to_string(),
            },
        )?;

        let response = self
            .client
            .clone()
            .release_stock(request)
            .await
            .map_err(|status| status_to_error("ReleaseStock", status))?
            .into_inner();
        Ok(response.released)
    }
}

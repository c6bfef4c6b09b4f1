// 駆動する側アダプター（HTTP・gRPCの受け口）

pub mod grpc_server;
pub mod request_dto;
pub mod response_dto;
pub mod rest_api;

pub use grpc_server::InventoryGrpcHandler;
pub use rest_api::{
    create_inventory_router, create_order_router, with_http_layers, InventoryApiState, OrderApiState,
};

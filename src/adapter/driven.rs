// 駆動される側アダプター（リポジトリ・ゲートウェイの実装）

mod grpc_inventory_gateway;
pub mod in_memory;
mod mysql_order_repository;
mod mysql_product_repository;

pub use grpc_inventory_gateway::GrpcInventoryGateway;
pub use in_memory::{InMemoryOrderRepository, InMemoryProductRepository, InProcessInventoryGateway};
pub use mysql_order_repository::MySqlOrderRepository;
pub use mysql_product_repository::MySqlProductRepository;

//! アプリケーションサービス
//! 注文ワークフローと在庫管理のユースケースを提供する

pub mod inventory_service;
pub mod order_workflow;

pub use inventory_service::InventoryApplicationService;
pub use order_workflow::{OrderLineInput, OrderTransition, OrderWorkflowService};

use ecommerce_order_platform::adapter::database_migration::ORDER_MIGRATIONS;
use ecommerce_order_platform::adapter::driven::{GrpcInventoryGateway, MySqlOrderRepository};
use ecommerce_order_platform::adapter::driver::{
    create_order_router, with_http_layers, OrderApiState,
};
use ecommerce_order_platform::adapter::logging::init_logging;
use ecommerce_order_platform::adapter::{DatabaseConfig, DatabaseMigration, ServerConfig};
use ecommerce_order_platform::application::service::OrderWorkflowService;

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env("0.0.0.0:8081")?;
    init_logging(&server_config.log_level, server_config.log_format)?;

    let config = DatabaseConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "database config loaded");

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;

    DatabaseMigration::new(pool.clone())
        .run(ORDER_MIGRATIONS)
        .await?;

    // 在庫サービスへの接続は最初の呼び出しまで遅延する
    let inventory = Arc::new(GrpcInventoryGateway::connect_lazy(
        &server_config.inventory_grpc_url,
    )?);
    tracing::info!(url = %server_config.inventory_grpc_url, "inventory gateway configured");

    let order_repository = Arc::new(MySqlOrderRepository::new(pool));
    let workflow = Arc::new(OrderWorkflowService::new(order_repository, inventory));

    let app = with_http_layers(
        create_order_router().with_state(OrderApiState {
            workflow,
            request_timeout: server_config.request_timeout,
        }),
        server_config.request_timeout,
    );

    let listener = tokio::net::TcpListener::bind(server_config.http_addr).await?;
    tracing::info!(addr = %server_config.http_addr, "order HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("order service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

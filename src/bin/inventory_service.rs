use ecommerce_order_platform::adapter::database_migration::INVENTORY_MIGRATIONS;
use ecommerce_order_platform::adapter::driven::MySqlProductRepository;
use ecommerce_order_platform::adapter::driver::{
    create_inventory_router, with_http_layers, InventoryApiState, InventoryGrpcHandler,
};
use ecommerce_order_platform::adapter::logging::init_logging;
use ecommerce_order_platform::adapter::{DatabaseConfig, DatabaseMigration, ServerConfig};
use ecommerce_order_platform::application::service::InventoryApplicationService;

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env("0.0.0.0:8082")?;
    init_logging(&server_config.log_level, server_config.log_format)?;

    let config = DatabaseConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "database config loaded");

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;

    DatabaseMigration::new(pool.clone())
        .run(INVENTORY_MIGRATIONS)
        .await?;

    let product_repository = Arc::new(MySqlProductRepository::new(pool));
    let inventory = Arc::new(InventoryApplicationService::new(product_repository));

    let app = with_http_layers(
        create_inventory_router().with_state(InventoryApiState {
            inventory: inventory.clone(),
            request_timeout: server_config.request_timeout,
        }),
        server_config.request_timeout,
    );
    let grpc_handler = InventoryGrpcHandler::new(inventory, server_config.request_timeout);

    let listener = tokio::net::TcpListener::bind(server_config.http_addr).await?;
    tracing::info!(addr = %server_config.http_addr, "inventory HTTP server listening");
    tracing::info!(addr = %server_config.grpc_addr, "inventory gRPC server listening");

    // HTTPとgRPCを同じプロセスで並行して提供する
    let http_server = async {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(BoxError::from)
    };
    let grpc_server = async {
        tonic::transport::Server::builder()
            .add_service(grpc_handler.into_server())
            .serve_with_shutdown(server_config.grpc_addr, shutdown_signal())
            .await
            .map_err(BoxError::from)
    };
    tokio::try_join!(http_server, grpc_server)?;

    tracing::info!("inventory service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

use crate::adapter::env_config::{parse_positive, parse_var, var_or, ConfigError};
use crate::adapter::logging::LogFormat;
use std::net::SocketAddr;
use std::time::Duration;

/// サーバー設定（待ち受けアドレス・タイムアウト・ログ）
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub inventory_grpc_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// 環境変数から設定を読み取る
    ///
    /// # Arguments
    /// * `default_http_addr` - `HTTP_ADDR` 未設定時のアドレス（サービスごとに異なる）
    pub fn from_env(default_http_addr: &str) -> Result<Self, ConfigError> {
        let inventory_grpc_url = var_or("INVENTORY_GRPC_URL", "http://localhost:50051");
        if !inventory_grpc_url.starts_with("http://") && !inventory_grpc_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid INVENTORY_GRPC_URL: {}",
                inventory_grpc_url
            )));
        }

        Ok(Self {
            http_addr: parse_var("HTTP_ADDR", default_http_addr)?,
            grpc_addr: parse_var("GRPC_ADDR", "0.0.0.0:50051")?,
            inventory_grpc_url,
            request_timeout: Duration::from_millis(parse_positive("REQUEST_TIMEOUT_MS", "5000")?),
            log_level: var_or("LOG_LEVEL", "info"),
            log_format: parse_var("LOG_FORMAT", "text")?,
        })
    }
}

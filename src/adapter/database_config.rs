use crate::adapter::env_config::{parse_positive, parse_var, var_or};
pub use crate::adapter::env_config::ConfigError;

/// MySQL接続設定
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// `DATABASE_*` 環境変数から読み取る
    /// 未設定の項目はローカル開発用の既定値になる
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_connections = u32::try_from(parse_positive("DATABASE_MAX_CONNECTIONS", "10")?)
            .map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))
            })?;

        Ok(Self {
            host: var_or("DATABASE_HOST", "localhost"),
            port: parse_var("DATABASE_PORT", "3306")?,
            database: var_or("DATABASE_NAME", "ecommerce_db"),
            username: var_or("DATABASE_USER", "ecommerce_user"),
            password: var_or("DATABASE_PASSWORD", "ecommerce_password"),
            max_connections,
        })
    }

    /// sqlxに渡す接続URL
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

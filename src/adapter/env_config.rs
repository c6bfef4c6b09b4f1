//! 環境変数から設定値を読むための共通処理

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// 環境変数の値（未設定なら既定値）
pub(crate) fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// 環境変数を型に変換する（未設定なら既定値を変換）
pub(crate) fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = var_or(name, default);
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {} ({})", name, value, e)))
}

/// 0を許さない数値設定
pub(crate) fn parse_positive(name: &str, default: &str) -> Result<u64, ConfigError> {
    match parse_var::<u64>(name, default)? {
        0 => Err(ConfigError::InvalidValue(format!(
            "{} must be greater than zero",
            name
        ))),
        value => Ok(value),
    }
}

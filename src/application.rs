// アプリケーション層
// ユースケース（注文ワークフロー・在庫操作）を実装する

pub mod error;
pub mod service;

pub use error::ApplicationError;

//! 在庫サービスと注文サービスから成るECプラットフォーム
//!
//! - `domain`: 注文・商品モデル、注文ステータスの状態機械、出力ポート
//! - `application`: 注文ワークフローと在庫のユースケース
//! - `adapter`: MySQLリポジトリ、在庫gRPCクライアント/サーバー、REST API、設定

pub mod adapter;
pub mod application;
pub mod domain;

// ドメイン層
// 注文・商品のモデル、状態機械、出力ポート

pub mod context;
pub mod error;
pub mod event;
pub mod model;
pub mod port;
pub mod service;

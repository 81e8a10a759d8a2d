pub mod api;
pub mod commands;
/// PIX決済（QRコード作成・承認待ち・無賃乗車）のモジュール
pub mod models;
pub mod poller;
pub mod service;

pub use api::*;
pub use models::*;
pub use poller::*;
pub use service::*;

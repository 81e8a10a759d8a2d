pub mod commands;
/// 路線・運賃・車両カタログのモジュール
pub mod models;
pub mod service;

pub use models::*;
pub use service::*;

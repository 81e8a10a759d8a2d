pub mod api;
pub mod commands;
/// ジャーニー（乗務シフト）管理のモジュール
pub mod models;
pub mod synchronizer;

pub use api::*;
pub use models::*;
pub use synchronizer::*;

pub mod cache;
pub mod commands;
/// 路線・車両選択のモジュール
pub mod models;

pub use cache::*;
pub use models::*;

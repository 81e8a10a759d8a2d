pub mod commands;
/// 社員認証機能のモジュール
pub mod models;
pub mod service;
pub mod session;

pub use models::*;
pub use service::*;
pub use session::*;

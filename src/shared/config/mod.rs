/// 環境設定関連のモジュール
pub mod environment;
pub mod initialization;

// 便利な再エクスポート
pub use environment::{get_environment, ApiConfig, Environment, EnvironmentConfig};
pub use initialization::{initialize_application, InitializationResult};

/// 機能横断で使う共通モジュール
pub mod api_client;
pub mod config;
pub mod errors;
pub mod secure_storage;
pub mod utils;

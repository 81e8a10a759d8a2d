use crate::shared::config::{get_environment, Environment};
use crate::shared::errors::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// セキュアストアのファイル名
pub const SECURE_STORE_FILENAME: &str = "secure.json";

/// アプリケーション初期化の結果を表す構造体
#[derive(Debug)]
pub struct InitializationResult {
    /// 初回起動かどうか
    pub is_first_run: bool,
    /// アプリケーションデータディレクトリのパス
    pub app_data_dir: PathBuf,
    /// セキュアストアファイルのパス
    pub secure_store_path: PathBuf,
    /// 実行環境
    pub environment: Environment,
}

/// アプリケーションの初期化を実行する
///
/// # 処理内容
/// 1. アプリケーションデータディレクトリの解決と作成
/// 2. 初回起動の判定（セキュアストアファイルの有無）
pub fn initialize_application() -> AppResult<InitializationResult> {
    let environment = get_environment();
    let app_data_dir = ensure_app_data_directory(&resolve_app_data_dir(&environment)?)?;
    let secure_store_path = app_data_dir.join(SECURE_STORE_FILENAME);
    let is_first_run = !secure_store_path.exists();

    if is_first_run {
        log_first_run_initialization(&environment, &app_data_dir, &secure_store_path);
    }

    Ok(InitializationResult {
        is_first_run,
        app_data_dir,
        secure_store_path,
        environment,
    })
}

/// データディレクトリを解決する
///
/// `PAGBUS_DATA_DIR` が設定されていればそれを優先し、
/// なければプラットフォームのデータディレクトリ配下を使う
pub fn resolve_app_data_dir(environment: &Environment) -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var("PAGBUS_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::data_dir().ok_or_else(|| {
        AppError::configuration("プラットフォームのデータディレクトリを取得できませんでした")
    })?;

    let dir_name = match environment {
        Environment::Development => "pagbus-dev",
        Environment::Production => "pagbus",
    };

    Ok(base.join(dir_name))
}

/// アプリケーションデータディレクトリを確実に作成する
fn ensure_app_data_directory(app_data_dir: &Path) -> AppResult<PathBuf> {
    if !app_data_dir.exists() {
        fs::create_dir_all(app_data_dir).map_err(|e| {
            AppError::configuration(format!("アプリデータディレクトリの作成に失敗: {e}"))
        })?;

        log::info!("アプリケーションデータディレクトリを作成しました: {app_data_dir:?}");
    }

    Ok(app_data_dir.to_path_buf())
}

fn log_first_run_initialization(
    environment: &Environment,
    app_data_dir: &Path,
    secure_store_path: &Path,
) {
    log::info!("=== アプリケーション初回起動 ===");
    log::info!("実行環境: {environment:?}");
    log::info!("アプリデータディレクトリ: {app_data_dir:?}");
    log::info!("セキュアストア: {secure_store_path:?}");
}

/// 初期化完了ログを出力する
pub fn log_initialization_complete(result: &InitializationResult) {
    if result.is_first_run {
        log::info!("初回起動の初期化が正常に完了しました");
    } else {
        log::info!("アプリケーション起動完了（既存セキュアストアを使用）");
    }
    log::info!("環境: {:?}", result.environment);
}

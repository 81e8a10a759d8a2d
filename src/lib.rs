pub mod features;
pub mod shared;

use features::auth::{AuthService, Session};
use features::catalog::CatalogService;
use features::journeys::{HttpJourneyApi, JourneySynchronizer};
use features::payments::{HttpTransactionStatusSource, PaymentService};
use features::selection::SelectionCache;
use log::{error, info, warn};
use shared::api_client::ApiClient;
use shared::config::environment::{initialize_logging_system, load_environment_variables};
use shared::config::initialization::log_initialization_complete;
use shared::config::{initialize_application, ApiConfig, Environment};
use shared::errors::{AppError, AppResult};
use shared::secure_storage::{FileSecureStore, SecureStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const PDF_DIRECTORY: &str = "pdfs";

/// アプリケーション状態（各画面から使うサービスを保持）
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub session: Session,
    pub catalog: CatalogService,
    pub selection: SelectionCache,
    pub journeys: JourneySynchronizer,
    pub payments: PaymentService,
    /// ジャーニーPDFの保存先
    pub pdf_dir: PathBuf,
}

impl AppState {
    /// アプリ起動時の初期化
    ///
    /// # 処理内容
    /// 1. 環境変数とログシステムの初期化
    /// 2. データディレクトリとセキュアストアの準備
    /// 3. API設定の読み込みと検証
    pub fn initialize() -> AppResult<Self> {
        load_environment_variables();
        initialize_logging_system();

        info!("アプリケーション初期化を開始します...");

        let init = initialize_application().map_err(|e| {
            error!("データディレクトリの初期化に失敗しました: {e}");
            e
        })?;

        let store = Arc::new(FileSecureStore::open(&init.secure_store_path)?);

        let config = ApiConfig::from_env();
        verify_api_config(&config, &init.environment)?;

        let state = Self::with_store(config, store, init.app_data_dir.join(PDF_DIRECTORY))?;

        log_initialization_complete(&init);
        Ok(state)
    }

    /// 設定とセキュアストアからサービス群を組み立てる
    pub fn with_store(
        config: ApiConfig,
        store: Arc<dyn SecureStore>,
        pdf_dir: PathBuf,
    ) -> AppResult<Self> {
        let poll_interval = Duration::from_secs(config.poll_interval_seconds.max(1));
        let api = Arc::new(ApiClient::new(config, store.clone())?);
        let session = Session::new(store.clone());

        Ok(Self {
            auth: AuthService::new(api.clone(), session.clone()),
            catalog: CatalogService::new(api.clone()),
            selection: SelectionCache::new(store.clone()),
            journeys: JourneySynchronizer::new(Arc::new(HttpJourneyApi::new(api.clone())), store),
            payments: PaymentService::new(
                api.clone(),
                Arc::new(HttpTransactionStatusSource::new(api)),
                session.clone(),
                poll_interval,
            ),
            session,
            pdf_dir,
        })
    }
}

/// API設定を検証する
///
/// 本番環境では不正な設定で起動しない。開発環境ではログに残して続行する。
fn verify_api_config(config: &ApiConfig, environment: &Environment) -> AppResult<()> {
    let production = *environment == Environment::Production;

    if let Err(e) = config.validate() {
        error!("API設定の検証に失敗しました: {e}");
        if production {
            return Err(AppError::configuration(e));
        }
        warn!("開発環境のため、設定エラーを無視して続行します");
    }

    if production && config.is_localhost() {
        warn!("本番環境でlocalhostのAPIサーバーが設定されています: {}", config.base_url);
    }

    Ok(())
}

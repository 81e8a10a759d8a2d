// ジャーニー同期モジュール
//
// 稼働中ジャーニーの正はサーバー側にあり、端末には「アクティブなジャーニーID」
// だけをキャッシュする。画面表示のたびに sync() でサーバーと突き合わせる。

use crate::features::journeys::api::JourneyApi;
use crate::features::journeys::models::{
    CreateJourneyRequest, FinalizeOutcome, Journey, JourneyDetail, JourneyPayment,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::secure_storage::{SecureStorageKeys, SecureStore};
use crate::shared::utils::validate_required_field;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDFは終了済みジャーニーのみ
pub const PDF_REQUIRES_FINALIZED_MESSAGE: &str =
    "A jornada precisa estar finalizada para baixar o PDF.";

/// ジャーニー同期サービス
#[derive(Clone)]
pub struct JourneySynchronizer {
    api: Arc<dyn JourneyApi>,
    store: Arc<dyn SecureStore>,
}

impl JourneySynchronizer {
    /// 新しいJourneySynchronizerを作成する
    ///
    /// # 引数
    /// * `api` - ジャーニーAPI
    /// * `store` - アクティブなジャーニーIDを保存するストア
    pub fn new(api: Arc<dyn JourneyApi>, store: Arc<dyn SecureStore>) -> Self {
        Self { api, store }
    }

    /// ジャーニーを開始する
    ///
    /// サーバーが拒否した場合（既に稼働中のジャーニーがあるなど）はそのままエラーを返す
    ///
    /// # 引数
    /// * `bus_line` - 路線ID
    /// * `vehicle_prefix` - 車両番号
    ///
    /// # 戻り値
    /// 作成されたジャーニー
    pub async fn create(&self, bus_line: i64, vehicle_prefix: &str) -> AppResult<Journey> {
        validate_required_field(vehicle_prefix, "Selecione um veículo.")?;

        let request = CreateJourneyRequest {
            bus_line,
            vehicle_prefix: vehicle_prefix.trim().to_string(),
        };

        log::info!(
            "ジャーニーを開始します: bus_line={bus_line}, vehicle_prefix={}",
            request.vehicle_prefix
        );

        let journey = self.api.create(&request).await.map_err(|e| {
            log::warn!("ジャーニーの開始に失敗しました: {e}");
            e
        })?;

        self.store_active_journey_id(journey.id);
        log::info!("ジャーニーを開始しました: journey_id={}", journey.id);
        Ok(journey)
    }

    /// 稼働中のジャーニーをサーバーと同期する
    ///
    /// 1. サーバーに稼働中ジャーニーを問い合わせる
    /// 2. 見つかればIDを保存して返す
    /// 3. 404なら保存済みIDを削除してNone
    /// 4. それ以外の失敗では保存済みIDのジャーニーを取得し、未終了なら返す
    ///
    /// エラーは返さない（画面表示のたびに呼ばれるため）
    pub async fn sync(&self) -> Option<Journey> {
        match self.api.active().await {
            Ok(journey) => {
                log::debug!("稼働中のジャーニーを取得しました: journey_id={}", journey.id);
                self.store_active_journey_id(journey.id);
                Some(journey)
            }
            Err(e) if e.is_not_found() => {
                log::debug!("稼働中のジャーニーはありません");
                self.clear_stored_active_journey_id();
                None
            }
            Err(e) => {
                log::warn!("稼働中ジャーニーの取得に失敗しました。保存済みIDで確認します: {e}");
                self.sync_from_stored_pointer().await
            }
        }
    }

    async fn sync_from_stored_pointer(&self) -> Option<Journey> {
        let journey_id = self.stored_active_journey_id()?;

        match self.api.get(journey_id).await {
            Ok(journey) if journey.is_active() => {
                log::info!("保存済みIDのジャーニーを使用します: journey_id={journey_id}");
                Some(journey)
            }
            Ok(_) => {
                log::info!("保存済みIDのジャーニーは終了済みです: journey_id={journey_id}");
                self.clear_stored_active_journey_id();
                None
            }
            Err(e) => {
                log::warn!("保存済みIDのジャーニーを確認できません。IDを削除します: journey_id={journey_id}, error={e}");
                self.clear_stored_active_journey_id();
                None
            }
        }
    }

    /// ジャーニーを終了する
    ///
    /// 結果に関わらず、保存済みIDがこのジャーニーなら削除する
    ///
    /// # 戻り値
    /// 終了済みジャーニー、または決済がなく削除された場合はDeleted
    pub async fn finalize(&self, journey_id: i64) -> AppResult<FinalizeOutcome> {
        log::info!("ジャーニーを終了します: journey_id={journey_id}");

        let outcome: FinalizeOutcome = self
            .api
            .finalize(journey_id)
            .await
            .map_err(|e| {
                log::warn!("ジャーニーの終了に失敗しました: journey_id={journey_id}, error={e}");
                e
            })?
            .into();

        if self.stored_active_journey_id() == Some(journey_id) {
            self.clear_stored_active_journey_id();
        }

        match &outcome {
            FinalizeOutcome::Finalized { journey } => log::info!(
                "ジャーニーを終了しました: journey_id={}, total_amount={}",
                journey.id,
                journey.total_amount
            ),
            FinalizeOutcome::Deleted { detail } => log::info!(
                "決済のないジャーニーが削除されました: journey_id={journey_id}, detail={detail:?}"
            ),
        }

        Ok(outcome)
    }

    /// ジャーニー一覧
    pub async fn list(&self, finalizada: Option<bool>) -> AppResult<Vec<Journey>> {
        self.api.list(finalizada).await
    }

    /// 終了済みジャーニー一覧（履歴画面）
    pub async fn list_finalized(&self) -> AppResult<Vec<Journey>> {
        self.api.list(Some(true)).await
    }

    /// IDでジャーニーを取得する
    pub async fn get_by_id(&self, journey_id: i64) -> AppResult<Journey> {
        self.api.get(journey_id).await
    }

    /// ジャーニーの決済一覧
    pub async fn get_payments(&self, journey_id: i64) -> AppResult<Vec<JourneyPayment>> {
        self.api.payments(journey_id).await
    }

    /// ジャーニーのPDFをダウンロードする
    pub async fn download_pdf(&self, journey_id: i64) -> AppResult<Vec<u8>> {
        self.api.download_pdf(journey_id).await
    }

    /// ジャーニーと決済一覧を並行して取得する
    pub async fn detail(&self, journey_id: i64) -> AppResult<JourneyDetail> {
        let (journey, payments) = futures::try_join!(
            self.api.get(journey_id),
            self.api.payments(journey_id)
        )?;
        Ok(JourneyDetail { journey, payments })
    }

    /// ジャーニーのPDFをディレクトリに保存する
    ///
    /// # 引数
    /// * `journey_id` - ジャーニーID
    /// * `dir` - 保存先ディレクトリ（なければ作成する）
    ///
    /// # 戻り値
    /// 保存したファイルのパス
    pub async fn save_pdf(&self, journey_id: i64, dir: &Path) -> AppResult<PathBuf> {
        let journey = self.api.get(journey_id).await?;
        if !journey.finalizada {
            return Err(AppError::validation(PDF_REQUIRES_FINALIZED_MESSAGE));
        }

        let bytes = self.api.download_pdf(journey_id).await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(journey.pdf_file_name(Utc::now()));
        tokio::fs::write(&path, &bytes).await?;

        log::info!(
            "ジャーニーのPDFを保存しました: journey_id={journey_id}, path={path:?}, size={}",
            bytes.len()
        );
        Ok(path)
    }

    /// 保存済みのアクティブなジャーニーID
    pub fn stored_active_journey_id(&self) -> Option<i64> {
        match self.store.get(SecureStorageKeys::ACTIVE_JOURNEY_ID) {
            Ok(value) => value.and_then(|v| v.trim().parse().ok()),
            Err(e) => {
                log::warn!("アクティブなジャーニーIDの読み込みに失敗しました: {e}");
                None
            }
        }
    }

    /// 保存済みのアクティブなジャーニーIDを削除する
    pub fn clear_stored_active_journey_id(&self) {
        if let Err(e) = self.store.delete(SecureStorageKeys::ACTIVE_JOURNEY_ID) {
            log::warn!("アクティブなジャーニーIDの削除に失敗しました: {e}");
        }
    }

    fn store_active_journey_id(&self, journey_id: i64) {
        if let Err(e) = self
            .store
            .set(SecureStorageKeys::ACTIVE_JOURNEY_ID, &journey_id.to_string())
        {
            log::warn!("アクティブなジャーニーIDの保存に失敗しました: {e}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FakeJourneyApi, Reply};
    use super::*;
    use crate::features::journeys::models::fixtures::journey;
    use crate::features::journeys::models::FinalizeResponse;
    use crate::shared::secure_storage::test_support::FailingSecureStore;
    use crate::shared::secure_storage::MemorySecureStore;
    use quickcheck_macros::quickcheck;

    type Fixture = (
        JourneySynchronizer,
        Arc<FakeJourneyApi>,
        Arc<MemorySecureStore>,
    );

    fn synchronizer(api: FakeJourneyApi) -> Fixture {
        let api = Arc::new(api);
        let store = Arc::new(MemorySecureStore::new());
        (
            JourneySynchronizer::new(api.clone(), store.clone()),
            api,
            store,
        )
    }

    fn pointer(store: &MemorySecureStore) -> Option<String> {
        store.get(SecureStorageKeys::ACTIVE_JOURNEY_ID).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_sync_returns_same_journey() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.create = Reply::Ok(journey(55, false));
            s.active = Reply::Ok(journey(55, false));
        }));

        let created = sync.create(10, "ABC123").await.unwrap();
        assert_eq!(created.id, 55);
        assert_eq!(pointer(&store).as_deref(), Some("55"));

        let active = sync.sync().await.unwrap();
        assert_eq!(active.id, 55);
    }

    #[tokio::test]
    async fn test_create_rejection_is_surfaced_and_pointer_untouched() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.create = Reply::Status(400);
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "54").unwrap();

        let error = sync.create(10, "ABC123").await.unwrap_err();
        assert_eq!(error.status(), Some(400));
        assert_eq!(pointer(&store).as_deref(), Some("54"));
    }

    #[tokio::test]
    async fn test_create_requires_vehicle() {
        let (sync, api, _store) = synchronizer(FakeJourneyApi::new());
        let error = sync.create(10, "  ").await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_overwrites_stale_pointer() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Ok(journey(60, false));
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        assert_eq!(sync.sync().await.map(|j| j.id), Some(60));
        assert_eq!(pointer(&store).as_deref(), Some("60"));
    }

    #[tokio::test]
    async fn test_sync_not_found_clears_pointer() {
        let (sync, api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.by_id.insert(55, Reply::Ok(journey(55, false)));
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        assert!(sync.sync().await.is_none());
        assert_eq!(pointer(&store), None);
        // 404はフォールバックしない
        assert_eq!(api.calls(), vec!["active".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_network_failure_falls_back_to_stored_pointer() {
        let (sync, api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Network;
            s.by_id.insert(55, Reply::Ok(journey(55, false)));
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        let journey = sync.sync().await.unwrap();
        assert_eq!(journey.id, 55);
        assert_eq!(pointer(&store).as_deref(), Some("55"));
        assert_eq!(api.calls(), vec!["active".to_string(), "get:55".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_fallback_never_resurrects_finalized_journey() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Status(500);
            s.by_id.insert(55, Reply::Ok(journey(55, true)));
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        assert!(sync.sync().await.is_none());
        assert_eq!(pointer(&store), None);
    }

    #[tokio::test]
    async fn test_sync_fallback_not_found_clears_pointer() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Network;
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        assert!(sync.sync().await.is_none());
        assert_eq!(pointer(&store), None);
    }

    #[tokio::test]
    async fn test_sync_fallback_network_failure_clears_pointer() {
        let (sync, api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Network;
            s.by_id.insert(55, Reply::Network);
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        assert!(sync.sync().await.is_none());
        assert_eq!(pointer(&store), None);
        assert_eq!(api.calls(), vec!["active".to_string(), "get:55".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_without_pointer_returns_none_on_failure() {
        let (sync, api, _store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Network;
        }));

        assert!(sync.sync().await.is_none());
        assert_eq!(api.calls(), vec!["active".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_tolerates_broken_store() {
        let api = Arc::new(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Ok(journey(55, false));
        }));
        let sync = JourneySynchronizer::new(api, Arc::new(FailingSecureStore));

        assert_eq!(sync.sync().await.map(|j| j.id), Some(55));
        assert_eq!(sync.stored_active_journey_id(), None);
    }

    #[tokio::test]
    async fn test_finalized_journey_is_no_longer_synced() {
        let mut finalized = journey(55, true);
        finalized.finalized_at = Some("2025-03-10T18:00:00Z".to_string());

        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Ok(journey(55, false));
            s.finalize = Reply::Ok(FinalizeResponse::Retained(finalized.clone()));
        }));

        assert_eq!(sync.sync().await.map(|j| j.id), Some(55));

        let outcome = sync.finalize(55).await.unwrap();
        assert_eq!(outcome.journey().map(|j| j.id), Some(55));
        assert_eq!(pointer(&store), None);

        assert!(sync.sync().await.map(|j| j.id) != Some(55));
    }

    #[tokio::test]
    async fn test_finalized_journey_not_synced_even_when_offline() {
        let (sync, api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.active = Reply::Ok(journey(55, false));
            s.finalize = Reply::Ok(FinalizeResponse::Retained(journey(55, true)));
        }));
        sync.sync().await;
        sync.finalize(55).await.unwrap();

        api.state.lock().unwrap().active = Reply::Network;
        assert!(sync.sync().await.is_none());
        assert_eq!(pointer(&store), None);
    }

    #[tokio::test]
    async fn test_finalize_deleted_journey_clears_pointer() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.finalize = Reply::Ok(FinalizeResponse::Deleted {
                detail: Some("Jornada removida por não possuir pagamentos.".to_string()),
            });
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        let outcome = sync.finalize(55).await.unwrap();

        assert!(outcome.journey().is_none());
        assert_ne!(pointer(&store).as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn test_finalize_other_journey_keeps_pointer() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.finalize = Reply::Ok(FinalizeResponse::Retained(journey(40, true)));
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        sync.finalize(40).await.unwrap();
        assert_eq!(pointer(&store).as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn test_finalize_failure_is_surfaced() {
        let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.finalize = Reply::Network;
        }));
        store.set(SecureStorageKeys::ACTIVE_JOURNEY_ID, "55").unwrap();

        let error = sync.finalize(55).await.unwrap_err();
        assert!(error.is_network());
        assert_eq!(pointer(&store).as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn test_list_finalized_filters() {
        let (sync, _api, _store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.by_id.insert(1, Reply::Ok(journey(1, true)));
            s.by_id.insert(2, Reply::Ok(journey(2, false)));
        }));

        let finalized = sync.list_finalized().await.unwrap();
        assert_eq!(finalized.iter().map(|j| j.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(sync.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detail_loads_journey_and_payments() {
        let payment: JourneyPayment = serde_json::from_value(serde_json::json!({
            "id": 1, "quantidade": 2, "valor_total": "8.40", "payment_status": "aprovado"
        }))
        .unwrap();
        let (sync, _api, _store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.by_id.insert(55, Reply::Ok(journey(55, true)));
            s.payments = Reply::Ok(vec![payment.clone()]);
        }));

        let detail = sync.detail(55).await.unwrap();
        assert_eq!(detail.journey.id, 55);
        assert_eq!(detail.payments, vec![payment]);

        assert!(sync.detail(99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_save_pdf_requires_finalized_journey() {
        let temp = tempfile::tempdir().unwrap();
        let (sync, api, _store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.by_id.insert(55, Reply::Ok(journey(55, false)));
            s.pdf = Reply::Ok(b"%PDF-1.4".to_vec());
        }));

        let error = sync.save_pdf(55, temp.path()).await.unwrap_err();
        assert_eq!(error.user_message(), PDF_REQUIRES_FINALIZED_MESSAGE);
        assert!(!api.calls().contains(&"pdf:55".to_string()));
    }

    #[tokio::test]
    async fn test_save_pdf_writes_file() {
        let temp = tempfile::tempdir().unwrap();
        let mut finalized = journey(55, true);
        finalized.finalized_at = Some("2025-03-10T18:00:00Z".to_string());
        let (sync, _api, _store) = synchronizer(FakeJourneyApi::new().with(|s| {
            s.by_id.insert(55, Reply::Ok(finalized.clone()));
            s.pdf = Reply::Ok(b"%PDF-1.4".to_vec());
        }));

        let dir = temp.path().join("pdfs");
        let path = sync.save_pdf(55, &dir).await.unwrap();

        assert_eq!(path, dir.join("jornada_55_20250310.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    }

    #[quickcheck]
    fn prop_consistent_server_always_wins(journey_id: i64, calls: u8, stale: Option<i64>) -> bool {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (sync, _api, store) = synchronizer(FakeJourneyApi::new().with(|s| {
                s.active = Reply::Ok(journey(journey_id, false));
            }));
            if let Some(stale) = stale {
                store
                    .set(SecureStorageKeys::ACTIVE_JOURNEY_ID, &stale.to_string())
                    .unwrap();
            }

            for _ in 0..(calls % 16) + 1 {
                if sync.sync().await.map(|j| j.id) != Some(journey_id) {
                    return false;
                }
            }
            sync.stored_active_journey_id() == Some(journey_id)
        })
    }
}

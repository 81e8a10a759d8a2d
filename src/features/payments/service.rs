use crate::features::auth::session::Session;
use crate::features::payments::api::{transaction_endpoint, TransactionStatusSource};
use crate::features::payments::models::{
    GratuidadeUpload, PaymentDetail, PaymentDraft, PaymentResponse,
    TransactionHistoryEntry, TransactionStatus,
};
use crate::features::payments::poller::{PaymentPoller, PollerHandle};
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::image_mime_type;
use chrono::Utc;
use reqwest::multipart;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const CREATE_PAYMENT_ENDPOINT: &str = "/payment/transactions/create_payment/";
const TRANSACTIONS_ENDPOINT: &str = "/payment/transactions/";
const HISTORY_ENDPOINT: &str = "/payment/history/";
const GRATUIDADE_ENDPOINT: &str = "/payment/history/create_gratuidade/";

/// 会社IDがセッションにない場合のメッセージ
pub const MISSING_COMPANY_MESSAGE: &str =
    "Não foi possível identificar a empresa do usuário. Faça login novamente.";

/// PIX決済サービス
#[derive(Clone)]
pub struct PaymentService {
    api: Arc<ApiClient>,
    status_source: Arc<dyn TransactionStatusSource>,
    session: Session,
    poll_interval: Duration,
}

impl PaymentService {
    /// 新しいPaymentServiceを作成する
    ///
    /// # 引数
    /// * `api` - APIクライアント
    /// * `status_source` - ポーリングで使う取引ステータスの取得元
    /// * `session` - セッション（ユーザーID・会社ID）
    /// * `poll_interval` - ポーリング間隔
    pub fn new(
        api: Arc<ApiClient>,
        status_source: Arc<dyn TransactionStatusSource>,
        session: Session,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            status_source,
            session,
            poll_interval,
        }
    }

    /// PIX決済を作成する
    ///
    /// # 引数
    /// * `draft` - 路線・車両・運賃・数量
    /// * `journey_id` - 稼働中のジャーニーID
    ///
    /// # 戻り値
    /// QRコード表示画面のデータ
    pub async fn generate(
        &self,
        draft: &PaymentDraft,
        journey_id: Option<i64>,
    ) -> AppResult<PaymentDetail> {
        let company_id = self
            .session
            .company_id()
            .ok_or_else(|| AppError::validation(MISSING_COMPANY_MESSAGE))?;
        let user_id = self.session.user_id();

        let request = draft.to_request(company_id, user_id, journey_id, Utc::now().timestamp_millis());

        log::info!(
            "PIX決済を作成します: company_id={company_id}, bus_line_id={}, quantity={}, total={}",
            draft.selection.bus_line_id,
            draft.quantity(),
            draft.total()
        );

        let response: PaymentResponse = self
            .api
            .post(CREATE_PAYMENT_ENDPOINT, &request)
            .await
            .map_err(|e| {
                log::error!("PIX決済の作成に失敗しました: {e}");
                e
            })?;

        let context = draft.context(&response.transaction.id, journey_id);
        let detail = PaymentDetail::from_response(response, context);

        log::info!(
            "PIX決済を作成しました: transaction_id={}",
            detail.context.transaction_id
        );
        Ok(detail)
    }

    /// 取引を取得する
    pub async fn transaction(&self, transaction_id: &str) -> AppResult<TransactionStatus> {
        self.status_source.transaction_status(transaction_id).await
    }

    /// 取引の決済リンクを取得する
    pub async fn payment_link(&self, transaction_id: &str) -> AppResult<Value> {
        self.api
            .get(&transaction_endpoint(transaction_id, "get_payment_link/"))
            .await
    }

    /// 取引一覧
    pub async fn transactions(&self) -> AppResult<Vec<TransactionStatus>> {
        self.api.get_list(TRANSACTIONS_ENDPOINT).await
    }

    /// ログイン中の社員の取引履歴
    pub async fn history(&self) -> AppResult<Vec<TransactionHistoryEntry>> {
        self.api.get_list(HISTORY_ENDPOINT).await
    }

    /// 無賃乗車の写真をアップロードする
    ///
    /// 会社IDとユーザーIDはセッションから補う
    pub async fn create_gratuidade(&self, mut upload: GratuidadeUpload) -> AppResult<Value> {
        if upload.user_id.is_none() {
            upload.user_id = self.session.user_id();
        }

        let image = tokio::fs::read(&upload.image_path).await.map_err(|e| {
            log::warn!("写真の読み込みに失敗しました: path={:?}, error={e}", upload.image_path);
            AppError::validation("Não foi possível ler a foto. Tente novamente.")
        })?;
        let file_name = upload.file_name();
        let mime_type = image_mime_type(&file_name);

        log::info!(
            "無賃乗車の写真をアップロードします: company_id={}, journey_id={:?}, file={file_name}, size={}",
            upload.company_id,
            upload.journey_id,
            image.len()
        );

        let created = self
            .api
            .post_multipart(GRATUIDADE_ENDPOINT, || {
                let part = multipart::Part::bytes(image.clone())
                    .file_name(file_name.clone())
                    .mime_str(&mime_type)
                    .map_err(|e| AppError::validation(format!("MIMEタイプが不正です: {e}")))?;

                let form = upload
                    .text_fields()
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, value)| {
                        form.text(name, value)
                    })
                    .part("image", part);
                Ok(form)
            })
            .await?;

        log::info!("無賃乗車を登録しました");
        Ok(created)
    }

    /// セッションの会社IDで無賃乗車アップロードを組み立てる
    pub fn gratuidade_upload(
        &self,
        image_path: std::path::PathBuf,
        bus_line_id: Option<String>,
        vehicle_prefix: Option<String>,
        journey_id: Option<i64>,
    ) -> AppResult<GratuidadeUpload> {
        let company_id = self
            .session
            .company_id()
            .ok_or_else(|| AppError::validation(MISSING_COMPANY_MESSAGE))?;

        Ok(GratuidadeUpload {
            company_id,
            user_id: self.session.user_id(),
            journey_id,
            bus_line_id,
            vehicle_prefix,
            image_path,
        })
    }

    /// QRコード表示中の取引の監視を開始する
    ///
    /// 返されたハンドルを破棄するとポーリングは止まる
    pub fn watch(&self, detail: &PaymentDetail) -> PollerHandle {
        let poller = PaymentPoller::new(
            self.status_source.clone(),
            detail.context.clone(),
            self.session.user_id(),
        );
        Arc::new(poller).start(self.poll_interval)
    }
}

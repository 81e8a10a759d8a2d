use crate::features::payments::models::*;
use crate::features::payments::poller::PollerHandle;
use crate::AppState;
use serde_json::Value;
use std::path::PathBuf;

/// PIX決済を作成する
///
/// # 引数
/// * `draft` - 選択中の路線・車両・運賃・数量
/// * `state` - アプリケーション状態
///
/// # 戻り値
/// QRコード表示画面のデータ、または失敗時はアラート用メッセージ
pub async fn generate_payment(
    draft: PaymentDraft,
    state: &AppState,
) -> Result<PaymentDetail, String> {
    let journey_id = state.journeys.stored_active_journey_id();
    state
        .payments
        .generate(&draft, journey_id)
        .await
        .map_err(|e| e.into())
}

/// 取引を取得する
pub async fn get_transaction(
    transaction_id: String,
    state: &AppState,
) -> Result<TransactionStatus, String> {
    state
        .payments
        .transaction(&transaction_id)
        .await
        .map_err(|e| e.into())
}

/// 決済リンクを取得する
pub async fn get_payment_link(transaction_id: String, state: &AppState) -> Result<Value, String> {
    state
        .payments
        .payment_link(&transaction_id)
        .await
        .map_err(|e| e.into())
}

pub async fn list_transactions(state: &AppState) -> Result<Vec<TransactionStatus>, String> {
    state.payments.transactions().await.map_err(|e| e.into())
}

/// 取引履歴を取得する
pub async fn get_transaction_history(
    state: &AppState,
) -> Result<Vec<TransactionHistoryEntry>, String> {
    state.payments.history().await.map_err(|e| e.into())
}

/// 無賃乗車の写真を登録する
///
/// 路線と車両は保存済みの選択、ジャーニーは稼働中のものを使う
pub async fn create_gratuidade(image_path: PathBuf, state: &AppState) -> Result<Value, String> {
    let selection = state.selection.load();
    let upload = state.payments.gratuidade_upload(
        image_path,
        selection.as_ref().map(|s| s.bus_line_id.clone()),
        selection.as_ref().map(|s| s.vehicle_prefix.clone()),
        state.journeys.stored_active_journey_id(),
    )?;

    state
        .payments
        .create_gratuidade(upload)
        .await
        .map_err(|e| e.into())
}

/// QRコード表示中の取引の監視を開始する
///
/// 画面を離れるときはハンドルを破棄するか `stop` を呼ぶ
pub fn watch_payment(detail: &PaymentDetail, state: &AppState) -> PollerHandle {
    state.payments.watch(detail)
}

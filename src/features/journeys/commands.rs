use crate::features::journeys::models::*;
use crate::AppState;
use std::path::PathBuf;

/// ジャーニーを開始する
///
/// # 引数
/// * `bus_line` - 路線ID
/// * `vehicle_prefix` - 車両番号
/// * `state` - アプリケーション状態
///
/// # 戻り値
/// 作成されたジャーニー、または失敗時はアラート用メッセージ
pub async fn create_journey(
    bus_line: i64,
    vehicle_prefix: String,
    state: &AppState,
) -> Result<Journey, String> {
    state
        .journeys
        .create(bus_line, &vehicle_prefix)
        .await
        .map_err(|e| e.into())
}

/// 稼働中のジャーニーを同期する（画面表示のたびに呼ばれる）
pub async fn sync_active_journey(state: &AppState) -> Result<Option<Journey>, String> {
    Ok(state.journeys.sync().await)
}

/// ジャーニーを終了する
pub async fn finalize_journey(
    journey_id: i64,
    state: &AppState,
) -> Result<FinalizeOutcome, String> {
    state
        .journeys
        .finalize(journey_id)
        .await
        .map_err(|e| e.into())
}

/// ジャーニー一覧を取得する
pub async fn list_journeys(
    finalizada: Option<bool>,
    state: &AppState,
) -> Result<Vec<Journey>, String> {
    state.journeys.list(finalizada).await.map_err(|e| e.into())
}

/// 終了済みジャーニー一覧を取得する（履歴画面）
pub async fn list_finalized_journeys(state: &AppState) -> Result<Vec<Journey>, String> {
    state.journeys.list_finalized().await.map_err(|e| e.into())
}

/// ジャーニーを取得する
pub async fn get_journey(journey_id: i64, state: &AppState) -> Result<Journey, String> {
    state
        .journeys
        .get_by_id(journey_id)
        .await
        .map_err(|e| e.into())
}

/// ジャーニーの決済一覧を取得する
pub async fn get_journey_payments(
    journey_id: i64,
    state: &AppState,
) -> Result<Vec<JourneyPayment>, String> {
    state
        .journeys
        .get_payments(journey_id)
        .await
        .map_err(|e| e.into())
}

/// ジャーニー詳細（ジャーニーと決済一覧）を取得する
pub async fn get_journey_detail(
    journey_id: i64,
    state: &AppState,
) -> Result<JourneyDetail, String> {
    state
        .journeys
        .detail(journey_id)
        .await
        .map_err(|e| e.into())
}

/// ジャーニーのPDFをダウンロードする（バイナリ）
pub async fn download_journey_pdf(journey_id: i64, state: &AppState) -> Result<Vec<u8>, String> {
    state
        .journeys
        .download_pdf(journey_id)
        .await
        .map_err(|e| e.into())
}

/// ジャーニーのPDFを保存する
///
/// 保存先を省略した場合はアプリのPDFディレクトリに保存する
pub async fn save_journey_pdf(
    journey_id: i64,
    dir: Option<PathBuf>,
    state: &AppState,
) -> Result<PathBuf, String> {
    let dir = dir.unwrap_or_else(|| state.pdf_dir.clone());
    state
        .journeys
        .save_pdf(journey_id, &dir)
        .await
        .map_err(|e| e.into())
}

/// 保存済みのアクティブなジャーニーIDを取得する
pub async fn get_stored_active_journey_id(state: &AppState) -> Result<Option<i64>, String> {
    Ok(state.journeys.stored_active_journey_id())
}

use crate::features::catalog::models::*;
use crate::AppState;

/// 路線一覧を取得する
///
/// 会社IDを省略した場合はログイン中の社員の会社で絞り込む
pub async fn get_bus_lines(
    company_id: Option<i64>,
    state: &AppState,
) -> Result<Vec<BusLine>, String> {
    let company_id = company_id.or_else(|| state.session.company_id());
    state
        .catalog
        .bus_lines(company_id)
        .await
        .map_err(|e| e.into())
}

/// 路線を取得する
pub async fn get_bus_line(id: i64, state: &AppState) -> Result<BusLine, String> {
    state.catalog.bus_line(id).await.map_err(|e| e.into())
}

/// 運賃一覧を取得する
pub async fn get_tariffs(state: &AppState) -> Result<Vec<Tariff>, String> {
    state.catalog.tariffs().await.map_err(|e| e.into())
}

/// 車両一覧を取得する
pub async fn get_vehicles(
    company_id: Option<i64>,
    state: &AppState,
) -> Result<Vec<Vehicle>, String> {
    let company_id = company_id.or_else(|| state.session.company_id());
    state
        .catalog
        .vehicles(company_id)
        .await
        .map_err(|e| e.into())
}

/// 車両番号で車両を取得する
pub async fn get_vehicle(prefix: String, state: &AppState) -> Result<Vehicle, String> {
    state.catalog.vehicle(&prefix).await.map_err(|e| e.into())
}

use crate::features::selection::models::BusSelection;
use crate::AppState;

/// 路線・車両の選択を保存する
pub async fn save_selection(selection: BusSelection, state: &AppState) -> Result<(), String> {
    log::info!(
        "路線・車両を選択しました: bus_line_id={}, vehicle_prefix={}",
        selection.bus_line_id,
        selection.vehicle_prefix
    );
    state.selection.save(&selection);
    Ok(())
}

/// 保存済みの選択を取得する
pub async fn load_selection(state: &AppState) -> Result<Option<BusSelection>, String> {
    Ok(state.selection.load())
}

/// 選択を削除する
pub async fn clear_selection(state: &AppState) -> Result<(), String> {
    state.selection.clear();
    Ok(())
}

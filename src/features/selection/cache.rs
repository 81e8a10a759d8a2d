// 路線・車両選択のローカルキャッシュ

use super::models::BusSelection;
use crate::shared::secure_storage::{SecureStorageKeys, SecureStore};
use std::sync::Arc;

/// 最後に選択した路線・車両を保持するキャッシュ
///
/// すべての失敗はログに残して握りつぶす（選択は再度やり直せるため）
#[derive(Clone)]
pub struct SelectionCache {
    store: Arc<dyn SecureStore>,
}

impl SelectionCache {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// 選択を保存する
    pub fn save(&self, selection: &BusSelection) {
        let json = match serde_json::to_string(selection) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("選択のシリアライズに失敗しました: {e}");
                return;
            }
        };

        match self.store.set(SecureStorageKeys::USER_BUS_SELECTION, &json) {
            Ok(()) => log::debug!(
                "選択を保存しました: bus_line_id={}, vehicle_prefix={}",
                selection.bus_line_id,
                selection.vehicle_prefix
            ),
            Err(e) => log::warn!("選択の保存に失敗しました: {e}"),
        }
    }

    /// 保存済みの選択を読み込む
    ///
    /// # 戻り値
    /// 保存されていない、または壊れている場合はNone
    pub fn load(&self) -> Option<BusSelection> {
        let json = match self.store.get(SecureStorageKeys::USER_BUS_SELECTION) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("選択の読み込みに失敗しました: {e}");
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(selection) => Some(selection),
            Err(e) => {
                log::warn!("保存済みの選択が壊れています: {e}");
                None
            }
        }
    }

    /// 選択を削除する
    pub fn clear(&self) {
        if let Err(e) = self.store.delete(SecureStorageKeys::USER_BUS_SELECTION) {
            log::warn!("選択の削除に失敗しました: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::secure_storage::test_support::FailingSecureStore;
    use crate::shared::secure_storage::MemorySecureStore;
    use quickcheck_macros::quickcheck;

    fn selection() -> BusSelection {
        BusSelection {
            bus_line_id: "10".to_string(),
            bus_line_name: "Centro".to_string(),
            bus_line_code: "101".to_string(),
            bus_line_company: "1".to_string(),
            vehicle_prefix: "1020".to_string(),
        }
    }

    #[test]
    fn test_save_load_clear() {
        let cache = SelectionCache::new(Arc::new(MemorySecureStore::new()));
        assert_eq!(cache.load(), None);

        cache.save(&selection());
        assert_eq!(cache.load(), Some(selection()));

        cache.clear();
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn test_reads_legacy_camel_case_json() {
        let store = Arc::new(MemorySecureStore::new());
        store
            .set(
                SecureStorageKeys::USER_BUS_SELECTION,
                r#"{"busLineId":"10","busLineName":"Centro","busLineCode":"101","busLineCompany":"1","vehiclePrefix":"1020"}"#,
            )
            .unwrap();

        let cache = SelectionCache::new(store);
        assert_eq!(cache.load(), Some(selection()));
    }

    #[test]
    fn test_corrupt_json_loads_as_none() {
        let store = Arc::new(MemorySecureStore::new());
        store
            .set(SecureStorageKeys::USER_BUS_SELECTION, "{busLineId")
            .unwrap();

        let cache = SelectionCache::new(store);
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let cache = SelectionCache::new(Arc::new(FailingSecureStore));
        cache.save(&selection());
        assert_eq!(cache.load(), None);
        cache.clear();
    }

    #[quickcheck]
    fn prop_save_then_load_round_trips(
        bus_line_id: String,
        bus_line_name: String,
        bus_line_code: String,
        bus_line_company: String,
        vehicle_prefix: String,
    ) -> bool {
        let cache = SelectionCache::new(Arc::new(MemorySecureStore::new()));
        let selection = BusSelection {
            bus_line_id,
            bus_line_name,
            bus_line_code,
            bus_line_company,
            vehicle_prefix,
        };

        cache.save(&selection);
        let loaded = cache.load();
        cache.clear();

        loaded == Some(selection) && cache.load().is_none()
    }
}

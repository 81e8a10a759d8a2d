/// セキュアストレージモジュール
///
/// 認証トークン、選択中の路線・車両、アクティブなジャーニーIDなどを
/// キー・バリュー形式で保存する。端末のセキュアストアはトレイト越しに扱い、
/// デスクトップ・CLI向けのJSONファイル実装とテスト用のメモリ実装を提供する。
use crate::shared::errors::{AppError, AppResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// セキュアストレージのキー定義
pub struct SecureStorageKeys;

impl SecureStorageKeys {
    /// アクセストークンのキー
    pub const AUTH_TOKEN: &'static str = "auth_token";
    /// リフレッシュトークンのキー
    pub const REFRESH_TOKEN: &'static str = "refresh_token";
    /// ユーザーIDのキー
    pub const USER_ID: &'static str = "user_id";
    /// 所属会社IDのキー
    pub const COMPANY_ID: &'static str = "company_id";
    /// アクティブなジャーニーIDのキー
    pub const ACTIVE_JOURNEY_ID: &'static str = "active_journey_id";
    /// 路線・車両選択のキー（JSON）
    pub const USER_BUS_SELECTION: &'static str = "user_bus_selection";
    /// 保存済みログインIDのキー
    pub const SAVED_USERNAME: &'static str = "saved_username";
    /// 保存済みパスワードのキー
    pub const SAVED_PASSWORD: &'static str = "saved_password";

    /// セッション切れ時に削除するキー
    pub const SESSION_KEYS: [&'static str; 3] =
        [Self::AUTH_TOKEN, Self::REFRESH_TOKEN, Self::USER_ID];
}

/// キー・バリュー形式のセキュアストア
///
/// 呼び出し側から見て単一キーごとの書き込みのみを保証する（複数キーの原子性はない）
pub trait SecureStore: Send + Sync {
    /// 値を取得する（存在しない場合はNone）
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 値を保存する
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// 値を削除する（存在しなくてもエラーにしない）
    fn delete(&self, key: &str) -> AppResult<()>;

    /// 複数キーをまとめて削除する
    fn delete_many(&self, keys: &[&str]) -> AppResult<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }
}

/// JSONファイルに保存するセキュアストア
///
/// 書き込みのたびにファイル全体を書き出す
pub struct FileSecureStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileSecureStore {
    /// ファイルを開く（存在しない場合は空のストアとして扱う）
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| AppError::storage(format!("ストアの読み込みに失敗しました: {e}")))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) | Err(_) => {
                        log::warn!("ストアファイルが破損しているため初期化します: {path:?}");
                        Map::new()
                    }
                }
            }
        } else {
            Map::new()
        };

        log::debug!("セキュアストアを開きました: path={path:?}, keys={}", entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// ストアファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::storage(format!("ストアディレクトリの作成に失敗しました: {e}"))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| AppError::storage(format!("ストアの保存に失敗しました: {e}")))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| AppError::storage(format!("ストアの保存に失敗しました: {e}")))?;
        Ok(())
    }
}

impl SecureStore for FileSecureStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;

        Ok(entries.get(key).and_then(|v| v.as_str().map(str::to_string)))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;

        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.persist(&entries)
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;

        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// メモリ上のセキュアストア（テスト・一時セッション用）
#[derive(Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemorySecureStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::storage(format!("ストアのロックに失敗しました: {e}")))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// すべての操作が失敗するストア
    pub struct FailingSecureStore;

    impl SecureStore for FailingSecureStore {
        fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::storage("indisponível"))
        }

        fn set(&self, _key: &str, _value: &str) -> AppResult<()> {
            Err(AppError::storage("indisponível"))
        }

        fn delete(&self, _key: &str) -> AppResult<()> {
            Err(AppError::storage("indisponível"))
        }
    }
}

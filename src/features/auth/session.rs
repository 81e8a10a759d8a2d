use crate::features::auth::models::{AuthState, LoginResponse, SavedCredentials};
use crate::shared::errors::AppResult;
use crate::shared::secure_storage::{SecureStorageKeys, SecureStore};
use std::sync::Arc;

/// ログインセッションを管理する構造体
///
/// セキュアストアに保存されたトークンとユーザー情報を型付きで扱う。
/// 読み込み失敗は「未ログイン」として扱い、書き込み失敗はログに残して続行する。
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SecureStore>,
}

impl Session {
    /// 新しいSessionを作成する
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log::warn!("セキュアストアの読み込みに失敗しました: key={key}, error={e}");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("セキュアストアへの書き込みに失敗しました: key={key}, error={e}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            log::warn!("セキュアストアからの削除に失敗しました: key={key}, error={e}");
        }
    }

    /// ログイン結果を保存する
    ///
    /// # 引数
    /// * `response` - ログインAPIのレスポンス
    pub fn store_login(&self, response: &LoginResponse) {
        self.write(SecureStorageKeys::AUTH_TOKEN, &response.access);
        self.write(SecureStorageKeys::REFRESH_TOKEN, &response.refresh);

        match response.user_id {
            Some(user_id) => self.write(SecureStorageKeys::USER_ID, &user_id.to_string()),
            None => self.remove(SecureStorageKeys::USER_ID),
        }
        match response.company_id {
            Some(company_id) => {
                self.write(SecureStorageKeys::COMPANY_ID, &company_id.to_string())
            }
            None => self.remove(SecureStorageKeys::COMPANY_ID),
        }

        log::debug!(
            "ログイン情報を保存しました: user_id={:?}, company_id={:?}",
            response.user_id,
            response.company_id
        );
    }

    /// アクセストークン
    pub fn access_token(&self) -> Option<String> {
        self.read(SecureStorageKeys::AUTH_TOKEN)
    }

    /// ログイン中のユーザーID
    pub fn user_id(&self) -> Option<i64> {
        self.read(SecureStorageKeys::USER_ID)
            .and_then(|v| v.trim().parse().ok())
    }

    /// 所属会社ID
    pub fn company_id(&self) -> Option<i64> {
        self.read(SecureStorageKeys::COMPANY_ID)
            .and_then(|v| v.trim().parse().ok())
    }

    /// アクセストークンが保存されているかどうか
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// UI表示用の認証状態
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            is_authenticated: self.is_authenticated(),
            user_id: self.user_id(),
            company_id: self.company_id(),
        }
    }

    /// セッションを破棄する
    ///
    /// トークン、ユーザーID、会社ID、アクティブなジャーニーIDを削除する。
    /// 路線・車両の選択と保存済みログイン情報は残す。
    pub fn clear(&self) -> AppResult<()> {
        self.store.delete_many(&[
            SecureStorageKeys::AUTH_TOKEN,
            SecureStorageKeys::REFRESH_TOKEN,
            SecureStorageKeys::USER_ID,
            SecureStorageKeys::COMPANY_ID,
            SecureStorageKeys::ACTIVE_JOURNEY_ID,
        ])
    }

    /// ログイン情報を保存する（「ログイン情報を保存」がオンの場合）
    pub fn save_credentials(&self, credentials: &SavedCredentials) {
        self.write(SecureStorageKeys::SAVED_USERNAME, &credentials.username);
        self.write(SecureStorageKeys::SAVED_PASSWORD, &credentials.password);
    }

    /// 保存済みログイン情報を読み込む（両方揃っている場合のみ）
    pub fn saved_credentials(&self) -> Option<SavedCredentials> {
        let username = self.read(SecureStorageKeys::SAVED_USERNAME)?;
        let password = self.read(SecureStorageKeys::SAVED_PASSWORD)?;
        Some(SavedCredentials { username, password })
    }

    /// 保存済みログイン情報を削除する
    pub fn clear_saved_credentials(&self) {
        self.remove(SecureStorageKeys::SAVED_USERNAME);
        self.remove(SecureStorageKeys::SAVED_PASSWORD);
    }
}

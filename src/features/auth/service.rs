use crate::features::auth::models::{
    AuthState, LoginCredentials, LoginFailure, LoginResponse, RegisterPayload, SavedCredentials,
};
use crate::features::auth::session::Session;
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{normalize_string, validate_required_field};
use serde_json::Value;
use std::sync::Arc;

const LOGIN_ENDPOINT: &str = "/employee/login/";
const REGISTER_ENDPOINT: &str = "/employee/register/";

/// 社員認証サービス
#[derive(Clone)]
pub struct AuthService {
    /// APIクライアント
    api: Arc<ApiClient>,
    /// セッション管理
    session: Session,
}

impl AuthService {
    /// 新しいAuthServiceを作成する
    ///
    /// # 引数
    /// * `api` - APIクライアント
    /// * `session` - セッション
    pub fn new(api: Arc<ApiClient>, session: Session) -> Self {
        Self { api, session }
    }

    /// セッション
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// ログインする
    ///
    /// 入力欄のバリデーションを先に行い、通過した場合のみサーバーに問い合わせる。
    /// `remember` がtrueならログイン情報を保存し、falseなら保存済みの情報を削除する。
    ///
    /// # 引数
    /// * `credentials` - マトリクラとパスワード
    /// * `remember` - ログイン情報を保存するかどうか
    ///
    /// # 戻り値
    /// ログイン後の認証状態、または分類済みのログイン失敗
    pub async fn login(
        &self,
        credentials: LoginCredentials,
        remember: bool,
    ) -> Result<AuthState, LoginFailure> {
        let credentials = LoginCredentials {
            username: normalize_string(&credentials.username),
            password: credentials.password,
        };

        validate_login(&credentials)?;

        log::info!("ログインを開始します: username={}", credentials.username);

        let response: LoginResponse = self
            .api
            .post_public(LOGIN_ENDPOINT, &credentials)
            .await
            .map_err(|e| {
                let failure = LoginFailure::classify(&e);
                log::warn!("ログインに失敗しました: {e} -> {failure:?}");
                failure
            })?;

        self.session.store_login(&response);

        if remember {
            self.session.save_credentials(&SavedCredentials {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            });
        } else {
            self.session.clear_saved_credentials();
        }

        log::info!("ログインに成功しました: user_id={:?}", response.user_id);
        Ok(self.session.auth_state())
    }

    /// 社員を登録する
    pub async fn register(&self, payload: RegisterPayload) -> AppResult<Value> {
        validate_required_field(&payload.full_name, "Informe o nome completo.")?;
        validate_required_field(&payload.alias, "Informe o apelido.")?;
        validate_required_field(&payload.role, "Informe a função.")?;

        log::info!(
            "社員登録を開始します: alias={}, company_id={}",
            payload.alias,
            payload.company_id
        );

        let created = self.api.post(REGISTER_ENDPOINT, &payload).await?;

        log::info!("社員登録が完了しました: alias={}", payload.alias);
        Ok(created)
    }

    /// ログアウトする
    ///
    /// 路線・車両の選択は次回ログイン時のために残す
    pub fn logout(&self) -> AppResult<()> {
        log::info!("ログアウトします: user_id={:?}", self.session.user_id());
        self.session.clear().map_err(|e| {
            log::error!("ログアウト処理に失敗しました: {e}");
            e
        })
    }

    /// 現在の認証状態
    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    /// 保存済みログイン情報（ログイン画面の初期値）
    pub fn saved_credentials(&self) -> Option<SavedCredentials> {
        self.session.saved_credentials()
    }
}

/// ログインフォームのバリデーション
fn validate_login(credentials: &LoginCredentials) -> Result<(), LoginFailure> {
    if credentials.username.is_empty() {
        return Err(LoginFailure::MissingUsername);
    }
    if credentials.password.trim().is_empty() {
        return Err(LoginFailure::MissingPassword);
    }
    Ok(())
}

impl From<LoginFailure> for AppError {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::Network => AppError::network(failure.message()),
            other => AppError::validation(other.message()),
        }
    }
}

use crate::features::auth::models::*;
use crate::AppState;
use serde_json::Value;

/// ログインする
///
/// # 引数
/// * `credentials` - マトリクラとパスワード
/// * `remember` - ログイン情報を保存するかどうか
/// * `state` - アプリケーション状態
///
/// # 戻り値
/// 認証状態、または失敗時は入力欄とメッセージを含むログイン失敗
pub async fn login(
    credentials: LoginCredentials,
    remember: bool,
    state: &AppState,
) -> Result<AuthState, LoginFailure> {
    state.auth.login(credentials, remember).await
}

/// 社員を登録する
pub async fn register(payload: RegisterPayload, state: &AppState) -> Result<Value, String> {
    state.auth.register(payload).await.map_err(|e| e.into())
}

/// ログアウトする
pub async fn logout(state: &AppState) -> Result<(), String> {
    state.auth.logout().map_err(|e| e.into())
}

/// 現在の認証状態を取得する
pub async fn get_auth_state(state: &AppState) -> Result<AuthState, String> {
    Ok(state.auth.auth_state())
}

/// 保存済みログイン情報を取得する
pub async fn get_saved_credentials(
    state: &AppState,
) -> Result<Option<SavedCredentials>, String> {
    Ok(state.auth.saved_credentials())
}

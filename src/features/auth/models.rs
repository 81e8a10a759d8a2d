use crate::shared::errors::AppError;
use crate::shared::utils::deserialize_optional_id;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// ログインリクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// マトリクラ（社員ID）
    pub username: String,
    /// パスワード
    pub password: String,
}

/// ログインレスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// JWTアクセストークン
    pub access: String,
    /// JWTリフレッシュトークン
    pub refresh: String,
    /// ログインしたユーザーのID
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<i64>,
    /// 所属会社のID（決済作成に必要）
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub company_id: Option<i64>,
}

/// 社員登録リクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub full_name: String,
    pub alias: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_code: Option<String>,
    pub company_id: i64,
}

/// 保存済みログイン情報（「ログイン情報を保存」機能）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCredentials {
    pub username: String,
    pub password: String,
}

/// ログイン済みユーザーの情報（UI表示用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// 認証済みフラグ
    pub is_authenticated: bool,
    /// ユーザーID
    pub user_id: Option<i64>,
    /// 所属会社ID
    pub company_id: Option<i64>,
}

/// ログイン失敗の分類
///
/// フォームの入力欄ごとにメッセージを出し分けるために使う
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum LoginFailure {
    /// マトリクラ欄が空
    MissingUsername,
    /// パスワード欄が空
    MissingPassword,
    /// ユーザーが存在しない
    UnknownUser,
    /// パスワードが違う
    WrongPassword,
    /// 認証情報が無効（詳細不明）
    InvalidCredentials,
    /// サーバーに到達できない
    Network,
    /// その他のエラー（サーバーのメッセージをそのまま表示）
    Other(String),
}

/// ログインフォームのどの欄にエラーを出すか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginField {
    Username,
    Password,
    Form,
}

static UNKNOWN_USER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(usu[aá]rio|matr[ií]cula|user(name)?|funcion[aá]rio|employee).*(n[aã]o (encontrad|existe|cadastrad)|not found|does not exist|inexistente)",
    )
    .expect("unknown user pattern")
});

static WRONG_PASSWORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(senha|password).*(incorret|inv[aá]lid|errad|wrong|incorrect)")
        .expect("wrong password pattern")
});

static INVALID_CREDENTIALS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(credenciais|credentials|no active account|unable to log in|não autorizado)",
    )
    .expect("invalid credentials pattern")
});

impl LoginFailure {
    /// ログイン時のエラーを分類する
    pub fn classify(error: &AppError) -> Self {
        match error {
            AppError::Network(_) => LoginFailure::Network,
            AppError::Validation(message) => LoginFailure::Other(message.clone()),
            AppError::Request { status, .. } => {
                let message = error.user_message();
                if UNKNOWN_USER_PATTERN.is_match(&message) {
                    LoginFailure::UnknownUser
                } else if WRONG_PASSWORD_PATTERN.is_match(&message) {
                    LoginFailure::WrongPassword
                } else if matches!(status, 400 | 401)
                    || INVALID_CREDENTIALS_PATTERN.is_match(&message)
                {
                    LoginFailure::InvalidCredentials
                } else {
                    LoginFailure::Other(message)
                }
            }
            other => LoginFailure::Other(other.user_message()),
        }
    }

    /// エラーを表示する欄
    pub fn field(&self) -> LoginField {
        match self {
            LoginFailure::MissingUsername | LoginFailure::UnknownUser => LoginField::Username,
            LoginFailure::MissingPassword | LoginFailure::WrongPassword => LoginField::Password,
            _ => LoginField::Form,
        }
    }

    /// ユーザーに表示するメッセージ
    pub fn message(&self) -> String {
        match self {
            LoginFailure::MissingUsername => "Informe sua matrícula.".to_string(),
            LoginFailure::MissingPassword => "Informe sua senha.".to_string(),
            LoginFailure::UnknownUser => "Matrícula não encontrada.".to_string(),
            LoginFailure::WrongPassword => "Senha incorreta.".to_string(),
            LoginFailure::InvalidCredentials => {
                "Não foi possível realizar o login. Verifique suas credenciais.".to_string()
            }
            LoginFailure::Network => crate::shared::errors::CONNECTION_ERROR_MESSAGE.to_string(),
            LoginFailure::Other(message) => message.clone(),
        }
    }
}
